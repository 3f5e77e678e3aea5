use std::time::Instant;

use anyhow::Result;
use tracing::{info, warn};

use crate::session::SessionCtx;
use crate::workflow::Env;

pub trait Stage {
    fn name(&self) -> &'static str;
    fn run(&self, env: &Env, ctx: &mut SessionCtx) -> Result<()>;
}

pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Self {
        Self { stages }
    }

    pub fn run(&self, env: &Env, ctx: &mut SessionCtx) -> Result<()> {
        for stage in &self.stages {
            let start = Instant::now();
            info!(
                stage = stage.name(),
                subj = %ctx.key.subj,
                sess = %ctx.key.sess,
                state = ctx.state.name(),
                "stage started"
            );
            if let Err(err) = stage.run(env, ctx) {
                let elapsed_ms = start.elapsed().as_millis();
                warn!(
                    stage = stage.name(),
                    elapsed_ms = elapsed_ms as u64,
                    "stage failed"
                );
                return Err(err);
            }
            let elapsed_ms = start.elapsed().as_millis();
            info!(
                stage = stage.name(),
                elapsed_ms = elapsed_ms as u64,
                "stage finished"
            );
        }
        Ok(())
    }
}
