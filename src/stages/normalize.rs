use std::sync::Arc;

use anyhow::{Context, Result};

use crate::normalize::normalize_volumes;
use crate::pipeline::Stage;
use crate::scheduler::WorkPool;
use crate::session::{SessionCtx, SessionState};
use crate::workflow::Env;

/// Fan out one z-score unit per volume, bounded concurrency.
pub struct StageNormalize;

impl Stage for StageNormalize {
    fn name(&self) -> &'static str {
        "normalize"
    }

    fn run(&self, env: &Env, ctx: &mut SessionCtx) -> Result<()> {
        ctx.state = SessionState::Normalizing;
        let rest = ctx.rest_path.clone().context("rest path not set")?;
        let mask = ctx.mask_path.clone().context("mask path not set")?;
        let pool = WorkPool::bounded(env.cfg.max_jobs)?;
        ctx.normalized = normalize_volumes(
            Arc::clone(&env.engine),
            Arc::clone(&env.store),
            &pool,
            &rest,
            &mask,
            &ctx.paths.func_dir,
            ctx.num_vols,
            env.cfg.unit_timeout,
        )?;
        Ok(())
    }
}
