use anyhow::{bail, Result};
use tracing::info;

use crate::pipeline::Stage;
use crate::session::SessionCtx;
use crate::sync::remote;
use crate::workflow::Env;

/// Pull the cleaned rest series into the session working directory
/// (skip-if-exists) and read the volume count.
pub struct StageFetch;

impl Stage for StageFetch {
    fn name(&self) -> &'static str {
        "fetch"
    }

    fn run(&self, env: &Env, ctx: &mut SessionCtx) -> Result<()> {
        std::fs::create_dir_all(&ctx.paths.func_dir)?;

        let rest = ctx.paths.rest_path();
        if !env.store.exists(&rest) {
            let src = remote::rest_path(&ctx.key.proj, &ctx.key.subj, &ctx.key.sess);
            env.sync.fetch(&src, &ctx.paths.func_dir)?;
            if !env.store.exists(&rest) {
                bail!(
                    "no res4d detected for {}, {}",
                    ctx.key.subj,
                    ctx.key.sess
                );
            }
        }

        ctx.num_vols = env.engine.num_vols(&rest)?;
        if ctx.num_vols == 0 {
            bail!("rest series {} reports zero volumes", rest.display());
        }
        info!(num_vols = ctx.num_vols, "rest series ready");
        ctx.rest_path = Some(rest);
        Ok(())
    }
}
