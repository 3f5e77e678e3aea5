use anyhow::Result;
use tracing::info;

use crate::pipeline::Stage;
use crate::session::SessionCtx;
use crate::setup;
use crate::workflow::Env;

/// Fast preconditions, before any unit is scheduled or any volume I/O
/// happens: settle the store-level idempotence check, then require the
/// mask and the full weight-map set.
pub struct StagePrecheck;

impl Stage for StagePrecheck {
    fn name(&self) -> &'static str {
        "precheck"
    }

    fn run(&self, env: &Env, ctx: &mut SessionCtx) -> Result<()> {
        if env.db.has_session(&ctx.key)? {
            info!(
                subj = %ctx.key.subj,
                sess = %ctx.key.sess,
                "session already stored, skipping"
            );
            ctx.stored_table = env.db.fetch_table(&ctx.key)?;
            return Ok(());
        }

        ctx.mask_path = Some(setup::mask_path(&env.cfg.work_deriv, &ctx.key)?);
        ctx.weight_maps = setup::weight_map_paths(&env.cfg.work_deriv, &ctx.key)?;
        Ok(())
    }
}
