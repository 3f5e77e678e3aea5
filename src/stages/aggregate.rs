use anyhow::Result;
use tracing::info;

use crate::aggregate::aggregate;
use crate::pipeline::Stage;
use crate::session::{SessionCtx, SessionPaths, SessionState};
use crate::workflow::Env;

/// Merge the emotion series into the label table, then drop the
/// intermediate artifacts. Cleanup runs strictly after the merge
/// succeeds so a failed aggregation leaves the series on disk for the
/// next attempt.
pub struct StageAggregate;

impl Stage for StageAggregate {
    fn name(&self) -> &'static str {
        "aggregate"
    }

    fn run(&self, env: &Env, ctx: &mut SessionCtx) -> Result<()> {
        ctx.state = SessionState::Aggregating;

        let mut warnings = Vec::new();
        let table = aggregate(&ctx.series, ctx.num_vols, &mut warnings)?;
        for warning in warnings {
            ctx.warn(warning);
        }

        for emo in ctx.series.keys() {
            let csv = ctx.paths.func_dir.join(SessionPaths::series_csv_name(emo));
            if env.store.exists(&csv) {
                env.store.remove(&csv)?;
            }
        }
        for path in ctx.normalized.values() {
            if env.store.exists(path) {
                env.store.remove(path)?;
            }
        }
        info!(rows = table.num_rows(), "label table built");
        ctx.table = Some(table);
        Ok(())
    }
}
