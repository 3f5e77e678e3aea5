use anyhow::{Context, Result};
use tracing::info;

use crate::io::csv_writer::write_label_csv;
use crate::io::summary::{write_summary, SessionSummary};
use crate::pipeline::Stage;
use crate::session::{SessionCtx, SessionState};
use crate::sync::{clean_for_publish, remote};
use crate::workflow::Env;

/// Durably persist the session: final CSV, summary JSON, relational
/// rows, remote publication, then removal of the local working tree.
/// The CSV is only ever written from a fully built table, so a failed
/// session never leaves a corrupt final artifact.
pub struct StagePersist;

impl Stage for StagePersist {
    fn name(&self) -> &'static str {
        "persist"
    }

    fn run(&self, env: &Env, ctx: &mut SessionCtx) -> Result<()> {
        ctx.state = SessionState::Persisting;
        let table = ctx.table.as_ref().context("label table missing")?;

        write_label_csv(&ctx.paths.csv_path, table)?;
        if let Some(parent) = ctx.paths.summary_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let summary = SessionSummary::build(&ctx.key, table, &ctx.warnings);
        write_summary(&ctx.paths.summary_path, &summary)?;

        env.db.insert_table(&ctx.key, table)?;

        clean_for_publish(&ctx.paths.session_dir)?;
        env.sync
            .publish(&ctx.paths.session_dir, &remote::upload_dir(&ctx.key.proj))?;
        std::fs::remove_dir_all(&ctx.paths.session_dir).with_context(|| {
            format!(
                "failed to remove working tree {}",
                ctx.paths.session_dir.display()
            )
        })?;

        info!(csv = %ctx.paths.csv_path.display(), "session persisted");
        Ok(())
    }
}
