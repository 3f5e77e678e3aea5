use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::dotprod::{compute_series, parse_series_csv};
use crate::pipeline::Stage;
use crate::scheduler::{join_all, WorkPool};
use crate::session::{SessionCtx, SessionPaths, SessionState};
use crate::workflow::Env;

/// Fan out one dot-product unit per emotion. Units communicate only
/// through the filesystem; the fan-in re-parses each persisted series.
pub struct StageScore;

impl Stage for StageScore {
    fn name(&self) -> &'static str {
        "score"
    }

    fn run(&self, env: &Env, ctx: &mut SessionCtx) -> Result<()> {
        ctx.state = SessionState::Scoring;
        let mask = ctx.mask_path.clone().context("mask path not set")?;

        let pool = WorkPool::bounded(ctx.weight_maps.len().max(1))?;
        let mut handles = Vec::with_capacity(ctx.weight_maps.len());
        for (emo, weight) in &ctx.weight_maps {
            let engine = Arc::clone(&env.engine);
            let store = Arc::clone(&env.store);
            let volumes = ctx.normalized.clone();
            let mask = mask.clone();
            let weight = weight.clone();
            let emo = emo.clone();
            let out_dir = ctx.paths.func_dir.clone();
            handles.push(pool.submit(format!("dot_{emo}"), move || {
                compute_series(
                    engine.as_ref(),
                    store.as_ref(),
                    &volumes,
                    &mask,
                    &weight,
                    &emo,
                    &out_dir,
                )
                .map(|_| ())
            }));
        }
        let ok = join_all(handles, env.cfg.unit_timeout);
        info!(ok, emotions = ctx.weight_maps.len(), "scoring fan-in complete");

        let emotions: Vec<String> = ctx.weight_maps.keys().cloned().collect();
        for emo in emotions {
            let csv = ctx
                .paths
                .func_dir
                .join(SessionPaths::series_csv_name(&emo));
            if env.store.exists(&csv) {
                let series = parse_series_csv(env.store.as_ref(), &csv, &emo)?;
                ctx.series.insert(emo, series);
            } else {
                ctx.warn(format!("no dot-product series produced for '{emo}'"));
            }
        }
        Ok(())
    }
}
