use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::aggregate::LabelTable;
use crate::artifact::ArtifactStore;
use crate::config::Config;
use crate::db::Db;
use crate::engine::VolumeEngine;
use crate::pipeline::Pipeline;
use crate::session::{SessionCtx, SessionKey, SessionState};
use crate::stages::{
    StageAggregate, StageFetch, StageNormalize, StagePersist, StagePrecheck, StageScore,
};
use crate::sync::DataSync;

/// Collaborators shared by every session of a run.
pub struct Env {
    pub cfg: Config,
    pub engine: Arc<dyn VolumeEngine>,
    pub sync: Arc<dyn DataSync>,
    pub store: Arc<dyn ArtifactStore>,
    pub db: Db,
}

/// Run the full labeling workflow for one session key.
///
/// The session walks NotStarted -> Normalizing -> Scoring ->
/// Aggregating -> Persisting -> Done; any stage error is terminal
/// (Failed) for this session only. Re-invocation with the same key is
/// safe: the store-level check short-circuits completed sessions and
/// per-artifact skip-if-exists resumes partial ones.
pub fn run_session(env: &Env, key: SessionKey) -> Result<LabelTable> {
    let mut ctx = SessionCtx::new(&env.cfg.work_deriv, key);

    let precheck = Pipeline::new(vec![Box::new(StagePrecheck)]);
    if let Err(err) = precheck.run(env, &mut ctx) {
        ctx.state = SessionState::Failed;
        return Err(err);
    }
    if let Some(table) = ctx.stored_table.take() {
        ctx.state = SessionState::Done;
        return Ok(table);
    }

    let pipeline = Pipeline::new(vec![
        Box::new(StageFetch),
        Box::new(StageNormalize),
        Box::new(StageScore),
        Box::new(StageAggregate),
        Box::new(StagePersist),
    ]);
    match pipeline.run(env, &mut ctx) {
        Ok(()) => {
            ctx.state = SessionState::Done;
            info!(
                subj = %ctx.key.subj,
                sess = %ctx.key.sess,
                state = ctx.state.name(),
                "session complete"
            );
            ctx.table.take().context("pipeline finished without a table")
        }
        Err(err) => {
            ctx.state = SessionState::Failed;
            Err(err)
        }
    }
}

/// Drive a batch of sessions. Each session fails independently; the
/// batch continues and the failure count is returned.
pub fn run_batch(env: &Env, keys: Vec<SessionKey>) -> usize {
    let total = keys.len();
    let mut failed = 0;
    for key in keys {
        let subj = key.subj.clone();
        let sess = key.sess.clone();
        if let Err(err) = run_session(env, key) {
            warn!(subj = %subj, sess = %sess, "session failed: {err:#}");
            failed += 1;
        }
    }
    info!(total, failed, "batch complete");
    failed
}
