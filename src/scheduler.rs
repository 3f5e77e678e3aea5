use std::sync::mpsc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tracing::warn;

use crate::error::Error;

/// Bounded fan-out worker pool. Units are independent closures with no
/// shared in-memory state; all communication is via the filesystem.
/// `submit` returns a handle; fan-in is a blocking `wait` per handle
/// with a wall-clock budget.
pub struct WorkPool {
    pool: rayon::ThreadPool,
}

impl WorkPool {
    /// Pool admitting at most `limit` concurrently running units.
    pub fn bounded(limit: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(limit.max(1))
            .build()
            .map_err(|e| anyhow!("failed to build worker pool: {e}"))?;
        Ok(Self { pool })
    }

    pub fn submit<F>(&self, name: impl Into<String>, unit: F) -> JobHandle
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let name = name.into();
        let (tx, rx) = mpsc::channel();
        self.pool.spawn(move || {
            let outcome = unit();
            // Receiver may have timed out and dropped; nothing to do.
            let _ = tx.send(outcome);
        });
        JobHandle { name, rx }
    }
}

/// Completion handle for one scheduled unit.
pub struct JobHandle {
    name: String,
    rx: mpsc::Receiver<Result<()>>,
}

impl JobHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Block until the unit reports, or until `budget` elapses.
    /// Exceeding the budget is the unit's failure; the unit itself is
    /// not signalled and its eventual output is simply never counted.
    pub fn wait(self, budget: Duration) -> Result<()> {
        match self.rx.recv_timeout(budget) {
            Ok(outcome) => outcome,
            Err(mpsc::RecvTimeoutError::Timeout) => Err(Error::UnitTimeout(self.name).into()),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(anyhow!("unit '{}' terminated without reporting", self.name))
            }
        }
    }
}

/// Join a fan-out stage: wait on every handle, log failures as
/// warnings, and return how many units succeeded. Post-condition
/// checks downstream decide whether missing results are fatal.
pub fn join_all(handles: Vec<JobHandle>, budget: Duration) -> usize {
    let mut ok = 0;
    for handle in handles {
        let name = handle.name().to_string();
        match handle.wait(budget) {
            Ok(()) => ok += 1,
            Err(err) => warn!(unit = %name, "unit failed: {err:#}"),
        }
    }
    ok
}
