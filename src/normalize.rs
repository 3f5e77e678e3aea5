use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info};

use crate::artifact::ArtifactStore;
use crate::engine::VolumeEngine;
use crate::error::Error;
use crate::scheduler::{join_all, WorkPool};
use crate::session::SessionPaths;

/// Z-score every volume of `rest_path` within the mask, one
/// independent unit per volume, at most `pool`'s bound concurrently.
///
/// Per-volume idempotence: a volume whose output file already exists
/// is not recomputed. After fan-in the produced-file count must equal
/// `num_vols` or the stage fails with `NormalizationIncomplete`.
///
/// A zero `stdev` is deliberately not guarded; the engine writes the
/// non-finite quotient and the values propagate downstream.
pub fn normalize_volumes(
    engine: Arc<dyn VolumeEngine>,
    store: Arc<dyn ArtifactStore>,
    pool: &WorkPool,
    rest_path: &Path,
    mask_path: &Path,
    out_dir: &Path,
    num_vols: u32,
    budget: Duration,
) -> Result<BTreeMap<u32, PathBuf>> {
    let mut handles = Vec::with_capacity(num_vols as usize);
    for idx in 0..num_vols {
        let out_path = out_dir.join(SessionPaths::zscored_name(idx));
        if store.exists(&out_path) {
            debug!(vol = idx, "zscore output present, skipping");
            continue;
        }
        let engine = Arc::clone(&engine);
        let rest = rest_path.to_path_buf();
        let mask = mask_path.to_path_buf();
        handles.push(pool.submit(format!("zscore_vol{idx:04}"), move || {
            zscore_one(engine.as_ref(), &rest, idx, &mask, &out_path)
        }));
    }

    let scheduled = handles.len();
    let ok = join_all(handles, budget);
    info!(scheduled, ok, num_vols, "normalization fan-in complete");

    let mut produced = BTreeMap::new();
    for idx in 0..num_vols {
        let out_path = out_dir.join(SessionPaths::zscored_name(idx));
        if store.exists(&out_path) {
            produced.insert(idx, out_path);
        }
    }
    let found = produced.len() as u32;
    if found != num_vols {
        return Err(Error::NormalizationIncomplete {
            expected: num_vols,
            found,
        }
        .into());
    }
    Ok(produced)
}

/// One unit of work: mask-confined mean/stdev, then the elementwise
/// transform written to `out_path`.
fn zscore_one(
    engine: &dyn VolumeEngine,
    rest_path: &Path,
    vol_idx: u32,
    mask_path: &Path,
    out_path: &Path,
) -> Result<()> {
    let mean = engine.mean(rest_path, vol_idx, mask_path)?;
    let stdev = engine.stdev(rest_path, vol_idx, mask_path)?;
    engine.write_zscore(rest_path, vol_idx, mask_path, mean, stdev, out_path)
}
