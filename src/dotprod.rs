use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{debug, info};

use crate::artifact::ArtifactStore;
use crate::engine::{filter_container_noise, VolumeEngine};
use crate::session::SessionPaths;

/// Ordered dot-product scores of one emotion's weight map against the
/// z-scored volumes. Volume numbers are 1-based, matching the output
/// table.
#[derive(Debug, Clone, PartialEq)]
pub struct EmotionSeries {
    pub emotion: String,
    pub scores: Vec<(u32, f64)>,
}

impl EmotionSeries {
    pub fn score_for(&self, volume: u32) -> Option<f64> {
        self.scores
            .iter()
            .find(|(v, _)| *v == volume)
            .map(|(_, s)| *s)
    }
}

/// One per-emotion unit: dot every normalized volume against
/// `weight_path` in strictly increasing index order, appending the
/// kernel's raw output to a flat per-emotion text stream, then
/// sanitize the stream and parse it into an `EmotionSeries`.
///
/// The parsed stream is persisted as `tmp_<emo>_weight.csv`; a unit
/// whose csv already exists re-parses it and does not call the kernel.
/// A volume whose kernel call fails or yields no numeric line becomes
/// a missing data point, not a unit failure.
pub fn compute_series(
    engine: &dyn VolumeEngine,
    store: &dyn ArtifactStore,
    volumes: &BTreeMap<u32, PathBuf>,
    mask_path: &Path,
    weight_path: &Path,
    emotion: &str,
    out_dir: &Path,
) -> Result<EmotionSeries> {
    let csv_path = out_dir.join(SessionPaths::series_csv_name(emotion));
    if store.exists(&csv_path) {
        debug!(emotion, "series csv present, skipping kernel calls");
        return parse_series_csv(store, &csv_path, emotion);
    }

    let txt_path = out_dir.join(SessionPaths::series_txt_name(emotion));
    store.write(&txt_path, "")?;

    for (idx, vol_path) in volumes {
        match engine.dot(vol_path, weight_path, mask_path) {
            Ok(raw) => {
                for line in raw.lines() {
                    store.append_line(&txt_path, line)?;
                }
            }
            Err(err) => {
                debug!(emotion, vol = idx, "kernel call failed: {err:#}");
            }
        }
    }

    // Sanitize the stream of container verbiage, keep numeric lines.
    let raw = store.read_to_string(&txt_path)?;
    let clean: Vec<String> = filter_container_noise(&raw)
        .into_iter()
        .filter(|line| line.parse::<f64>().is_ok())
        .map(str::to_string)
        .collect();
    store.write(&csv_path, &(clean.join("\n") + "\n"))?;
    store.remove(&txt_path)?;

    let series = parse_series_csv(store, &csv_path, emotion)?;
    info!(
        emotion,
        points = series.scores.len(),
        volumes = volumes.len(),
        "emotion series complete"
    );
    Ok(series)
}

/// Parse a sanitized one-score-per-line stream; volume numbers are
/// assigned sequentially from 1.
pub fn parse_series_csv(
    store: &dyn ArtifactStore,
    csv_path: &Path,
    emotion: &str,
) -> Result<EmotionSeries> {
    let raw = store.read_to_string(csv_path)?;
    let scores = raw
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter_map(|l| l.parse::<f64>().ok())
        .enumerate()
        .map(|(i, s)| (i as u32 + 1, s))
        .collect();
    Ok(EmotionSeries {
        emotion: emotion.to_string(),
        scores,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::MemStore;

    #[test]
    fn parse_assigns_one_based_volumes() {
        let store = MemStore::default();
        let path = Path::new("/s/tmp_joy_weight.csv");
        store.write(path, "0.8\n0.5\n0.1\n").unwrap();
        let series = parse_series_csv(&store, path, "joy").unwrap();
        assert_eq!(
            series.scores,
            vec![(1, 0.8), (2, 0.5), (3, 0.1)],
        );
    }

    #[test]
    fn parse_skips_blank_lines() {
        let store = MemStore::default();
        let path = Path::new("/s/tmp_awe_weight.csv");
        store.write(path, "1.5\n\n-2.25\n").unwrap();
        let series = parse_series_csv(&store, path, "awe").unwrap();
        assert_eq!(series.scores, vec![(1, 1.5), (2, -2.25)]);
    }

    #[test]
    fn score_for_missing_volume() {
        let series = EmotionSeries {
            emotion: "fear".into(),
            scores: vec![(1, 0.3), (3, 0.9)],
        };
        assert_eq!(series.score_for(3), Some(0.9));
        assert_eq!(series.score_for(2), None);
    }
}
