//! Shared test fixtures: a plain-text volume engine and a local fake
//! of the remote sync collaborator.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};

use classify_rest::engine::VolumeEngine;
use classify_rest::sync::DataSync;

/// Volume engine over plain-text images. A 4D series is a text file
/// with one volume per line (whitespace-separated voxel values); masks
/// and weight maps are single-line vectors in the same space. The dot
/// output mimics the container wrapper by interleaving chatter with
/// the score.
pub struct TextEngine {
    pub calls: Arc<AtomicUsize>,
    /// Volume indices whose units should fail, for fault injection.
    pub fail_vols: Vec<u32>,
}

impl TextEngine {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            fail_vols: Vec::new(),
        }
    }

    pub fn failing_on(vols: &[u32]) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            fail_vols: vols.to_vec(),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn tick(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn check_fail(&self, vol_idx: u32) -> Result<()> {
        if self.fail_vols.contains(&vol_idx) {
            anyhow::bail!("injected failure for volume {vol_idx}");
        }
        Ok(())
    }
}

pub fn read_vector(path: &Path) -> Result<Vec<f64>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(raw
        .split_whitespace()
        .map(|t| t.parse::<f64>().unwrap())
        .collect())
}

pub fn write_vector(path: &Path, values: &[f64]) {
    let line: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    std::fs::write(path, line.join(" ")).unwrap();
}

pub fn write_series(path: &Path, volumes: &[Vec<f64>]) {
    let lines: Vec<String> = volumes
        .iter()
        .map(|vol| {
            vol.iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect();
    std::fs::write(path, lines.join("\n")).unwrap();
}

fn read_volume(series_path: &Path, vol_idx: u32) -> Result<Vec<f64>> {
    let raw = std::fs::read_to_string(series_path)?;
    let line = raw
        .lines()
        .nth(vol_idx as usize)
        .with_context(|| format!("no volume {vol_idx} in {}", series_path.display()))?;
    Ok(line
        .split_whitespace()
        .map(|t| t.parse::<f64>().unwrap())
        .collect())
}

fn masked(values: &[f64], mask: &[f64]) -> Vec<f64> {
    values
        .iter()
        .zip(mask)
        .filter(|(_, m)| **m != 0.0)
        .map(|(v, _)| *v)
        .collect()
}

impl VolumeEngine for TextEngine {
    fn num_vols(&self, series_path: &Path) -> Result<u32> {
        self.tick();
        let raw = std::fs::read_to_string(series_path)?;
        Ok(raw.lines().filter(|l| !l.trim().is_empty()).count() as u32)
    }

    fn mean(&self, series_path: &Path, vol_idx: u32, mask_path: &Path) -> Result<f64> {
        self.tick();
        self.check_fail(vol_idx)?;
        let vals = masked(&read_volume(series_path, vol_idx)?, &read_vector(mask_path)?);
        Ok(vals.iter().sum::<f64>() / vals.len() as f64)
    }

    fn stdev(&self, series_path: &Path, vol_idx: u32, mask_path: &Path) -> Result<f64> {
        self.tick();
        self.check_fail(vol_idx)?;
        let vals = masked(&read_volume(series_path, vol_idx)?, &read_vector(mask_path)?);
        let mean = vals.iter().sum::<f64>() / vals.len() as f64;
        let var = vals.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / vals.len() as f64;
        Ok(var.sqrt())
    }

    fn write_zscore(
        &self,
        series_path: &Path,
        vol_idx: u32,
        mask_path: &Path,
        mean: f64,
        stdev: f64,
        out_path: &Path,
    ) -> Result<()> {
        self.tick();
        self.check_fail(vol_idx)?;
        let vol = read_volume(series_path, vol_idx)?;
        let mask = read_vector(mask_path)?;
        let out: Vec<f64> = vol
            .iter()
            .zip(&mask)
            .map(|(v, m)| m * ((v - mean) / stdev))
            .collect();
        write_vector(out_path, &out);
        Ok(())
    }

    fn dot(&self, vol_path: &Path, weight_path: &Path, mask_path: &Path) -> Result<String> {
        self.tick();
        let vol = read_vector(vol_path)?;
        let weight = read_vector(weight_path)?;
        let mask = read_vector(mask_path)?;
        let score: f64 = vol
            .iter()
            .zip(&weight)
            .zip(&mask)
            .filter(|((_, _), m)| **m != 0.0)
            .map(|((v, w), _)| v * w)
            .sum();
        Ok(format!(
            "++ Executing 3ddot\nContainer environment ready\n{score}\n"
        ))
    }
}

/// Local stand-in for the archival host: fetches copy a fixture file,
/// publishes are recorded.
pub struct FakeSync {
    pub rest_fixture: Option<PathBuf>,
    pub published: Mutex<Vec<String>>,
}

impl FakeSync {
    pub fn new(rest_fixture: Option<PathBuf>) -> Self {
        Self {
            rest_fixture,
            published: Mutex::new(Vec::new()),
        }
    }
}

impl DataSync for FakeSync {
    fn fetch(&self, remote: &str, dest: &Path) -> Result<()> {
        if remote.ends_with("res4d.nii.gz") {
            if let Some(fixture) = &self.rest_fixture {
                std::fs::create_dir_all(dest)?;
                std::fs::copy(fixture, dest.join("res4d.nii.gz"))?;
            }
        }
        Ok(())
    }

    fn publish(&self, _local: &Path, remote: &str) -> Result<()> {
        self.published.lock().unwrap().push(remote.to_string());
        Ok(())
    }
}
