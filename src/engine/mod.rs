pub mod afni;

use std::path::Path;

use anyhow::Result;

/// Numerical kernel collaborator. Volumes, masks and weight maps are
/// opaque image files; every voxel-wise operation is delegated here.
pub trait VolumeEngine: Send + Sync {
    /// Number of volumes in a 4D time series.
    fn num_vols(&self, series_path: &Path) -> Result<u32>;

    /// Mean of one volume's voxels within the mask.
    fn mean(&self, series_path: &Path, vol_idx: u32, mask_path: &Path) -> Result<f64>;

    /// Standard deviation of one volume's voxels within the mask.
    fn stdev(&self, series_path: &Path, vol_idx: u32, mask_path: &Path) -> Result<f64>;

    /// Write `(v - mean) / stdev` of one volume to `out_path`,
    /// restricted to the mask. `stdev == 0` is not guarded; the
    /// non-finite result is written as-is.
    fn write_zscore(
        &self,
        series_path: &Path,
        vol_idx: u32,
        mask_path: &Path,
        mean: f64,
        stdev: f64,
        out_path: &Path,
    ) -> Result<()>;

    /// Dot product between a (z-scored) volume and a weight map within
    /// the mask. Returns the kernel's raw output stream; the invocation
    /// wrapper may interleave container chatter with the score, so
    /// callers sanitize before parsing.
    fn dot(&self, vol_path: &Path, weight_path: &Path, mask_path: &Path) -> Result<String>;
}

/// Markers of container wrapper chatter that the kernel invocation may
/// interleave with numeric output.
pub const NOISE_MARKERS: [&str; 2] = ["Container", "Executing"];

/// Drop wrapper boilerplate from a kernel output stream, keeping only
/// lines that can carry scores.
pub fn filter_container_noise(raw: &str) -> Vec<&str> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !NOISE_MARKERS.iter().any(|m| line.contains(m)))
        .collect()
}

/// First numeric token of a sanitized kernel output stream.
pub fn parse_scalar(raw: &str) -> Option<f64> {
    filter_container_noise(raw)
        .into_iter()
        .flat_map(str::split_whitespace)
        .find_map(|tok| tok.parse::<f64>().ok())
}
