use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use tracing::debug;

use super::{parse_scalar, VolumeEngine};

/// AFNI toolkit invoked inside a singularity image. Each call shells
/// out to one AFNI program with the mask, weight and working
/// directories bound into the container.
#[derive(Debug, Clone)]
pub struct AfniEngine {
    image: PathBuf,
}

impl AfniEngine {
    pub fn new(image: impl Into<PathBuf>) -> Self {
        Self {
            image: image.into(),
        }
    }

    fn container_args(&self, bind_dirs: &[&Path]) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "--cleanenv".to_string(),
        ];
        for dir in bind_dirs {
            let d = dir.display();
            args.push("--bind".to_string());
            args.push(format!("{d}:{d}"));
        }
        args.push(self.image.display().to_string());
        args
    }

    fn run_afni(&self, bind_dirs: &[&Path], afni_args: &[String]) -> Result<String> {
        let mut cmd = Command::new("singularity");
        cmd.args(self.container_args(bind_dirs));
        cmd.args(afni_args);
        debug!(?afni_args, "afni call");
        let output = cmd
            .output()
            .with_context(|| format!("failed to launch singularity for {:?}", afni_args.first()))?;
        if !output.status.success() {
            bail!(
                "afni call {:?} failed: {}",
                afni_args.first(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn brick_stat(&self, flag: &str, series: &Path, idx: u32, mask: &Path) -> Result<f64> {
        let stdout = self.run_afni(
            &bind_set(&[series, mask]),
            &[
                "3dBrickStat".to_string(),
                flag.to_string(),
                "-mask".to_string(),
                mask.display().to_string(),
                sub_brick(series, idx),
            ],
        )?;
        parse_scalar(&stdout)
            .with_context(|| format!("no numeric output from 3dBrickStat {flag} [{idx}]"))
    }
}

impl VolumeEngine for AfniEngine {
    fn num_vols(&self, series_path: &Path) -> Result<u32> {
        let stdout = self.run_afni(
            &bind_set(&[series_path]),
            &[
                "3dinfo".to_string(),
                "-nv".to_string(),
                series_path.display().to_string(),
            ],
        )?;
        let n = parse_scalar(&stdout).context("no volume count from 3dinfo -nv")?;
        Ok(n as u32)
    }

    fn mean(&self, series_path: &Path, vol_idx: u32, mask_path: &Path) -> Result<f64> {
        self.brick_stat("-mean", series_path, vol_idx, mask_path)
    }

    fn stdev(&self, series_path: &Path, vol_idx: u32, mask_path: &Path) -> Result<f64> {
        self.brick_stat("-stdev", series_path, vol_idx, mask_path)
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
        let _ = self.run_afni(
            &bind_set(&[series_path, mask_path, out_path]),
            &[
                "3dcalc".to_string(),
                "-a".to_string(),
                sub_brick(series_path, vol_idx),
                "-b".to_string(),
                mask_path.display().to_string(),
                "-expr".to_string(),
                format!("b*((a-{mean})/{stdev})"),
                "-prefix".to_string(),
                out_path.display().to_string(),
            ],
        )?;
        Ok(())
    }

    fn dot(&self, vol_path: &Path, weight_path: &Path, mask_path: &Path) -> Result<String> {
        self.run_afni(
            &bind_set(&[vol_path, weight_path, mask_path]),
            &[
                "3ddot".to_string(),
                "-mask".to_string(),
                mask_path.display().to_string(),
                "-dodot".to_string(),
                vol_path.display().to_string(),
                weight_path.display().to_string(),
            ],
        )
    }
}

/// Parent directories to bind into the container, deduplicated.
fn bind_set<'a>(paths: &[&'a Path]) -> Vec<&'a Path> {
    let mut dirs: Vec<&Path> = paths.iter().filter_map(|p| p.parent()).collect();
    dirs.sort();
    dirs.dedup();
    dirs
}

/// AFNI sub-brick selector, e.g. `res4d.nii.gz[12]`.
fn sub_brick(series: &Path, idx: u32) -> String {
    format!("{}[{idx}]", series.display())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_brick_selector() {
        assert_eq!(
            sub_brick(Path::new("/data/res4d.nii.gz"), 12),
            "/data/res4d.nii.gz[12]"
        );
    }

    #[test]
    fn bind_set_dedupes_parents() {
        let a = Path::new("/work/s1/func/res4d.nii.gz");
        let b = Path::new("/work/s1/func/mask.nii.gz");
        let c = Path::new("/work/tpl/mask.nii.gz");
        let dirs = bind_set(&[a, b, c]);
        assert_eq!(dirs.len(), 2);
    }

    #[test]
    fn container_args_bind_each_dir() {
        let eng = AfniEngine::new("/images/afni.simg");
        let args = eng.container_args(&[Path::new("/work/a")]);
        assert_eq!(
            args,
            vec![
                "run".to_string(),
                "--cleanenv".to_string(),
                "--bind".to_string(),
                "/work/a:/work/a".to_string(),
                "/images/afni.simg".to_string(),
            ]
        );
    }
}
