use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use tracing::info;

/// Remote transfer collaborator. `fetch` pulls a remote file or tree
/// into a local directory; `publish` pushes a local directory to the
/// archival host.
pub trait DataSync: Send + Sync {
    fn fetch(&self, remote: &str, dest: &Path) -> Result<()>;
    fn publish(&self, local: &Path, remote: &str) -> Result<()>;
}

/// rsync-over-ssh against the archival host.
#[derive(Debug, Clone)]
pub struct RsyncSync {
    rsa_key: PathBuf,
    user: String,
    host: String,
}

impl RsyncSync {
    pub fn new(rsa_key: impl Into<PathBuf>, user: impl Into<String>) -> Self {
        Self {
            rsa_key: rsa_key.into(),
            user: user.into(),
            host: "ccn-labarserv2.vm.duke.edu".to_string(),
        }
    }

    fn run_rsync(&self, src: &str, dst: &str) -> Result<()> {
        let ssh = format!("ssh -i {}", self.rsa_key.display());
        let output = Command::new("rsync")
            .args(["-e", &ssh, "-rauv", src, dst])
            .output()
            .context("failed to launch rsync")?;
        if !output.status.success() {
            bail!(
                "rsync {src} -> {dst} failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }

    fn remote_spec(&self, path: &str) -> String {
        format!("{}@{}:{}", self.user, self.host, path)
    }
}

impl DataSync for RsyncSync {
    fn fetch(&self, remote: &str, dest: &Path) -> Result<()> {
        std::fs::create_dir_all(dest)?;
        info!(remote, dest = %dest.display(), "fetching");
        self.run_rsync(&self.remote_spec(remote), &dest.display().to_string())
    }

    fn publish(&self, local: &Path, remote: &str) -> Result<()> {
        info!(local = %local.display(), remote, "publishing");
        self.run_rsync(&local.display().to_string(), &self.remote_spec(remote))
    }
}

/// Remote directory layout of the archival store.
pub mod remote {
    fn proj_root(proj: &str) -> String {
        let dir = if proj == "emorep" {
            "Exp2_Compute_Emotion"
        } else {
            "Exp3_Classify_Archival"
        };
        format!("/mnt/keoki/experiments2/EmoRep/{dir}")
    }

    fn deriv_root(proj: &str) -> String {
        let mri_dir = if proj == "emorep" {
            "data_scanner_BIDS"
        } else {
            "data_mri_BIDS"
        };
        format!("{}/{mri_dir}/derivatives", proj_root(proj))
    }

    pub fn mask_path(proj: &str, mask_name: &str) -> String {
        format!("{}/analyses/model_fsl_group/{mask_name}", proj_root(proj))
    }

    pub fn weight_map_path(proj: &str, weight_name: &str) -> String {
        format!(
            "{}/analyses/classify_fMRI_plsda/classifier_output/{weight_name}",
            proj_root(proj)
        )
    }

    pub fn rest_path(proj: &str, subj: &str, sess: &str) -> String {
        format!(
            "{}/model_fsl/{subj}/{sess}/func/run-01_level-first_name-rest.feat/stats/res4d.nii.gz",
            deriv_root(proj)
        )
    }

    pub fn upload_dir(proj: &str) -> String {
        format!("{}/classify_rest", deriv_root(proj))
    }
}

/// Strip intermediates from a session tree so only final
/// `df_dot-product*` artifacts are published.
pub fn clean_for_publish(session_dir: &Path) -> Result<()> {
    let mut stack = vec![session_dir.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                let name = entry.file_name();
                let keep = name.to_string_lossy().contains("df_dot-product");
                if !keep {
                    std::fs::remove_file(&path)
                        .with_context(|| format!("failed to remove {}", path.display()))?;
                }
            }
        }
    }
    Ok(())
}
