use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

use crate::error::Error;

/// Validated runtime configuration. Built once at startup; every
/// required external secret/path is checked here so no unit is ever
/// scheduled against a half-configured environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Private key for the archival host (env RSA_LS2).
    pub rsa_key: PathBuf,
    /// Singularity image holding the AFNI toolkit (env SING_AFNI).
    pub afni_image: PathBuf,
    /// Path of the results database (env SQL_DB).
    pub db_path: PathBuf,
    /// Account name on the archival host (env USER).
    pub user: String,
    /// Session-scoped derivatives root.
    pub work_deriv: PathBuf,
    /// Scheduler/system log directory.
    pub log_dir: PathBuf,
    /// Max concurrent normalization units.
    pub max_jobs: usize,
    /// Wall-clock budget per scheduled unit.
    pub unit_timeout: Duration,
}

impl Config {
    /// Read and validate the environment contract for `proj_name`.
    pub fn from_env(proj_name: &str, work_dir: Option<PathBuf>) -> Result<Self> {
        let rsa_key = require_env("RSA_LS2")?;
        let afni_image = require_env("SING_AFNI")?;
        let db_path = require_env("SQL_DB")?;
        let user = require_env("USER")?;

        let work_deriv = match work_dir {
            Some(dir) => dir,
            None => default_work_deriv(proj_name, &user),
        };
        let log_dir = work_deriv.join("logs");

        Ok(Self {
            rsa_key: PathBuf::from(rsa_key),
            afni_image: PathBuf::from(afni_image),
            db_path: PathBuf::from(db_path),
            user,
            work_deriv,
            log_dir,
            max_jobs: 10,
            unit_timeout: Duration::from_secs(3600),
        })
    }

    /// Create the working and log directories.
    pub fn bootstrap_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.work_deriv)?;
        std::fs::create_dir_all(&self.log_dir)?;
        Ok(())
    }
}

fn require_env(name: &str) -> Result<String> {
    match env::var(name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(Error::Configuration(format!(
            "no global variable '{name}' defined in user env"
        ))
        .into()),
    }
}

fn default_work_deriv(proj_name: &str, user: &str) -> PathBuf {
    let dir_name = if proj_name == "emorep" {
        "EmoRep"
    } else {
        "Archival"
    };
    PathBuf::from("/work")
        .join(user)
        .join(dir_name)
        .join("classify_rest")
}

/// The emorep project only carries day2/day3 sessions; archival only
/// carries BAS1. Reject mismatches before any scheduling.
pub fn check_proj_sess(proj_name: &str, sess_list: &[String]) -> Result<()> {
    let valid: &[&str] = match proj_name {
        "emorep" => &["ses-day2", "ses-day3"],
        "archival" => &["ses-BAS1"],
        other => {
            return Err(Error::Configuration(format!("unsupported project '{other}'")).into());
        }
    };
    for sess in sess_list {
        if !valid.contains(&sess.as_str()) {
            return Err(Error::Configuration(format!(
                "session '{sess}' not valid for project '{proj_name}'"
            ))
            .into());
        }
    }
    Ok(())
}
