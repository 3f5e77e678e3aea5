use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::info;

use crate::error::Error;
use crate::session::SessionKey;
use crate::sync::{remote, DataSync};
use crate::EMOTIONS;

/// Resolve the mask path for a session, failing fast if setup has not
/// been run.
pub fn mask_path(work_deriv: &Path, key: &SessionKey) -> Result<PathBuf> {
    let path = work_deriv.join(&key.mask_name);
    if !path.exists() {
        return Err(Error::MissingSetup(format!("mask {}", path.display())).into());
    }
    Ok(path)
}

/// Resolve all weight maps for a session, alphabetical by emotion.
/// A fully configured classifier has exactly one map per canonical
/// emotion; anything less is a setup error raised before any unit is
/// scheduled.
pub fn weight_map_paths(work_deriv: &Path, key: &SessionKey) -> Result<BTreeMap<String, PathBuf>> {
    let mut maps = BTreeMap::new();
    let mut missing = Vec::new();
    for emo in EMOTIONS {
        let path = work_deriv.join(key.weight_map_name(emo));
        if path.exists() {
            maps.insert(emo.to_string(), path);
        } else {
            missing.push(emo);
        }
    }
    if !missing.is_empty() {
        return Err(Error::MissingSetup(format!(
            "weight maps for {} of {} emotions ({})",
            missing.len(),
            EMOTIONS.len(),
            missing.join(", ")
        ))
        .into());
    }
    Ok(maps)
}

/// Fetch the group mask and the per-emotion weight maps into the
/// working derivatives directory. Existing files are not re-fetched.
pub fn run_setup(sync: &dyn DataSync, work_deriv: &Path, key: &SessionKey) -> Result<()> {
    std::fs::create_dir_all(work_deriv)?;

    let mask_dst = work_deriv.join(&key.mask_name);
    if !mask_dst.exists() {
        sync.fetch(&remote::mask_path(&key.proj, &key.mask_name), work_deriv)?;
        if !mask_dst.exists() {
            return Err(Error::MissingSetup(format!("mask {}", mask_dst.display())).into());
        }
    }

    for emo in EMOTIONS {
        let name = key.weight_map_name(emo);
        let dst = work_deriv.join(&name);
        if dst.exists() {
            continue;
        }
        sync.fetch(&remote::weight_map_path(&key.proj, &name), work_deriv)?;
    }

    let maps = weight_map_paths(work_deriv, key)?;
    info!(maps = maps.len(), "setup artifacts ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> SessionKey {
        SessionKey {
            subj: "sub-ER0016".into(),
            sess: "ses-day2".into(),
            proj: "emorep".into(),
            mask_name: "tpl_GM_mask.nii.gz".into(),
            model_name: "sep".into(),
            task_name: "movies".into(),
            con_name: "stim".into(),
            mask_sig: false,
        }
    }

    #[test]
    fn missing_mask_is_setup_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = mask_path(dir.path(), &key()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::MissingSetup(_))
        ));
    }

    #[test]
    fn partial_weight_set_is_setup_error() {
        let dir = tempfile::tempdir().unwrap();
        let k = key();
        // 14 of 15 maps present.
        for emo in EMOTIONS.iter().skip(1) {
            std::fs::write(dir.path().join(k.weight_map_name(emo)), "x").unwrap();
        }
        let err = weight_map_paths(dir.path(), &k).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("amusement"), "unexpected message: {msg}");
    }

    #[test]
    fn full_weight_set_resolves_alphabetically() {
        let dir = tempfile::tempdir().unwrap();
        let k = key();
        for emo in EMOTIONS {
            std::fs::write(dir.path().join(k.weight_map_name(emo)), "x").unwrap();
        }
        let maps = weight_map_paths(dir.path(), &k).unwrap();
        assert_eq!(maps.len(), 15);
        let names: Vec<_> = maps.keys().cloned().collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }
}
