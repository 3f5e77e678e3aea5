use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Single seam for every skip-if-exists decision in the pipeline.
/// All three data-producing components route their idempotence checks
/// and intermediate reads/writes through this trait, so tests can
/// swap in an in-memory fake.
pub trait ArtifactStore: Send + Sync {
    fn exists(&self, key: &Path) -> bool;
    fn read_to_string(&self, key: &Path) -> Result<String>;
    fn write(&self, key: &Path, data: &str) -> Result<()>;
    fn append_line(&self, key: &Path, line: &str) -> Result<()>;
    fn remove(&self, key: &Path) -> Result<()>;
}

/// Filesystem-backed store.
#[derive(Debug, Default)]
pub struct FsStore;

impl ArtifactStore for FsStore {
    fn exists(&self, key: &Path) -> bool {
        key.exists()
    }

    fn read_to_string(&self, key: &Path) -> Result<String> {
        fs::read_to_string(key).with_context(|| format!("failed to read {}", key.display()))
    }

    fn write(&self, key: &Path, data: &str) -> Result<()> {
        if let Some(parent) = key.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(key, data).with_context(|| format!("failed to write {}", key.display()))
    }

    fn append_line(&self, key: &Path, line: &str) -> Result<()> {
        use std::io::Write;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(key)
            .with_context(|| format!("failed to open {}", key.display()))?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    fn remove(&self, key: &Path) -> Result<()> {
        fs::remove_file(key).with_context(|| format!("failed to remove {}", key.display()))
    }
}

/// In-memory store for tests.
#[derive(Debug, Default)]
pub struct MemStore {
    files: std::sync::Mutex<std::collections::BTreeMap<PathBuf, String>>,
}

impl ArtifactStore for MemStore {
    fn exists(&self, key: &Path) -> bool {
        self.files.lock().unwrap().contains_key(key)
    }

    fn read_to_string(&self, key: &Path) -> Result<String> {
        self.files
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .with_context(|| format!("no artifact {}", key.display()))
    }

    fn write(&self, key: &Path, data: &str) -> Result<()> {
        self.files
            .lock()
            .unwrap()
            .insert(key.to_path_buf(), data.to_string());
        Ok(())
    }

    fn append_line(&self, key: &Path, line: &str) -> Result<()> {
        let mut files = self.files.lock().unwrap();
        let entry = files.entry(key.to_path_buf()).or_default();
        entry.push_str(line);
        entry.push('\n');
        Ok(())
    }

    fn remove(&self, key: &Path) -> Result<()> {
        self.files
            .lock()
            .unwrap()
            .remove(key)
            .map(|_| ())
            .with_context(|| format!("no artifact {}", key.display()))
    }
}
