use std::collections::BTreeMap;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::aggregate::LabelTable;
use crate::session::SessionKey;

/// Per-session run summary persisted next to the CSV.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionSummary {
    pub subj: String,
    pub sess: String,
    pub proj: String,
    pub mask: String,
    pub model: String,
    pub task: String,
    pub contrast: String,
    pub mask_sig: bool,
    pub num_vols: usize,
    pub label_counts: BTreeMap<String, usize>,
    pub warnings: Vec<String>,
}

impl SessionSummary {
    pub fn build(key: &SessionKey, table: &LabelTable, warnings: &[String]) -> Self {
        Self {
            subj: key.subj.clone(),
            sess: key.sess.clone(),
            proj: key.proj.clone(),
            mask: key.mask_name.clone(),
            model: key.model_name.clone(),
            task: key.task_name.clone(),
            contrast: key.con_name.clone(),
            mask_sig: key.mask_sig,
            num_vols: table.num_rows(),
            label_counts: table.label_counts(),
            warnings: warnings.to_vec(),
        }
    }
}

pub fn write_summary(path: &Path, summary: &SessionSummary) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, summary)?;
    Ok(())
}
