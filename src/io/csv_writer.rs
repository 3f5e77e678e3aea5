use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::aggregate::LabelTable;

/// Write the final session CSV: `volume,emo_<name>...,label_max`, one
/// row per volume. Missing cells are empty fields. Output is
/// deterministic so idempotent re-runs are byte-identical.
pub fn write_label_csv(path: &Path, table: &LabelTable) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let mut w = BufWriter::new(file);

    let mut header = String::from("volume");
    for emo in &table.emotions {
        header.push_str(",emo_");
        header.push_str(emo);
    }
    header.push_str(",label_max");
    writeln!(w, "{header}")?;

    for row in &table.rows {
        if row.scores.len() != table.emotions.len() {
            bail!(
                "row {} score count mismatch: {} != {}",
                row.volume,
                row.scores.len(),
                table.emotions.len()
            );
        }
        write!(w, "{}", row.volume)?;
        for score in &row.scores {
            match score {
                Some(s) => write!(w, ",{s}")?,
                None => write!(w, ",")?,
            }
        }
        writeln!(w, ",{}", row.label_max.as_deref().unwrap_or(""))?;
    }
    w.flush()?;
    Ok(())
}
