use std::collections::BTreeMap;

use anyhow::Result;

use crate::dotprod::EmotionSeries;
use crate::error::Error;

/// Final per-session table: one row per volume (1-based), one score
/// column per emotion, and the argmax label. Column order is
/// alphabetical by emotion name.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelTable {
    pub emotions: Vec<String>,
    pub rows: Vec<LabelRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabelRow {
    pub volume: u32,
    /// Parallel to `LabelTable::emotions`; `None` is a missing cell.
    pub scores: Vec<Option<f64>>,
    pub label_max: Option<String>,
}

impl LabelTable {
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// label -> row count, for the session summary.
    pub fn label_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for row in &self.rows {
            if let Some(label) = &row.label_max {
                *counts.entry(label.clone()).or_insert(0) += 1;
            }
        }
        counts
    }
}

/// Merge the per-emotion series into the label table.
///
/// Each series is left-joined on volume number; a volume/emotion pair
/// with no finite score stays a missing cell and is reported through
/// `warnings` (it degrades that row's label). Ties for the maximum
/// break alphabetically: the first emotion in column order wins
/// because later columns must be strictly greater to displace it.
pub fn aggregate(
    series_by_emotion: &BTreeMap<String, EmotionSeries>,
    num_vols: u32,
    warnings: &mut Vec<String>,
) -> Result<LabelTable> {
    if series_by_emotion.is_empty() {
        return Err(Error::NoData.into());
    }

    // BTreeMap keys give the alphabetical column order.
    let emotions: Vec<String> = series_by_emotion.keys().cloned().collect();

    let mut rows = Vec::with_capacity(num_vols as usize);
    for volume in 1..=num_vols {
        let mut scores = Vec::with_capacity(emotions.len());
        for emo in &emotions {
            let score = series_by_emotion[emo]
                .score_for(volume)
                .filter(|s| s.is_finite());
            scores.push(score);
        }
        let label_max = argmax_label(&emotions, &scores);
        rows.push(LabelRow {
            volume,
            scores,
            label_max,
        });
    }

    for (i, emo) in emotions.iter().enumerate() {
        let missing = rows.iter().filter(|r| r.scores[i].is_none()).count();
        if missing > 0 {
            warnings.push(format!(
                "emotion '{emo}' missing {missing} of {num_vols} volume scores"
            ));
        }
    }

    Ok(LabelTable { emotions, rows })
}

fn argmax_label(emotions: &[String], scores: &[Option<f64>]) -> Option<String> {
    let mut best: Option<(usize, f64)> = None;
    for (i, score) in scores.iter().enumerate() {
        if let Some(s) = *score {
            match best {
                Some((_, b)) if s <= b => {}
                _ => best = Some((i, s)),
            }
        }
    }
    best.map(|(i, _)| emotions[i].clone())
}
