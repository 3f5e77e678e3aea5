use std::collections::BTreeMap;

use tempfile::TempDir;

use classify_rest::aggregate::aggregate;
use classify_rest::dotprod::EmotionSeries;
use classify_rest::io::csv_writer::write_label_csv;

fn series(emotion: &str, scores: &[f64]) -> EmotionSeries {
    EmotionSeries {
        emotion: emotion.to_string(),
        scores: scores
            .iter()
            .enumerate()
            .map(|(i, s)| (i as u32 + 1, *s))
            .collect(),
    }
}

#[test]
fn joy_anger_three_volume_scenario() {
    let mut map = BTreeMap::new();
    map.insert("joy".to_string(), series("joy", &[0.8, 0.5, 0.1]));
    map.insert("anger".to_string(), series("anger", &[0.2, 0.5, 0.9]));

    let mut warnings = Vec::new();
    let table = aggregate(&map, 3, &mut warnings).unwrap();

    let labels: Vec<_> = table
        .rows
        .iter()
        .map(|r| r.label_max.clone().unwrap())
        .collect();
    // Volume 2 ties 0.5/0.5; alphabetical tie-break picks "anger".
    assert_eq!(labels, vec!["joy", "anger", "anger"]);
    assert!(warnings.is_empty());
}

#[test]
fn table_shape_matches_volume_and_emotion_counts() {
    let mut map = BTreeMap::new();
    for emo in ["anger", "fear", "joy"] {
        map.insert(emo.to_string(), series(emo, &[0.1, 0.2, 0.3, 0.4]));
    }
    let mut warnings = Vec::new();
    let table = aggregate(&map, 4, &mut warnings).unwrap();

    assert_eq!(table.num_rows(), 4);
    assert_eq!(table.emotions.len(), 3);
    let volumes: Vec<u32> = table.rows.iter().map(|r| r.volume).collect();
    assert_eq!(volumes, vec![1, 2, 3, 4]);
    for row in &table.rows {
        assert_eq!(row.scores.len(), table.emotions.len());
    }
}

#[test]
fn label_equals_column_with_maximum_score() {
    let mut map = BTreeMap::new();
    map.insert("calmness".to_string(), series("calmness", &[0.9, 0.1]));
    map.insert("surprise".to_string(), series("surprise", &[0.3, 0.7]));
    let mut warnings = Vec::new();
    let table = aggregate(&map, 2, &mut warnings).unwrap();

    for row in &table.rows {
        let best = table
            .emotions
            .iter()
            .zip(&row.scores)
            .max_by(|a, b| a.1.unwrap().partial_cmp(&b.1.unwrap()).unwrap())
            .unwrap()
            .0;
        assert_eq!(row.label_max.as_deref(), Some(best.as_str()));
    }
}

#[test]
fn csv_rows_align_one_based() {
    let mut map = BTreeMap::new();
    map.insert("joy".to_string(), series("joy", &[0.8, 0.5]));
    map.insert("anger".to_string(), series("anger", &[0.2, 0.6]));
    let mut warnings = Vec::new();
    let table = aggregate(&map, 2, &mut warnings).unwrap();

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("df_dot-product_test.csv");
    write_label_csv(&path, &table).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "volume,emo_anger,emo_joy,label_max");
    assert_eq!(lines[1], "1,0.2,0.8,joy");
    assert_eq!(lines[2], "2,0.6,0.5,anger");
    // E + 2 columns per row.
    for line in &lines {
        assert_eq!(line.split(',').count(), table.emotions.len() + 2);
    }
}

#[test]
fn short_series_leaves_unmatched_rows_missing() {
    let mut map = BTreeMap::new();
    // One emotion lost its last data point.
    map.insert("joy".to_string(), series("joy", &[0.8, 0.5, 0.1]));
    map.insert("anger".to_string(), series("anger", &[0.2, 0.6]));
    let mut warnings = Vec::new();
    let table = aggregate(&map, 3, &mut warnings).unwrap();

    assert_eq!(table.rows[2].scores[0], None);
    assert_eq!(table.rows[2].label_max.as_deref(), Some("joy"));
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("anger"));
}
