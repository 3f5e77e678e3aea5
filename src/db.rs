use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params_from_iter, Connection};
use tracing::info;

use crate::aggregate::{LabelRow, LabelTable};
use crate::session::SessionKey;
use crate::EMOTIONS;

/// Results store. One row per volume in `tbl_dotprod_<project>`,
/// foreign-keyed to the session identifiers, with `INSERT OR IGNORE`
/// so concurrent writers targeting the same session key race benignly.
pub struct Db {
    conn: Connection,
}

impl Db {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database {}", path.display()))?;
        let db = Self { conn };
        db.ensure_schema()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let db = Self {
            conn: Connection::open_in_memory()?,
        };
        db.ensure_schema()?;
        Ok(db)
    }

    fn ensure_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "create table if not exists ref_emo (
                emo_id integer primary key,
                emo_name text unique not null
            );
            create table if not exists ref_sess (
                sess_id integer primary key,
                sess_name text unique not null
            );
            create table if not exists ref_fsl_task (
                fsl_task_id integer primary key,
                task_name text unique not null
            );
            create table if not exists ref_fsl_model (
                fsl_model_id integer primary key,
                model_name text unique not null
            );
            create table if not exists ref_fsl_contrast (
                fsl_con_id integer primary key,
                con_name text unique not null
            );
            create table if not exists ref_mask (
                mask_id integer primary key,
                mask_name text unique not null
            );",
        )?;
        for (i, emo) in EMOTIONS.iter().enumerate() {
            self.conn.execute(
                "insert or ignore into ref_emo (emo_id, emo_name) values (?1, ?2)",
                rusqlite::params![i as i64 + 1, emo],
            )?;
        }
        seed_ref(&self.conn, "ref_sess", "sess_id", "sess_name", &["day2", "day3", "bas1"])?;
        seed_ref(
            &self.conn,
            "ref_fsl_task",
            "fsl_task_id",
            "task_name",
            &["movies", "scenarios", "match"],
        )?;
        seed_ref(
            &self.conn,
            "ref_fsl_model",
            "fsl_model_id",
            "model_name",
            &["sep", "tog"],
        )?;
        seed_ref(
            &self.conn,
            "ref_fsl_contrast",
            "fsl_con_id",
            "con_name",
            &["stim", "replay", "tog"],
        )?;
        seed_ref(&self.conn, "ref_mask", "mask_id", "mask_name", &["GM", "Sig Voxel"])?;
        Ok(())
    }

    fn ensure_dotprod_table(&self, proj: &str) -> Result<String> {
        let table = dotprod_table_name(proj)?;
        let emo_cols: Vec<String> = EMOTIONS.iter().map(|e| format!("emo_{e} real")).collect();
        self.conn.execute_batch(&format!(
            "create table if not exists {table} (
                subj_id integer not null,
                sess_id integer not null,
                fsl_task_id integer not null,
                fsl_model_id integer not null,
                fsl_con_id integer not null,
                mask_id integer not null,
                volume integer not null,
                {},
                label_max integer references ref_emo(emo_id),
                primary key (subj_id, sess_id, fsl_task_id, fsl_model_id,
                             fsl_con_id, mask_id, volume)
            );",
            emo_cols.join(",\n                ")
        ))?;
        Ok(table)
    }

    fn key_ids(&self, key: &SessionKey) -> Result<KeyIds> {
        let subj_id = key
            .subj_id()
            .with_context(|| format!("no numeric id in subject '{}'", key.subj))?;
        Ok(KeyIds {
            subj_id,
            sess_id: self.ref_id(
                "ref_sess",
                "sess_id",
                "sess_name",
                &key.sess_token().to_lowercase(),
            )?,
            fsl_task_id: self.ref_id("ref_fsl_task", "fsl_task_id", "task_name", &key.task_name)?,
            fsl_model_id: self.ref_id(
                "ref_fsl_model",
                "fsl_model_id",
                "model_name",
                &key.model_name,
            )?,
            fsl_con_id: self.ref_id("ref_fsl_contrast", "fsl_con_id", "con_name", &key.con_name)?,
            mask_id: self.ref_id(
                "ref_mask",
                "mask_id",
                "mask_name",
                if key.mask_sig { "Sig Voxel" } else { "GM" },
            )?,
        })
    }

    fn ref_id(&self, table: &str, id_col: &str, name_col: &str, name: &str) -> Result<i64> {
        self.conn
            .query_row(
                &format!("select {id_col} from {table} where {name_col} = ?1"),
                [name],
                |row| row.get(0),
            )
            .with_context(|| format!("no {table} entry for '{name}'"))
    }

    fn emo_id(&self, emo_name: &str) -> Result<i64> {
        self.ref_id("ref_emo", "emo_id", "emo_name", emo_name)
    }

    fn emo_name(&self, emo_id: i64) -> Result<String> {
        self.conn
            .query_row(
                "select emo_name from ref_emo where emo_id = ?1",
                [emo_id],
                |row| row.get(0),
            )
            .with_context(|| format!("no ref_emo entry for id {emo_id}"))
    }

    /// Idempotence check: does the store already hold rows for this
    /// session key?
    pub fn has_session(&self, key: &SessionKey) -> Result<bool> {
        let table = self.ensure_dotprod_table(&key.proj)?;
        let ids = self.key_ids(key)?;
        let count: i64 = self.conn.query_row(
            &format!(
                "select count(*) from {table}
                 where subj_id=?1 and sess_id=?2 and fsl_task_id=?3
                   and fsl_model_id=?4 and fsl_con_id=?5 and mask_id=?6"
            ),
            rusqlite::params![
                ids.subj_id,
                ids.sess_id,
                ids.fsl_task_id,
                ids.fsl_model_id,
                ids.fsl_con_id,
                ids.mask_id
            ],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Insert one row per volume with INSERT OR IGNORE. Returns how
    /// many rows were newly inserted.
    pub fn insert_table(&self, key: &SessionKey, table: &LabelTable) -> Result<usize> {
        let tbl = self.ensure_dotprod_table(&key.proj)?;
        let ids = self.key_ids(key)?;

        let mut cols = vec![
            "subj_id".to_string(),
            "sess_id".to_string(),
            "fsl_task_id".to_string(),
            "fsl_model_id".to_string(),
            "fsl_con_id".to_string(),
            "mask_id".to_string(),
            "volume".to_string(),
        ];
        for emo in &table.emotions {
            cols.push(format!("emo_{emo}"));
        }
        cols.push("label_max".to_string());
        let placeholders: Vec<String> = (1..=cols.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "insert or ignore into {tbl} ({}) values ({})",
            cols.join(", "),
            placeholders.join(", ")
        );

        let mut inserted = 0;
        let mut stmt = self.conn.prepare(&sql)?;
        for row in &table.rows {
            let label_id = match &row.label_max {
                Some(name) => Some(self.emo_id(name)?),
                None => None,
            };
            let mut values: Vec<rusqlite::types::Value> = vec![
                ids.subj_id.into(),
                ids.sess_id.into(),
                ids.fsl_task_id.into(),
                ids.fsl_model_id.into(),
                ids.fsl_con_id.into(),
                ids.mask_id.into(),
                (row.volume as i64).into(),
            ];
            for score in &row.scores {
                values.push(match score {
                    Some(s) => (*s).into(),
                    None => rusqlite::types::Value::Null,
                });
            }
            values.push(match label_id {
                Some(id) => id.into(),
                None => rusqlite::types::Value::Null,
            });
            inserted += stmt.execute(params_from_iter(values))?;
        }
        info!(
            subj = %key.subj,
            sess = %key.sess,
            rows = table.rows.len(),
            inserted,
            "dot-product rows stored"
        );
        Ok(inserted)
    }

    /// Reconstruct the label table for a stored session key. Emotion
    /// columns that are entirely null (never written for this session)
    /// are dropped so the result matches what was inserted.
    pub fn fetch_table(&self, key: &SessionKey) -> Result<Option<LabelTable>> {
        let tbl = self.ensure_dotprod_table(&key.proj)?;
        let ids = self.key_ids(key)?;
        let emo_cols: Vec<String> = EMOTIONS.iter().map(|e| format!("emo_{e}")).collect();
        let sql = format!(
            "select volume, {}, label_max from {tbl}
             where subj_id=?1 and sess_id=?2 and fsl_task_id=?3
               and fsl_model_id=?4 and fsl_con_id=?5 and mask_id=?6
             order by volume",
            emo_cols.join(", ")
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(rusqlite::params![
            ids.subj_id,
            ids.sess_id,
            ids.fsl_task_id,
            ids.fsl_model_id,
            ids.fsl_con_id,
            ids.mask_id
        ])?;

        let mut grid: Vec<(u32, Vec<Option<f64>>, Option<i64>)> = Vec::new();
        while let Some(row) = rows.next()? {
            let volume: i64 = row.get(0)?;
            let mut scores = Vec::with_capacity(EMOTIONS.len());
            for i in 0..EMOTIONS.len() {
                scores.push(row.get::<_, Option<f64>>(1 + i)?);
            }
            let label_id: Option<i64> = row.get(1 + EMOTIONS.len())?;
            grid.push((volume as u32, scores, label_id));
        }
        if grid.is_empty() {
            return Ok(None);
        }

        let kept: Vec<usize> = (0..EMOTIONS.len())
            .filter(|&i| grid.iter().any(|(_, scores, _)| scores[i].is_some()))
            .collect();
        let emotions: Vec<String> = kept.iter().map(|&i| EMOTIONS[i].to_string()).collect();

        let mut out_rows = Vec::with_capacity(grid.len());
        for (volume, scores, label_id) in grid {
            let label_max = match label_id {
                Some(id) => Some(self.emo_name(id)?),
                None => None,
            };
            out_rows.push(LabelRow {
                volume,
                scores: kept.iter().map(|&i| scores[i]).collect(),
                label_max,
            });
        }
        Ok(Some(LabelTable {
            emotions,
            rows: out_rows,
        }))
    }
}

struct KeyIds {
    subj_id: i64,
    sess_id: i64,
    fsl_task_id: i64,
    fsl_model_id: i64,
    fsl_con_id: i64,
    mask_id: i64,
}

fn dotprod_table_name(proj: &str) -> Result<String> {
    // Interpolated into SQL; restrict to the known projects.
    match proj {
        "emorep" | "archival" => Ok(format!("tbl_dotprod_{proj}")),
        other => anyhow::bail!("unsupported project '{other}' for results table"),
    }
}

fn seed_ref(
    conn: &Connection,
    table: &str,
    id_col: &str,
    name_col: &str,
    names: &[&str],
) -> Result<()> {
    for (i, name) in names.iter().enumerate() {
        conn.execute(
            &format!("insert or ignore into {table} ({id_col}, {name_col}) values (?1, ?2)"),
            rusqlite::params![i as i64 + 1, name],
        )?;
    }
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

    fn table() -> LabelTable {
        LabelTable {
            emotions: vec!["anger".into(), "joy".into()],
            rows: vec![
                LabelRow {
                    volume: 1,
                    scores: vec![Some(0.2), Some(0.8)],
                    label_max: Some("joy".into()),
                },
                LabelRow {
                    volume: 2,
                    scores: vec![Some(0.9), None],
                    label_max: Some("anger".into()),
                },
            ],
        }
    }

    #[test]
    fn insert_then_fetch_round_trips() {
        let db = Db::open_in_memory().unwrap();
        let k = key();
        assert!(!db.has_session(&k).unwrap());
        let inserted = db.insert_table(&k, &table()).unwrap();
        assert_eq!(inserted, 2);
        assert!(db.has_session(&k).unwrap());
        let fetched = db.fetch_table(&k).unwrap().unwrap();
        assert_eq!(fetched, table());
    }

    #[test]
    fn duplicate_insert_is_ignored() {
        let db = Db::open_in_memory().unwrap();
        let k = key();
        assert_eq!(db.insert_table(&k, &table()).unwrap(), 2);
        assert_eq!(db.insert_table(&k, &table()).unwrap(), 0);
    }

    #[test]
    fn sessions_keyed_independently() {
        let db = Db::open_in_memory().unwrap();
        let k1 = key();
        let mut k2 = key();
        k2.sess = "ses-day3".into();
        db.insert_table(&k1, &table()).unwrap();
        assert!(db.has_session(&k1).unwrap());
        assert!(!db.has_session(&k2).unwrap());
        assert!(db.fetch_table(&k2).unwrap().is_none());
    }

    #[test]
    fn mask_sig_changes_key() {
        let db = Db::open_in_memory().unwrap();
        let k1 = key();
        let mut k2 = key();
        k2.mask_sig = true;
        db.insert_table(&k1, &table()).unwrap();
        assert!(!db.has_session(&k2).unwrap());
    }
}
