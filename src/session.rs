use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::aggregate::LabelTable;
use crate::dotprod::EmotionSeries;

/// Tuple uniquely identifying one unit of pipeline work, one working
/// directory, one output CSV and one set of database rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionKey {
    pub subj: String,
    pub sess: String,
    pub proj: String,
    pub mask_name: String,
    pub model_name: String,
    pub task_name: String,
    pub con_name: String,
    pub mask_sig: bool,
}

impl SessionKey {
    /// Subject numeric id for the relational store. Emorep subjects are
    /// `sub-ER####`, archival subjects `sub-####`.
    pub fn subj_id(&self) -> Option<i64> {
        let digits: String = self.subj.chars().filter(|c| c.is_ascii_digit()).collect();
        digits.parse().ok()
    }

    /// Short session token, e.g. `ses-day2` -> `day2`.
    pub fn sess_token(&self) -> &str {
        self.sess.split('-').next_back().unwrap_or(&self.sess)
    }

    pub fn csv_name(&self) -> String {
        format!(
            "df_dot-product_model-{}_task-{}_con-{}_{}_{}.csv",
            self.model_name, self.task_name, self.con_name, self.subj, self.sess
        )
    }

    pub fn weight_map_name(&self, emo_name: &str) -> String {
        format!(
            "weight_model-{}_task-{}_con-{}_emo-{}_map.nii.gz",
            self.model_name, self.task_name, self.con_name, emo_name
        )
    }
}

/// Filesystem layout for one session, rooted in the working
/// derivatives directory. The session directory is exclusively owned
/// by its workflow instance.
#[derive(Debug, Clone)]
pub struct SessionPaths {
    pub work_deriv: PathBuf,
    pub session_dir: PathBuf,
    pub func_dir: PathBuf,
    pub csv_path: PathBuf,
    pub summary_path: PathBuf,
}

impl SessionPaths {
    pub fn new(work_deriv: &Path, key: &SessionKey) -> Self {
        let session_dir = work_deriv.join(&key.subj).join(&key.sess);
        let func_dir = session_dir.join("func");
        let csv_path = func_dir.join(key.csv_name());
        let summary_path = work_deriv
            .join("logs")
            .join(format!("summary_{}_{}.json", key.subj, key.sess));
        Self {
            work_deriv: work_deriv.to_path_buf(),
            session_dir,
            func_dir,
            csv_path,
            summary_path,
        }
    }

    pub fn rest_path(&self) -> PathBuf {
        self.func_dir.join("res4d.nii.gz")
    }

    pub fn zscored_name(idx: u32) -> String {
        format!("tmp_vol-{idx:04}_zscored.nii.gz")
    }

    pub fn series_txt_name(emo_name: &str) -> String {
        format!("tmp_{emo_name}_weight.txt")
    }

    pub fn series_csv_name(emo_name: &str) -> String {
        format!("tmp_{emo_name}_weight.csv")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    Normalizing,
    Scoring,
    Aggregating,
    Persisting,
    Done,
    Failed,
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Normalizing => "normalizing",
            Self::Scoring => "scoring",
            Self::Aggregating => "aggregating",
            Self::Persisting => "persisting",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

/// Mutable state threaded through the session pipeline stages.
#[derive(Debug)]
pub struct SessionCtx {
    pub key: SessionKey,
    pub paths: SessionPaths,
    pub state: SessionState,
    /// Set by the precheck stage when the store already holds this key.
    pub stored_table: Option<LabelTable>,
    pub mask_path: Option<PathBuf>,
    /// emotion name -> weight map path, alphabetical by construction.
    pub weight_maps: BTreeMap<String, PathBuf>,
    pub rest_path: Option<PathBuf>,
    pub num_vols: u32,
    /// volume index -> z-scored volume path.
    pub normalized: BTreeMap<u32, PathBuf>,
    pub series: BTreeMap<String, EmotionSeries>,
    pub table: Option<LabelTable>,
    pub warnings: Vec<String>,
}

impl SessionCtx {
    pub fn new(work_deriv: &Path, key: SessionKey) -> Self {
        let paths = SessionPaths::new(work_deriv, &key);
        Self {
            key,
            paths,
            state: SessionState::NotStarted,
            stored_table: None,
            mask_path: None,
            weight_maps: BTreeMap::new(),
            rest_path: None,
            num_vols: 0,
            normalized: BTreeMap::new(),
            series: BTreeMap::new(),
            table: None,
            warnings: Vec::new(),
        }
    }

    pub fn warn(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        tracing::warn!(subj = %self.key.subj, sess = %self.key.sess, "{msg}");
        self.warnings.push(msg);
    }
}
