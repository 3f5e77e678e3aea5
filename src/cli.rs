use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "classify-rest",
    version,
    about = "Label resting-state volumes with emotion classifier weight maps"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the labeling workflow for subjects and sessions
    Run(RunArgs),
    /// Fetch the group mask and classifier weight maps
    Setup(SetupArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[arg(long, value_enum)]
    pub proj: ProjectArg,

    #[arg(long, num_args = 1.., help = "Subject IDs (e.g. sub-ER0016)")]
    pub subj: Vec<String>,

    #[arg(long, num_args = 1.., help = "Session IDs (e.g. ses-day2)")]
    pub sess: Vec<String>,

    #[arg(long, default_value = "tpl_GM_mask.nii.gz", help = "Template mask name")]
    pub mask_name: String,

    #[arg(long, value_enum, default_value_t = ModelArg::Sep)]
    pub model_name: ModelArg,

    #[arg(long, value_enum, default_value_t = TaskArg::Movies)]
    pub task_name: TaskArg,

    #[arg(long, value_enum, default_value_t = ContrastArg::Stim)]
    pub contrast_name: ContrastArg,

    #[arg(long, default_value_t = false, help = "Use significant-voxel masking")]
    pub mask_sig: bool,

    #[arg(long, help = "Override working derivatives directory")]
    pub work_dir: Option<PathBuf>,

    #[arg(long, default_value_t = 10, help = "Max concurrent normalization units")]
    pub max_jobs: usize,

    #[arg(
        long,
        default_value_t = 3600,
        help = "Wall-clock budget per scheduled unit (seconds)"
    )]
    pub unit_timeout: u64,
}

#[derive(Debug, Args)]
pub struct SetupArgs {
    #[arg(long, value_enum)]
    pub proj: ProjectArg,

    #[arg(long, default_value = "tpl_GM_mask.nii.gz")]
    pub mask_name: String,

    #[arg(long, value_enum, default_value_t = ModelArg::Sep)]
    pub model_name: ModelArg,

    #[arg(long, value_enum, default_value_t = TaskArg::Movies)]
    pub task_name: TaskArg,

    #[arg(long, value_enum, default_value_t = ContrastArg::Stim)]
    pub contrast_name: ContrastArg,

    #[arg(long, help = "Override working derivatives directory")]
    pub work_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProjectArg {
    Emorep,
    Archival,
}

impl ProjectArg {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Emorep => "emorep",
            Self::Archival => "archival",
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModelArg {
    Sep,
    Tog,
}

impl ModelArg {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sep => "sep",
            Self::Tog => "tog",
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum TaskArg {
    Movies,
    Scenarios,
    Match,
}

impl TaskArg {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Movies => "movies",
            Self::Scenarios => "scenarios",
            Self::Match => "match",
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ContrastArg {
    Stim,
    Replay,
    Tog,
}

impl ContrastArg {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stim => "stim",
            Self::Replay => "replay",
            Self::Tog => "tog",
        }
    }
}
