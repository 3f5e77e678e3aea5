use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use classify_rest::artifact::FsStore;
use classify_rest::cli::{Cli, Commands, RunArgs, SetupArgs};
use classify_rest::config::{check_proj_sess, Config};
use classify_rest::db::Db;
use classify_rest::engine::afni::AfniEngine;
use classify_rest::session::SessionKey;
use classify_rest::sync::RsyncSync;
use classify_rest::setup;
use classify_rest::workflow::{run_batch, Env};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => handle_run(args),
        Commands::Setup(args) => handle_setup(args),
    }
}

fn handle_run(args: RunArgs) -> Result<()> {
    let proj = args.proj.as_str();
    check_proj_sess(proj, &args.sess)?;
    if args.subj.is_empty() {
        bail!("at least one --subj is required");
    }
    if args.sess.is_empty() {
        bail!("at least one --sess is required");
    }

    let mut cfg = Config::from_env(proj, args.work_dir.clone())?;
    cfg.max_jobs = args.max_jobs;
    cfg.unit_timeout = Duration::from_secs(args.unit_timeout);
    cfg.bootstrap_dirs()?;

    let db = Db::open(&cfg.db_path)?;
    let env = Env {
        engine: Arc::new(AfniEngine::new(cfg.afni_image.clone())),
        sync: Arc::new(RsyncSync::new(cfg.rsa_key.clone(), cfg.user.clone())),
        store: Arc::new(FsStore),
        db,
        cfg,
    };

    // Classifier artifacts are shared across all sessions of the run;
    // fetch them once up front (skip-if-exists).
    let template = session_key(&args, &args.subj[0], &args.sess[0]);
    setup::run_setup(env.sync.as_ref(), &env.cfg.work_deriv, &template)?;

    let mut keys = Vec::new();
    for subj in &args.subj {
        for sess in &args.sess {
            keys.push(session_key(&args, subj, sess));
        }
    }
    let failed = run_batch(&env, keys);
    if failed > 0 {
        tracing::warn!(failed, "some sessions did not complete");
    }
    Ok(())
}

fn handle_setup(args: SetupArgs) -> Result<()> {
    let proj = args.proj.as_str();
    let cfg = Config::from_env(proj, args.work_dir.clone())?;
    cfg.bootstrap_dirs()?;
    let sync = RsyncSync::new(cfg.rsa_key.clone(), cfg.user.clone());
    let key = SessionKey {
        subj: String::new(),
        sess: String::new(),
        proj: proj.to_string(),
        mask_name: args.mask_name,
        model_name: args.model_name.as_str().to_string(),
        task_name: args.task_name.as_str().to_string(),
        con_name: args.contrast_name.as_str().to_string(),
        mask_sig: false,
    };
    setup::run_setup(&sync, &cfg.work_deriv, &key)?;
    println!("setup complete: {}", cfg.work_deriv.display());
    Ok(())
}

fn session_key(args: &RunArgs, subj: &str, sess: &str) -> SessionKey {
    SessionKey {
        subj: subj.to_string(),
        sess: sess.to_string(),
        proj: args.proj.as_str().to_string(),
        mask_name: args.mask_name.clone(),
        model_name: args.model_name.as_str().to_string(),
        task_name: args.task_name.as_str().to_string(),
        con_name: args.contrast_name.as_str().to_string(),
        mask_sig: args.mask_sig,
    }
}
