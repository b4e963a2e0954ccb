use super::args::*;
use sqleval_core::config::{load_config, EvalConfig, DEFAULT_CONFIG_FILE};
use sqleval_core::engine::runner::BatchEvaluator;
use sqleval_core::executor::Database;
use std::path::PathBuf;
use std::sync::Arc;

pub mod evaluate;
pub mod mismatches;
pub mod records;
pub mod stats;

pub mod exit_codes {
    pub const OK: i32 = 0;
    pub const TEST_FAILED: i32 = 1;
    pub const CONFIG_ERROR: i32 = 2;
}

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    let global = cli.global;
    match cli.cmd {
        Command::Records(args) => records::run(&global, args).await,
        Command::Evaluate(args) => evaluate::run(&global, args).await,
        Command::Mismatches(args) => mismatches::run(&global, args).await,
        Command::Stats(args) => stats::run(&global, args),
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(exit_codes::OK)
        }
    }
}

/// Config file, then environment, then flags.
pub(crate) fn resolve_config(g: &GlobalArgs) -> anyhow::Result<EvalConfig> {
    let (path, explicit) = match &g.config {
        Some(p) => (p.clone(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };
    let mut cfg = load_config(&path, explicit, g.strict_config)?;
    cfg.apply_env();

    let p = &mut cfg.paths;
    for (flag, slot) in [
        (&g.db, &mut p.database),
        (&g.data_dir, &mut p.data_dir),
        (&g.results_dir, &mut p.results_dir),
        (&g.records_dir, &mut p.records_dir),
        (&g.reports_dir, &mut p.reports_dir),
    ] {
        if let Some(v) = flag {
            *slot = v.clone();
        }
    }
    if let Some(n) = g.parallel {
        cfg.settings.parallel = Some(n);
    }
    if let Some(t) = g.timeout_secs {
        cfg.settings.timeout_seconds = Some(t);
    }

    tracing::debug!(event = "config_resolved", config = ?cfg);
    Ok(cfg)
}

/// Opens the database once up front so a bad path fails before any work.
pub(crate) fn build_evaluator(cfg: &EvalConfig) -> anyhow::Result<BatchEvaluator> {
    let db = Database::new(&cfg.paths.database, cfg.settings.timeout());
    drop(db.open()?);
    Ok(BatchEvaluator::new(Arc::new(db), cfg.settings.parallel()))
}
