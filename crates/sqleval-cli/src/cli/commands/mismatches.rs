use super::exit_codes;
use super::resolve_config;
use crate::cli::args::{GlobalArgs, MismatchesArgs};
use sqleval_core::dataset::Split;
use sqleval_core::engine::assemble_records;
use sqleval_core::engine::runner::{load_side, StalePolicy};
use sqleval_core::model::Experiment;
use sqleval_core::predictions::PredictionFile;
use sqleval_core::report::diagnostics::{diagnose, render_console, write_reports, ReportHeader};
use sqleval_core::storage::{gold_cache_path, pred_cache_path};

/// Reads persisted outcomes only; nothing is executed. Without both caches
/// the comparison falls back to SQL strings.
pub async fn run(g: &GlobalArgs, args: MismatchesArgs) -> anyhow::Result<i32> {
    let cfg = resolve_config(g)?;
    let exp = Experiment::new(args.experiment.clone(), args.model_type.into());
    let split = Split::load(&cfg.paths.data_dir, &args.split)?;
    let gold_sql = split.gold_sql()?;

    let path = PredictionFile::locate(&cfg.paths, &exp, &args.split)?;
    let pred_sql = PredictionFile::load(&path)?.queries;

    let records_dir = &cfg.paths.records_dir;
    let gold = load_side(
        &gold_cache_path(records_dir, &args.split),
        gold_sql,
        StalePolicy::Warn,
    )?;
    // Outcomes of older predictions must not be shown next to the current SQL.
    let pred = load_side(
        &pred_cache_path(records_dir, &exp, &args.split),
        &pred_sql,
        StalePolicy::Discard,
    )?;
    if gold.is_none() || pred.is_none() {
        tracing::warn!(
            event = "outcomes_unavailable",
            experiment = %exp.name,
            gold = gold.is_some(),
            pred = pred.is_some(),
            "falling back to SQL string comparison; run `sqleval records` first"
        );
    }

    let records = assemble_records(&split.nl, gold_sql, &pred_sql, gold, pred)?;
    let diag = diagnose(&records);
    print!("{}", render_console(&diag, cfg.settings.preview_rows_console()));

    if !args.no_write {
        let header = ReportHeader {
            experiment: exp,
            split: args.split.clone(),
        };
        let written = write_reports(
            &cfg.paths.reports_dir,
            &header,
            &diag,
            cfg.settings.preview_rows_file(),
        )?;
        eprintln!("wrote file: {}", written.mismatches.display());
        if let Some(p) = written.errors {
            eprintln!("wrote file: {}", p.display());
        }
    }

    Ok(exit_codes::OK)
}
