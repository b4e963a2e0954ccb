use super::exit_codes;
use super::{build_evaluator, resolve_config};
use crate::cli::args::{EvaluateArgs, GlobalArgs};
use anyhow::Context;
use sqleval_core::config::EvalConfig;
use sqleval_core::dataset::Split;
use sqleval_core::engine::assemble_records;
use sqleval_core::errors::EvalError;
use sqleval_core::metrics_api::MetricsSummary;
use sqleval_core::model::Experiment;
use sqleval_core::predictions::{collect_predictions, discover_experiments, PredictionFile};
use sqleval_core::report::diagnostics::{diagnose, write_reports, ReportHeader};
use sqleval_core::report::{console, json};

pub async fn run(g: &GlobalArgs, args: EvaluateArgs) -> anyhow::Result<i32> {
    let cfg = resolve_config(g)?;
    let split = Split::load(&cfg.paths.data_dir, &args.split)?;
    let gold = split.gold_sql()?;

    let experiments = match args.exp.experiment() {
        Some(e) => vec![e],
        None => experiments_for(&cfg, &args.split)?,
    };
    tracing::info!(
        event = "evaluate_start",
        split = %args.split,
        examples = split.len(),
        experiments = experiments.len()
    );

    // Every prediction file is loaded and aligned before anything executes.
    let mut loaded = Vec::with_capacity(experiments.len());
    for exp in experiments {
        let pred = load_predictions(&cfg, &exp, &args.split, &split.nl).await?;
        loaded.push((exp, pred));
    }

    let evaluator = build_evaluator(&cfg)?;
    let gold_side = evaluator
        .gold_outcomes(&cfg.paths.records_dir, &args.split, gold, args.refresh_gold)
        .await?;

    let mut rows: Vec<(Experiment, MetricsSummary)> = Vec::new();
    for (exp, pred) in loaded {
        let pred_side = evaluator
            .pred_outcomes(&cfg.paths.records_dir, &exp, &args.split, &pred)
            .await?;

        let records = assemble_records(
            &split.nl,
            gold,
            &pred,
            Some(gold_side.outcomes.clone()),
            Some(pred_side.outcomes),
        )?;
        let summary = sqleval_metrics::summarize(&records);
        console::print_metrics(&exp, &args.split, &summary);

        let header = ReportHeader {
            experiment: exp.clone(),
            split: args.split.clone(),
        };
        let diag = diagnose(&records);
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

        rows.push((exp, summary));
    }

    if rows.len() > 1 {
        console::print_summary_table(&args.split, &rows);
    }
    let summary_path = json::write_summary(
        &cfg.paths.reports_dir,
        &json::SplitSummary::new(&args.split, &rows),
    )?;
    eprintln!("wrote file: {}", summary_path.display());

    Ok(decide_exit_code(&rows, args.fail_under))
}

pub(crate) async fn load_predictions(
    cfg: &EvalConfig,
    exp: &Experiment,
    split: &str,
    nl: &[String],
) -> anyhow::Result<Vec<String>> {
    let path = PredictionFile::locate(&cfg.paths, exp, split)?;
    let file = PredictionFile::load(&path)?;
    collect_predictions(&file, nl)
        .await
        .with_context(|| format!("experiment {}", exp.name))
}

/// Every experiment with predictions for `split`, primary directory first.
fn experiments_for(cfg: &EvalConfig, split: &str) -> anyhow::Result<Vec<Experiment>> {
    let found = discover_experiments(&cfg.paths.results_dir, split)?;
    if !found.is_empty() {
        return Ok(found);
    }
    let found = discover_experiments(&cfg.paths.fallback_results_dir, split)?;
    if found.is_empty() {
        return Err(EvalError::missing(
            format!("predictions for split '{split}'"),
            &[&cfg.paths.results_dir, &cfg.paths.fallback_results_dir],
        )
        .into());
    }
    Ok(found)
}

fn decide_exit_code(rows: &[(Experiment, MetricsSummary)], fail_under: Option<f64>) -> i32 {
    let Some(min) = fail_under else {
        return exit_codes::OK;
    };
    let below: Vec<_> = rows
        .iter()
        .filter(|(_, m)| m.record_em.unwrap_or(m.sql_em) < min)
        .map(|(e, _)| e.name.as_str())
        .collect();
    if below.is_empty() {
        exit_codes::OK
    } else {
        eprintln!("record EM below {:.4}: {}", min, below.join(", "));
        exit_codes::TEST_FAILED
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqleval_core::model::{ComparisonMode, ModelType};

    fn summary(record_em: f64) -> MetricsSummary {
        MetricsSummary {
            total: 1,
            mode: ComparisonMode::Records,
            sql_em: 0.0,
            record_em: Some(record_em),
            record_f1: Some(record_em),
            error_rate: Some(0.0),
            errors: 0,
            gold_errors: 0,
        }
    }

    #[test]
    fn threshold_gate() {
        let rows = vec![
            (Experiment::new("a", ModelType::Ft), summary(0.9)),
            (Experiment::new("b", ModelType::Ft), summary(0.4)),
        ];
        assert_eq!(decide_exit_code(&rows, None), exit_codes::OK);
        assert_eq!(decide_exit_code(&rows, Some(0.3)), exit_codes::OK);
        assert_eq!(decide_exit_code(&rows, Some(0.5)), exit_codes::TEST_FAILED);
    }
}
