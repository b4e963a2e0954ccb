use super::exit_codes;
use super::evaluate::load_predictions;
use super::{build_evaluator, resolve_config};
use crate::cli::args::{GlobalArgs, RecordsArgs};
use sqleval_core::dataset::Split;
use sqleval_core::engine::runner::{OutcomeSource, SideOutcomes};

fn report(label: &str, side: &SideOutcomes) {
    let failed = side.outcomes.iter().filter(|o| o.is_failure()).count();
    let how = match side.source {
        OutcomeSource::Cache => "reused",
        OutcomeSource::Executed => "executed",
    };
    eprintln!(
        "{label}: {} outcomes {how} ({failed} failed) -> {}",
        side.outcomes.len(),
        side.path.display()
    );
}

pub async fn run(g: &GlobalArgs, args: RecordsArgs) -> anyhow::Result<i32> {
    let cfg = resolve_config(g)?;
    let split = Split::load(&cfg.paths.data_dir, &args.split)?;
    let gold = split.gold_sql()?;
    let pred = match args.exp.experiment() {
        Some(exp) => {
            let pred = load_predictions(&cfg, &exp, &args.split, &split.nl).await?;
            Some((exp, pred))
        }
        None => None,
    };
    let evaluator = build_evaluator(&cfg)?;

    let gold_side = evaluator
        .gold_outcomes(&cfg.paths.records_dir, &args.split, gold, args.refresh)
        .await?;
    report("gold", &gold_side);

    if let Some((exp, pred)) = pred {
        let pred_side = evaluator
            .pred_outcomes(&cfg.paths.records_dir, &exp, &args.split, &pred)
            .await?;
        report(&exp.artifact_stem(&args.split), &pred_side);
    }

    Ok(exit_codes::OK)
}
