use crate::default_metrics;
use sqleval_core::metrics_api::{Metric, MetricsSummary};
use sqleval_core::model::EvalRecord;
use sqleval_core::report::diagnostics::comparison_mode;

/// Mean score over all records, `None` if any record can't be scored.
/// An empty split averages to 0.
fn mean(metric: &dyn Metric, records: &[EvalRecord]) -> Option<f64> {
    if records.is_empty() {
        return Some(0.0);
    }
    let mut sum = 0.0;
    for r in records {
        sum += metric.score(r)?;
    }
    Some(sum / records.len() as f64)
}

pub fn summarize(records: &[EvalRecord]) -> MetricsSummary {
    let mode = comparison_mode(records);
    let errors = records.iter().filter(|r| r.pred_failed()).count();
    let gold_errors = records.iter().filter(|r| r.gold_failed()).count();

    if gold_errors > 0 {
        tracing::warn!(
            event = "gold_query_failures",
            count = gold_errors,
            "gold queries failed to execute; scored as empty results"
        );
    }

    let mut summary = MetricsSummary {
        total: records.len(),
        mode,
        sql_em: 0.0,
        record_em: None,
        record_f1: None,
        error_rate: None,
        errors,
        gold_errors,
    };

    for m in default_metrics() {
        let value = mean(m.as_ref(), records);
        match m.name() {
            "sql_em" => summary.sql_em = value.unwrap_or_default(),
            "record_em" => summary.record_em = value,
            "record_f1" => summary.record_f1 = value,
            "error_rate" => summary.error_rate = value,
            other => tracing::debug!(event = "metric_ignored", metric = other),
        }
    }

    tracing::info!(
        event = "metrics_computed",
        total = summary.total,
        sql_em = summary.sql_em,
        errors = summary.errors
    );
    summary
}
