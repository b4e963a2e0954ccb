use sqleval_core::metrics_api::Metric;
use sqleval_core::model::EvalRecord;

/// Predicted SQL text equals gold SQL text, ignoring surrounding whitespace.
pub struct SqlExactMatchMetric;

impl Metric for SqlExactMatchMetric {
    fn name(&self) -> &'static str {
        "sql_em"
    }

    fn score(&self, rec: &EvalRecord) -> Option<f64> {
        Some(if rec.sql_matches() { 1.0 } else { 0.0 })
    }
}
