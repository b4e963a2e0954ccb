use crate::model::{ComparisonMode, EvalRecord};
use serde::{Deserialize, Serialize};

/// A per-example score averaged over a split.
pub trait Metric: Send + Sync {
    fn name(&self) -> &'static str;

    /// Score in `[0, 1]`, or `None` when the record lacks what the metric
    /// needs (e.g. no execution outcomes in fallback mode).
    fn score(&self, rec: &EvalRecord) -> Option<f64>;
}

/// Aggregate statistics for one experiment on one split.
///
/// Record-level rates are `None` when outcomes were unavailable and the
/// comparison fell back to SQL strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub total: usize,
    pub mode: ComparisonMode,
    pub sql_em: f64,
    pub record_em: Option<f64>,
    pub record_f1: Option<f64>,
    pub error_rate: Option<f64>,
    /// Predicted queries that failed to execute.
    pub errors: usize,
    /// Gold queries that failed to execute (scored as empty results).
    pub gold_errors: usize,
}
