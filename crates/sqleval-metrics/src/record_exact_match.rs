use sqleval_core::compare::outcomes_match;
use sqleval_core::metrics_api::Metric;
use sqleval_core::model::EvalRecord;

/// Predicted rows equal gold rows as sets. A predicted query that failed to
/// execute never matches, even against an empty gold result.
pub struct RecordExactMatchMetric;

impl Metric for RecordExactMatchMetric {
    fn name(&self) -> &'static str {
        "record_em"
    }

    fn score(&self, rec: &EvalRecord) -> Option<f64> {
        let (gold, pred) = (rec.gold.as_ref()?, rec.pred.as_ref()?);
        if pred.is_failure() {
            return Some(0.0);
        }
        Some(if outcomes_match(gold, pred) { 1.0 } else { 0.0 })
    }
}
