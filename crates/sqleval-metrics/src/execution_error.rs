use sqleval_core::metrics_api::Metric;
use sqleval_core::model::EvalRecord;

/// 1.0 when the predicted query failed to execute.
pub struct ExecutionErrorMetric;

impl Metric for ExecutionErrorMetric {
    fn name(&self) -> &'static str {
        "error_rate"
    }

    fn score(&self, rec: &EvalRecord) -> Option<f64> {
        rec.pred
            .as_ref()
            .map(|p| if p.is_failure() { 1.0 } else { 0.0 })
    }
}
