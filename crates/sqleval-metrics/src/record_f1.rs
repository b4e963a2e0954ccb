use sqleval_core::compare::{row_set, set_f1};
use sqleval_core::metrics_api::Metric;
use sqleval_core::model::EvalRecord;

pub struct RecordF1Metric;

impl Metric for RecordF1Metric {
    fn name(&self) -> &'static str {
        "record_f1"
    }

    fn score(&self, rec: &EvalRecord) -> Option<f64> {
        let (gold, pred) = (rec.gold.as_ref()?, rec.pred.as_ref()?);
        if pred.is_failure() {
            return Some(0.0);
        }
        let score = set_f1(&row_set(gold.records()), &row_set(pred.records()));
        Some(score.f1)
    }
}
