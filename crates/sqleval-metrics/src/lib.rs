use std::sync::Arc;

use sqleval_core::metrics_api::Metric;

mod execution_error;
mod record_exact_match;
mod record_f1;
mod sql_exact_match;

pub mod aggregate;

pub use aggregate::summarize;
pub use execution_error::ExecutionErrorMetric;
pub use record_exact_match::RecordExactMatchMetric;
pub use record_f1::RecordF1Metric;
pub use sql_exact_match::SqlExactMatchMetric;

pub fn default_metrics() -> Vec<Arc<dyn Metric>> {
    vec![
        Arc::new(SqlExactMatchMetric),
        Arc::new(RecordExactMatchMetric),
        Arc::new(RecordF1Metric),
        Arc::new(ExecutionErrorMetric),
    ]
}
