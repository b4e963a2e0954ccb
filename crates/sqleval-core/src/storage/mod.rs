pub mod outcome_cache;

pub use outcome_cache::{gold_cache_path, pred_cache_path, OutcomeCache, Persisted};
