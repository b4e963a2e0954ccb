pub mod compare;
pub mod config;
pub mod dataset;
pub mod engine;
pub mod errors;
pub mod executor;
pub mod fingerprint;
pub mod metrics_api;
pub mod model;
pub mod predictions;
pub mod report;
pub mod storage;
