use crate::metrics_api::MetricsSummary;
use crate::model::Experiment;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentSummary {
    #[serde(flatten)]
    pub experiment: Experiment,
    pub metrics: MetricsSummary,
}

/// Machine-readable metrics for every experiment evaluated on one split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitSummary {
    pub split: String,
    pub generated_at: String,
    pub experiments: Vec<ExperimentSummary>,
}

impl SplitSummary {
    pub fn new(split: &str, rows: &[(Experiment, MetricsSummary)]) -> Self {
        Self {
            split: split.to_string(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            experiments: rows
                .iter()
                .map(|(e, m)| ExperimentSummary {
                    experiment: e.clone(),
                    metrics: m.clone(),
                })
                .collect(),
        }
    }
}

pub fn summary_path(dir: &Path, split: &str) -> PathBuf {
    dir.join(format!("summary_{split}.json"))
}

pub fn write_summary(dir: &Path, summary: &SplitSummary) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = summary_path(dir, &summary.split);
    let json = serde_json::to_string_pretty(summary)?;
    std::fs::write(&path, json)
        .with_context(|| format!("failed to write summary {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ComparisonMode, ModelType};

    #[test]
    fn writes_named_summary() {
        let dir = tempfile::tempdir().unwrap();
        let m = MetricsSummary {
            total: 2,
            mode: ComparisonMode::Records,
            sql_em: 0.5,
            record_em: Some(1.0),
            record_f1: Some(1.0),
            error_rate: Some(0.0),
            errors: 0,
            gold_errors: 0,
        };
        let rows = vec![(Experiment::new("base", ModelType::Scr), m.clone())];
        let path = write_summary(dir.path(), &SplitSummary::new("dev", &rows)).unwrap();
        assert!(path.ends_with("summary_dev.json"));

        let raw = std::fs::read_to_string(&path).unwrap();
        let v: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(v["experiments"][0]["name"], "base");
        assert_eq!(v["experiments"][0]["model_type"], "scr");

        let back: SplitSummary = serde_json::from_str(&raw).unwrap();
        assert_eq!(back.experiments[0].metrics, m);
    }
}
