use crate::config::Paths;
use crate::errors::{ensure_aligned, EvalError};
use crate::model::{Experiment, ModelType};
use anyhow::Context;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Source of predicted SQL, one string per input example, in input order.
///
/// Model inference (tokenization, decoding, beam search) happens behind this
/// seam; the evaluator only consumes the decoded strings.
#[async_trait]
pub trait SqlPredictor: Send + Sync {
    fn name(&self) -> &str;

    async fn predict(&self, nl: &[String]) -> anyhow::Result<Vec<String>>;
}

/// Predictions already decoded to a plain-text file, one query per line.
#[derive(Debug, Clone)]
pub struct PredictionFile {
    pub path: PathBuf,
    pub queries: Vec<String>,
}

impl PredictionFile {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let queries = crate::dataset::load_lines(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            queries,
        })
    }

    /// Primary location first, then the fallback directory.
    pub fn candidates(paths: &Paths, exp: &Experiment, split: &str) -> Vec<PathBuf> {
        let file = format!("{}.sql", exp.artifact_stem(split));
        vec![
            paths.results_dir.join(&file),
            paths.fallback_results_dir.join(&file),
        ]
    }

    pub fn locate(paths: &Paths, exp: &Experiment, split: &str) -> Result<PathBuf, EvalError> {
        let tried = Self::candidates(paths, exp, split);
        match tried.iter().find(|p| p.exists()) {
            Some(p) => Ok(p.clone()),
            None => Err(EvalError::missing(
                format!("predictions for {}/{}", exp.model_type, exp.name),
                &tried,
            )),
        }
    }
}

#[async_trait]
impl SqlPredictor for PredictionFile {
    fn name(&self) -> &str {
        "prediction_file"
    }

    async fn predict(&self, nl: &[String]) -> anyhow::Result<Vec<String>> {
        ensure_aligned("nl", nl.len(), "predicted sql", self.queries.len())
            .with_context(|| format!("predictions in {}", self.path.display()))?;
        Ok(self.queries.clone())
    }
}

/// Runs a predictor and checks it produced exactly one query per input.
pub async fn collect_predictions(
    predictor: &dyn SqlPredictor,
    nl: &[String],
) -> anyhow::Result<Vec<String>> {
    let out = predictor.predict(nl).await?;
    ensure_aligned("nl", nl.len(), "predicted sql", out.len())?;
    Ok(out)
}

/// Experiments with a prediction file for `split` in `results_dir`, sorted.
pub fn discover_experiments(results_dir: &Path, split: &str) -> anyhow::Result<Vec<Experiment>> {
    if !results_dir.exists() {
        return Ok(vec![]);
    }
    let suffix = format!("_{split}.sql");
    let mut found = Vec::new();
    for entry in std::fs::read_dir(results_dir)
        .with_context(|| format!("failed to list {}", results_dir.display()))?
    {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if let Some(exp) = parse_prediction_name(&name, &suffix) {
            found.push(exp);
        }
    }
    found.sort_by(|a, b| {
        a.name
            .cmp(&b.name)
            .then_with(|| a.model_type.as_str().cmp(b.model_type.as_str()))
    });
    Ok(found)
}

fn parse_prediction_name(file: &str, suffix: &str) -> Option<Experiment> {
    let rest = file.strip_prefix("t5_")?.strip_suffix(suffix)?;
    let (kind, name) = rest.split_once('_')?;
    let model_type = ModelType::parse(kind)?;
    if name.is_empty() {
        return None;
    }
    Some(Experiment::new(name, model_type))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_prediction_names() {
        let exp = parse_prediction_name("t5_ft_lr_1e-3_dev.sql", "_dev.sql").unwrap();
        assert_eq!(exp, Experiment::new("lr_1e-3", ModelType::Ft));
        assert!(parse_prediction_name("t5_xx_a_dev.sql", "_dev.sql").is_none());
        assert!(parse_prediction_name("t5_ft_a_test.sql", "_dev.sql").is_none());
        assert!(parse_prediction_name("t5_ft__dev.sql", "_dev.sql").is_none());
    }

    #[test]
    fn discovers_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let files = [
            "t5_scr_zeta_dev.sql",
            "t5_ft_alpha_dev.sql",
            "notes.txt",
            "t5_ft_alpha_test.sql",
        ];
        for f in files {
            std::fs::write(dir.path().join(f), "").unwrap();
        }
        let exps = discover_experiments(dir.path(), "dev").unwrap();
        assert_eq!(
            exps,
            vec![
                Experiment::new("alpha", ModelType::Ft),
                Experiment::new("zeta", ModelType::Scr)
            ]
        );
        assert!(discover_experiments(&dir.path().join("missing"), "dev")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn locate_uses_fallback_dir() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths {
            results_dir: dir.path().join("results"),
            fallback_results_dir: dir.path().join("model_output"),
            ..Paths::default()
        };
        let exp = Experiment::new("base", ModelType::Scr);

        let err = PredictionFile::locate(&paths, &exp, "dev").unwrap_err();
        assert!(err.to_string().contains("t5_scr_base_dev.sql"));

        std::fs::create_dir_all(&paths.fallback_results_dir).unwrap();
        let alt = paths.fallback_results_dir.join("t5_scr_base_dev.sql");
        std::fs::write(&alt, "SELECT 1\n").unwrap();
        assert_eq!(PredictionFile::locate(&paths, &exp, "dev").unwrap(), alt);
    }

    #[tokio::test]
    async fn prediction_count_must_match_inputs() {
        let file = PredictionFile {
            path: "preds.sql".into(),
            queries: vec!["SELECT 1".into()],
        };
        let nl = vec!["a".to_string(), "b".to_string()];
        assert!(collect_predictions(&file, &nl).await.is_err());
        assert_eq!(collect_predictions(&file, &nl[..1]).await.unwrap().len(), 1);
    }
}
