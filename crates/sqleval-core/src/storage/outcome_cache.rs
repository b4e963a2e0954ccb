use crate::errors::{ensure_aligned, EvalError};
use crate::model::{Experiment, ExecOutcome};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const CACHE_SCHEMA_VERSION: u32 = 1;

/// Execution outcomes for one side of one split, persisted as JSON.
///
/// Invalidation is manual: a present file is trusted. The recorded digest of
/// the executed SQL only drives a staleness warning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeCache {
    pub schema_version: u32,
    pub split: String,
    /// `gold` or the experiment artifact stem.
    pub source: String,
    pub sql_sha256: String,
    pub created_at: String,
    pub outcomes: Vec<ExecOutcome>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persisted {
    Written,
    /// Another writer got there first; the existing file was left untouched.
    AlreadyExists,
}

pub fn gold_cache_path(records_dir: &Path, split: &str) -> PathBuf {
    records_dir.join(format!("ground_truth_{split}.json"))
}

pub fn pred_cache_path(records_dir: &Path, exp: &Experiment, split: &str) -> PathBuf {
    records_dir.join(format!("{}.json", exp.artifact_stem(split)))
}

impl OutcomeCache {
    pub fn new(
        split: &str,
        source: &str,
        queries: &[String],
        outcomes: Vec<ExecOutcome>,
    ) -> Result<Self, EvalError> {
        ensure_aligned("queries", queries.len(), "outcomes", outcomes.len())?;
        Ok(Self {
            schema_version: CACHE_SCHEMA_VERSION,
            split: split.to_string(),
            source: source.to_string(),
            sql_sha256: crate::fingerprint::queries_digest(queries),
            created_at: chrono::Utc::now().to_rfc3339(),
            outcomes,
        })
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("failed to open outcome cache: {}", path.display()))?;
        let cache: OutcomeCache = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("failed to parse outcome cache: {}", path.display()))?;

        if cache.schema_version != CACHE_SCHEMA_VERSION {
            return Err(EvalError::CacheSchema {
                path: path.display().to_string(),
                found: cache.schema_version,
            }
            .into());
        }
        Ok(cache)
    }

    pub fn load_if_exists(path: &Path) -> anyhow::Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        Self::load(path).map(Some)
    }

    /// True when the cache was built from different SQL than `queries`.
    pub fn is_stale_for(&self, queries: &[String]) -> bool {
        self.sql_sha256 != crate::fingerprint::queries_digest(queries)
    }

    /// Writes the cache, replacing any previous file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let tmp = self.write_temp(path)?;
        tmp.persist(path)
            .map_err(|e| e.error)
            .with_context(|| format!("failed to write outcome cache: {}", path.display()))?;
        Ok(())
    }

    /// Publishes the cache only if no file exists at `path` yet.
    pub fn save_exclusive(&self, path: &Path) -> anyhow::Result<Persisted> {
        let tmp = self.write_temp(path)?;
        match tmp.persist_noclobber(path) {
            Ok(_) => Ok(Persisted::Written),
            Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
                Ok(Persisted::AlreadyExists)
            }
            Err(e) => Err(e.error)
                .with_context(|| format!("failed to write outcome cache: {}", path.display())),
        }
    }

    // Same directory as the target so the final rename/link stays atomic.
    fn write_temp(&self, path: &Path) -> anyhow::Result<tempfile::NamedTempFile> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        {
            let mut w = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer(&mut w, self)?;
            w.flush()?;
        }
        Ok(tmp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Value;

    fn sample(split: &str) -> OutcomeCache {
        OutcomeCache::new(
            split,
            "gold",
            &["SELECT 1".into(), "SELECT x".into()],
            vec![
                ExecOutcome::success(vec![vec![Value::Integer(1)]]),
                ExecOutcome::failure("no such column: x"),
            ],
        )
        .unwrap()
    }

    #[test]
    fn roundtrip_preserves_outcomes() {
        let dir = tempfile::tempdir().unwrap();
        let path = gold_cache_path(dir.path(), "dev");
        let cache = sample("dev");
        cache.save(&path).unwrap();

        let back = OutcomeCache::load(&path).unwrap();
        assert_eq!(back.outcomes, cache.outcomes);
        assert_eq!(back.split, "dev");
        assert!(!back.is_stale_for(&["SELECT 1".into(), "SELECT x".into()]));
        assert!(back.is_stale_for(&["SELECT 2".into(), "SELECT x".into()]));
    }

    #[test]
    fn infinite_reals_reload_unchanged() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let exec = crate::executor::SqliteExecutor::new(conn, None);
        let queries = vec!["SELECT 1e999, -1e999".to_string()];
        let outcomes = vec![crate::executor::QueryExecutor::execute(&exec, &queries[0])];
        assert_eq!(
            outcomes[0].records().unwrap().rows,
            vec![vec![Value::Real(f64::INFINITY), Value::Real(f64::NEG_INFINITY)]]
        );

        let dir = tempfile::tempdir().unwrap();
        let path = gold_cache_path(dir.path(), "dev");
        OutcomeCache::new("dev", "gold", &queries, outcomes.clone())
            .unwrap()
            .save(&path)
            .unwrap();
        assert_eq!(OutcomeCache::load(&path).unwrap().outcomes, outcomes);
    }

    #[test]
    fn exclusive_save_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = gold_cache_path(dir.path(), "dev");

        assert_eq!(sample("dev").save_exclusive(&path).unwrap(), Persisted::Written);
        assert_eq!(
            sample("other").save_exclusive(&path).unwrap(),
            Persisted::AlreadyExists
        );
        assert_eq!(OutcomeCache::load(&path).unwrap().split, "dev");

        // no temp files left behind
        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn rejects_unknown_schema_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.json");
        let mut cache = sample("dev");
        cache.schema_version = 9;
        cache.save(&path).unwrap();
        let err = OutcomeCache::load(&path).unwrap_err();
        assert!(matches!(
            crate::errors::try_map_error(&err),
            Some(EvalError::CacheSchema { found: 9, .. })
        ));
    }

    #[test]
    fn outcomes_must_align_with_queries() {
        let err = OutcomeCache::new("dev", "gold", &["SELECT 1".into()], vec![]).unwrap_err();
        assert!(matches!(err, EvalError::LengthMismatch { .. }));
    }

    #[test]
    fn load_if_exists_is_none_for_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(OutcomeCache::load_if_exists(&dir.path().join("x.json"))
            .unwrap()
            .is_none());
    }
}
