use crate::errors::EvalError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod path_resolver;

pub const SUPPORTED_CONFIG_VERSION: u32 = 1;
pub const DEFAULT_CONFIG_FILE: &str = "sqleval.yaml";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvalConfig {
    #[serde(default = "default_version", alias = "configVersion")]
    pub version: u32,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub settings: Settings,
}

fn default_version() -> u32 {
    SUPPORTED_CONFIG_VERSION
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            version: SUPPORTED_CONFIG_VERSION,
            paths: Paths::default(),
            settings: Settings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Paths {
    pub data_dir: PathBuf,
    pub database: PathBuf,
    pub results_dir: PathBuf,
    pub fallback_results_dir: PathBuf,
    pub records_dir: PathBuf,
    pub reports_dir: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            data_dir: "data".into(),
            database: "data/flight_database.db".into(),
            results_dir: "results".into(),
            fallback_results_dir: "model_output".into(),
            records_dir: "records".into(),
            reports_dir: "mismatches".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_rows_file: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_rows_console: Option<usize>,
}

impl Settings {
    pub fn parallel(&self) -> usize {
        self.parallel.unwrap_or(1).max(1)
    }

    /// `timeout_seconds: 0` disables the per-query limit.
    pub fn timeout(&self) -> Option<Duration> {
        match self.timeout_seconds.unwrap_or(120) {
            0 => None,
            s => Some(Duration::from_secs(s)),
        }
    }

    pub fn preview_rows_file(&self) -> usize {
        self.preview_rows_file.unwrap_or(10)
    }

    pub fn preview_rows_console(&self) -> usize {
        self.preview_rows_console.unwrap_or(5)
    }
}

/// Loads the config file. When `explicit` is false a missing file yields the
/// defaults; an explicitly requested file must exist.
pub fn load_config(path: &Path, explicit: bool, strict: bool) -> Result<EvalConfig, EvalError> {
    if !path.exists() && !explicit {
        tracing::debug!(event = "config_default", path = %path.display());
        return Ok(EvalConfig::default());
    }

    let raw = std::fs::read_to_string(path).map_err(|e| {
        EvalError::Config(format!("failed to read config {}: {}", path.display(), e))
    })?;

    let mut cfg = parse_config(&raw, strict)
        .map_err(|e| EvalError::Config(format!("{} (file: {})", e, path.display())))?;

    normalize_paths(&mut cfg, path);
    Ok(cfg)
}

fn parse_config(raw: &str, strict: bool) -> Result<EvalConfig, String> {
    let mut ignored_keys = std::collections::BTreeSet::new();
    let deserializer = serde_yaml::Deserializer::from_str(raw);

    let cfg: EvalConfig = serde_ignored::deserialize(deserializer, |path| {
        ignored_keys.insert(path.to_string());
    })
    .map_err(|e| format!("failed to parse YAML: {}", e))?;

    let meaningful: Vec<_> = ignored_keys
        .iter()
        .filter(|k| !k.starts_with('_') && !k.starts_with("x-"))
        .collect();
    if !meaningful.is_empty() {
        if strict {
            return Err(format!("unknown config fields: {:?}", meaningful));
        }
        tracing::warn!(event = "config_unknown_fields", fields = ?meaningful);
    }

    if cfg.version != SUPPORTED_CONFIG_VERSION {
        return Err(format!(
            "unsupported config version {} (supported: {})",
            cfg.version, SUPPORTED_CONFIG_VERSION
        ));
    }

    Ok(cfg)
}

fn normalize_paths(cfg: &mut EvalConfig, config_path: &Path) {
    let r = path_resolver::PathResolver::new(config_path);
    let p = &mut cfg.paths;
    for path in [
        &mut p.data_dir,
        &mut p.database,
        &mut p.results_dir,
        &mut p.fallback_results_dir,
        &mut p.records_dir,
        &mut p.reports_dir,
    ] {
        r.resolve(path);
    }
}

impl EvalConfig {
    /// Applies `SQLEVAL_DB`, `SQLEVAL_PARALLEL` and `SQLEVAL_TIMEOUT_SECS`.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|k| std::env::var(k).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("SQLEVAL_DB") {
            self.paths.database = v.into();
        }
        if let Some(v) = lookup("SQLEVAL_PARALLEL") {
            if let Ok(n) = v.parse() {
                self.settings.parallel = Some(n);
            }
        }
        if let Some(v) = lookup("SQLEVAL_TIMEOUT_SECS") {
            if let Ok(n) = v.parse() {
                self.settings.timeout_seconds = Some(n);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_missing_and_implicit() {
        let cfg = load_config(Path::new("/nope/sqleval.yaml"), false, false).unwrap();
        assert_eq!(cfg, EvalConfig::default());
        assert_eq!(cfg.settings.parallel(), 1);
        assert_eq!(cfg.settings.preview_rows_file(), 10);
        assert_eq!(cfg.settings.preview_rows_console(), 5);
    }

    #[test]
    fn explicit_missing_file_is_config_error() {
        let err = load_config(Path::new("/nope/sqleval.yaml"), true, false).unwrap_err();
        assert!(matches!(err, EvalError::Config(_)));
    }

    #[test]
    fn parses_partial_yaml() {
        let cfg = parse_config(
            "version: 1\npaths:\n  database: flights.db\n\
             settings:\n  parallel: 4\n  timeout_seconds: 0\n",
            true,
        )
        .unwrap();
        assert_eq!(cfg.paths.database, PathBuf::from("flights.db"));
        assert_eq!(cfg.paths.data_dir, PathBuf::from("data"));
        assert_eq!(cfg.settings.parallel(), 4);
        assert_eq!(cfg.settings.timeout(), None);
    }

    #[test]
    fn unknown_fields_rejected_only_in_strict_mode() {
        let raw = "version: 1\nsettigns:\n  parallel: 2\n";
        assert!(parse_config(raw, false).is_ok());
        let err = parse_config(raw, true).unwrap_err();
        assert!(err.contains("settigns"), "got: {err}");
    }

    #[test]
    fn rejects_unknown_version() {
        let err = parse_config("version: 7\n", false).unwrap_err();
        assert!(err.contains("unsupported config version 7"));
    }

    #[test]
    fn env_overrides_apply() {
        let mut cfg = EvalConfig::default();
        cfg.apply_overrides(|k| match k {
            "SQLEVAL_DB" => Some("/tmp/x.db".into()),
            "SQLEVAL_PARALLEL" => Some("3".into()),
            "SQLEVAL_TIMEOUT_SECS" => Some("not-a-number".into()),
            _ => None,
        });
        assert_eq!(cfg.paths.database, PathBuf::from("/tmp/x.db"));
        assert_eq!(cfg.settings.parallel, Some(3));
        assert_eq!(cfg.settings.timeout_seconds, None);
    }

    #[test]
    fn config_paths_resolve_against_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sqleval.yaml");
        std::fs::write(&path, "version: 1\npaths:\n  records_dir: cache/records\n").unwrap();
        let cfg = load_config(&path, true, false).unwrap();
        assert_eq!(cfg.paths.records_dir, dir.path().join("cache/records"));
    }
}
