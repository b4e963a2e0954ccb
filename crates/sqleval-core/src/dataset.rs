use crate::errors::{ensure_aligned, EvalError};
use anyhow::Context;
use std::path::{Path, PathBuf};

pub const NL_PREFIX: &str = "translate to SQL: ";

/// Splits without gold SQL.
const UNLABELED_SPLITS: &[&str] = &["test"];

/// Input text as fed to the external sequence model.
pub fn preprocess_nl(nl: &str) -> String {
    format!("{}{}", NL_PREFIX, nl)
}

/// One line per entry, each trimmed.
pub fn load_lines(path: &Path) -> anyhow::Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(raw.lines().map(|l| l.trim().to_string()).collect())
}

#[derive(Debug, Clone)]
pub struct Split {
    pub name: String,
    pub nl: Vec<String>,
    /// `None` for unlabeled splits.
    pub sql: Option<Vec<String>>,
}

impl Split {
    pub fn nl_path(data_dir: &Path, split: &str) -> PathBuf {
        data_dir.join(format!("{split}.nl"))
    }

    pub fn sql_path(data_dir: &Path, split: &str) -> PathBuf {
        data_dir.join(format!("{split}.sql"))
    }

    /// Loads `<split>.nl` and, for labeled splits, `<split>.sql`.
    pub fn load(data_dir: &Path, split: &str) -> anyhow::Result<Self> {
        let nl_path = Self::nl_path(data_dir, split);
        if !nl_path.exists() {
            return Err(EvalError::missing(format!("{split} NL file"), &[&nl_path]).into());
        }
        let nl = load_lines(&nl_path)?;

        let sql = if UNLABELED_SPLITS.contains(&split) {
            None
        } else {
            let sql_path = Self::sql_path(data_dir, split);
            if !sql_path.exists() {
                let what = format!("{split} gold SQL file");
                return Err(EvalError::missing(what, &[&sql_path]).into());
            }
            let sql = load_lines(&sql_path)?;
            ensure_aligned("nl", nl.len(), "gold sql", sql.len())?;
            Some(sql)
        };

        tracing::debug!(event = "split_loaded", split, examples = nl.len());
        Ok(Self {
            name: split.to_string(),
            nl,
            sql,
        })
    }

    pub fn len(&self) -> usize {
        self.nl.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nl.is_empty()
    }

    /// Gold SQL, or an error for unlabeled splits.
    pub fn gold_sql(&self) -> anyhow::Result<&[String]> {
        self.sql.as_deref().ok_or_else(|| {
            EvalError::Config(format!("split '{}' has no gold SQL", self.name)).into()
        })
    }
}

/// Corpus statistics over a labeled split.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct SplitStats {
    pub examples: usize,
    pub mean_nl_length: f64,
    pub mean_sql_length: f64,
    pub nl_vocab_size: usize,
    pub sql_vocab_size: usize,
}

/// Token source for statistics. Real subword tokenizers live outside this crate.
pub trait Tokenizer {
    fn tokenize<'a>(&self, text: &'a str) -> Vec<&'a str>;
}

pub struct WhitespaceTokenizer;

impl Tokenizer for WhitespaceTokenizer {
    fn tokenize<'a>(&self, text: &'a str) -> Vec<&'a str> {
        text.split_whitespace().collect()
    }
}

pub fn compute_stats(
    nl: &[String],
    sql: &[String],
    tokenizer: &dyn Tokenizer,
    add_prefix: bool,
) -> SplitStats {
    let mut nl_vocab = std::collections::HashSet::new();
    let mut nl_total = 0usize;
    for q in nl {
        let text = if add_prefix { preprocess_nl(q) } else { q.clone() };
        let toks = tokenizer.tokenize(&text);
        nl_total += toks.len();
        nl_vocab.extend(toks.into_iter().map(str::to_string));
    }

    let mut sql_vocab = std::collections::HashSet::new();
    let mut sql_total = 0usize;
    for q in sql {
        let toks = tokenizer.tokenize(q);
        sql_total += toks.len();
        sql_vocab.extend(toks);
    }

    SplitStats {
        examples: nl.len(),
        mean_nl_length: mean(nl_total, nl.len()),
        mean_sql_length: mean(sql_total, sql.len()),
        nl_vocab_size: nl_vocab.len(),
        sql_vocab_size: sql_vocab.len(),
    }
}

fn mean(total: usize, n: usize) -> f64 {
    if n == 0 {
        0.0
    } else {
        total as f64 / n as f64
    }
}
