use serde::{Deserialize, Serialize};
use std::fmt;

/// A single cell returned by the reference database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "ValueWire", try_from = "ValueWire")]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

/// JSON form of [`Value`]. JSON has no infinities, so non-finite reals are
/// written as `{"real": "inf"}`, `{"real": "-inf"}` or `{"real": "nan"}`.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ValueWire {
    Null,
    // Integer must stay ahead of Real so `1` does not come back as `1.0`.
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    NonFinite { real: String },
}

impl From<Value> for ValueWire {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => ValueWire::Null,
            Value::Integer(i) => ValueWire::Integer(i),
            Value::Real(f) if f.is_finite() => ValueWire::Real(f),
            Value::Real(f) => ValueWire::NonFinite {
                real: if f.is_nan() {
                    "nan"
                } else if f > 0.0 {
                    "inf"
                } else {
                    "-inf"
                }
                .to_string(),
            },
            Value::Text(s) => ValueWire::Text(s),
            Value::Blob(b) => ValueWire::Blob(b),
        }
    }
}

impl TryFrom<ValueWire> for Value {
    type Error = String;

    fn try_from(w: ValueWire) -> Result<Self, Self::Error> {
        Ok(match w {
            ValueWire::Null => Value::Null,
            ValueWire::Integer(i) => Value::Integer(i),
            ValueWire::Real(f) => Value::Real(f),
            ValueWire::Text(s) => Value::Text(s),
            ValueWire::Blob(b) => Value::Blob(b),
            ValueWire::NonFinite { real } => match real.as_str() {
                "inf" => Value::Real(f64::INFINITY),
                "-inf" => Value::Real(f64::NEG_INFINITY),
                "nan" => Value::Real(f64::NAN),
                other => return Err(format!("invalid non-finite real: {other}")),
            },
        })
    }
}

/// Hashable comparison key for a [`Value`].
///
/// Integral reals that fit in an i64 collapse onto `Int`, so `SUM(x)` and
/// `TOTAL(x)` style results compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueKey {
    Null,
    Int(i64),
    Real(u64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn key(&self) -> ValueKey {
        match self {
            Value::Null => ValueKey::Null,
            Value::Integer(i) => ValueKey::Int(*i),
            Value::Real(f) => {
                if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 {
                    ValueKey::Int(*f as i64)
                } else {
                    ValueKey::Real(f.to_bits())
                }
            }
            Value::Text(s) => ValueKey::Text(s.clone()),
            Value::Blob(b) => ValueKey::Blob(b.clone()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "None"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) => {
                if r.fract() == 0.0 && r.is_finite() {
                    write!(f, "{:.1}", r)
                } else {
                    write!(f, "{}", r)
                }
            }
            Value::Text(s) => write!(f, "'{}'", s.replace('\'', "\\'")),
            Value::Blob(b) => write!(f, "b'{}'", hex::encode(b)),
        }
    }
}

pub type Row = Vec<Value>;

/// Renders a row the way result tuples are usually shown: `(1, 'a')`, `(1,)`.
pub struct RowDisplay<'a>(pub &'a [Value]);

impl fmt::Display for RowDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", v)?;
        }
        if self.0.len() == 1 {
            write!(f, ",")?;
        }
        write!(f, ")")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordSet {
    pub rows: Vec<Row>,
}

impl RecordSet {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl From<Vec<Row>> for RecordSet {
    fn from(rows: Vec<Row>) -> Self {
        Self { rows }
    }
}

/// Result of running one query. Exactly one side is ever populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecOutcome {
    Success { records: RecordSet },
    Failure { error: String },
}

impl ExecOutcome {
    pub fn success(records: impl Into<RecordSet>) -> Self {
        ExecOutcome::Success {
            records: records.into(),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        ExecOutcome::Failure {
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExecOutcome::Success { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ExecOutcome::Failure { .. })
    }

    pub fn records(&self) -> Option<&RecordSet> {
        match self {
            ExecOutcome::Success { records } => Some(records),
            ExecOutcome::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ExecOutcome::Success { .. } => None,
            ExecOutcome::Failure { error } => Some(error),
        }
    }
}

/// Everything known about one dataset example after evaluation.
///
/// Outcomes are `None` only when the corresponding cache was unavailable and
/// the caller chose not to execute (degraded, SQL-string comparison).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalRecord {
    pub index: usize,
    pub nl: String,
    pub gold_sql: String,
    pub pred_sql: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gold: Option<ExecOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pred: Option<ExecOutcome>,
}

impl EvalRecord {
    /// Predicted side failed to execute.
    pub fn pred_failed(&self) -> bool {
        self.pred.as_ref().is_some_and(ExecOutcome::is_failure)
    }

    pub fn gold_failed(&self) -> bool {
        self.gold.as_ref().is_some_and(ExecOutcome::is_failure)
    }

    pub fn sql_matches(&self) -> bool {
        self.gold_sql.trim() == self.pred_sql.trim()
    }
}

/// How examples were compared when building a report or summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonMode {
    Records,
    SqlString,
}

impl ComparisonMode {
    pub fn label(&self) -> &'static str {
        match self {
            ComparisonMode::Records => "record comparison",
            ComparisonMode::SqlString => "SQL string comparison (fallback)",
        }
    }
}

/// Fine-tuned vs. trained-from-scratch checkpoints; part of artifact names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    Ft,
    Scr,
}

impl ModelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::Ft => "ft",
            ModelType::Scr => "scr",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ft" => Some(ModelType::Ft),
            "scr" => Some(ModelType::Scr),
            _ => None,
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An experiment whose predictions are evaluated against a split.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Experiment {
    pub name: String,
    pub model_type: ModelType,
}

impl Experiment {
    pub fn new(name: impl Into<String>, model_type: ModelType) -> Self {
        Self {
            name: name.into(),
            model_type,
        }
    }

    /// Artifact stem shared by prediction and record files: `t5_ft_name_dev`.
    pub fn artifact_stem(&self, split: &str) -> String {
        format!("t5_{}_{}_{}", self.model_type, self.name, split)
    }
}
