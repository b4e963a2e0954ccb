use crate::errors::EvalError;
use crate::model::{ExecOutcome, RecordSet, Row, Value};
use anyhow::Context;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Runs one SQL string to completion.
///
/// Implementations must never fail past this boundary: every database-layer
/// problem is reported as [`ExecOutcome::Failure`] so the caller can keep
/// evaluating the rest of the batch.
pub trait QueryExecutor: Send {
    fn execute(&self, sql: &str) -> ExecOutcome;
}

/// Opens executors against one reference database.
pub trait ExecutorFactory: Send + Sync {
    fn connect(&self) -> anyhow::Result<Box<dyn QueryExecutor>>;
}

/// The reference database: where it lives and how long a query may run.
#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
    timeout: Option<Duration>,
}

impl Database {
    pub fn new(path: impl Into<PathBuf>, timeout: Option<Duration>) -> Self {
        Self {
            path: path.into(),
            timeout,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Opens a read-only connection. A missing file is a fatal error, not a
    /// per-query failure.
    pub fn open(&self) -> anyhow::Result<SqliteExecutor> {
        if !self.path.exists() {
            return Err(EvalError::missing("reference database", &[self.path.as_path()]).into());
        }
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY
                | OpenFlags::SQLITE_OPEN_NO_MUTEX
                | OpenFlags::SQLITE_OPEN_URI,
        )
        .with_context(|| format!("failed to open sqlite db {}", self.path.display()))?;
        Ok(SqliteExecutor::new(conn, self.timeout))
    }
}

impl ExecutorFactory for Database {
    fn connect(&self) -> anyhow::Result<Box<dyn QueryExecutor>> {
        Ok(Box::new(self.open()?))
    }
}

pub struct SqliteExecutor {
    conn: Connection,
    timeout: Option<Duration>,
}

// Instructions between progress-handler callbacks.
const PROGRESS_OPS: i32 = 10_000;

impl SqliteExecutor {
    pub fn new(conn: Connection, timeout: Option<Duration>) -> Self {
        Self { conn, timeout }
    }

    fn run(&self, sql: &str) -> rusqlite::Result<Vec<Row>> {
        let mut stmt = self.conn.prepare(sql)?;
        let ncols = stmt.column_count();
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(ncols);
            for i in 0..ncols {
                values.push(to_value(row.get_ref(i)?));
            }
            out.push(values);
        }
        Ok(out)
    }

    /// Returns whether a handler was installed. A limit too large to add to
    /// `Instant::now()` behaves like no limit.
    fn arm_deadline(&self) -> bool {
        let Some(deadline) = self.timeout.and_then(|t| Instant::now().checked_add(t)) else {
            return false;
        };
        self.conn
            .progress_handler(PROGRESS_OPS, Some(move || Instant::now() >= deadline));
        true
    }

    fn disarm_deadline(&self) {
        self.conn.progress_handler(0, None::<fn() -> bool>);
    }
}

impl QueryExecutor for SqliteExecutor {
    fn execute(&self, sql: &str) -> ExecOutcome {
        let sql = sql.trim();
        if sql.is_empty() {
            return ExecOutcome::failure("empty query");
        }

        let armed = self.arm_deadline();
        let result = self.run(sql);
        if armed {
            self.disarm_deadline();
        }

        match result {
            Ok(rows) => ExecOutcome::success(RecordSet::new(rows)),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::OperationInterrupted =>
            {
                let secs = self.timeout.map(|t| t.as_secs_f64()).unwrap_or_default();
                tracing::debug!(event = "query_timeout", sql = %sql, limit_s = secs);
                ExecOutcome::failure(format!("query timed out after {}s", secs))
            }
            Err(e) => ExecOutcome::failure(e.to_string()),
        }
    }
}

fn to_value(v: ValueRef<'_>) -> Value {
    match v {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
    }
}
