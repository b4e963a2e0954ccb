use crate::engine::pool::ExecutorPool;
use crate::errors::{ensure_aligned, EvalError};
use crate::executor::ExecutorFactory;
use crate::model::{ExecOutcome, Experiment};
use crate::storage::{gold_cache_path, pred_cache_path, OutcomeCache, Persisted};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Where a side's outcomes came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeSource {
    Cache,
    Executed,
}

#[derive(Debug, Clone)]
pub struct SideOutcomes {
    pub outcomes: Vec<ExecOutcome>,
    pub source: OutcomeSource,
    pub path: PathBuf,
}

/// Executes every query of a split against the reference database.
///
/// Each example is isolated: one failing query only ever produces a
/// `Failure` outcome at its own index.
pub struct BatchEvaluator {
    pool: ExecutorPool,
    parallel: usize,
}

impl BatchEvaluator {
    pub fn new(factory: Arc<dyn ExecutorFactory>, parallel: usize) -> Self {
        Self {
            pool: ExecutorPool::new(factory),
            parallel: parallel.max(1),
        }
    }

    /// One outcome per query, in input order.
    pub async fn execute_all(&self, queries: &[String]) -> anyhow::Result<Vec<ExecOutcome>> {
        let start = std::time::Instant::now();
        let outcomes = if self.parallel == 1 {
            self.execute_sequential(queries).await?
        } else {
            self.execute_parallel(queries).await?
        };

        let failures = outcomes.iter().filter(|o| o.is_failure()).count();
        tracing::info!(
            event = "batch_executed",
            queries = queries.len(),
            failures,
            parallel = self.parallel,
            elapsed_ms = start.elapsed().as_millis() as u64
        );
        Ok(outcomes)
    }

    async fn execute_sequential(&self, queries: &[String]) -> anyhow::Result<Vec<ExecOutcome>> {
        let pool = self.pool.clone();
        let queries = queries.to_vec();
        let outcomes = tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<ExecOutcome>> {
            let exec = pool.acquire()?;
            let outcomes = queries
                .iter()
                .enumerate()
                .map(|(i, q)| {
                    std::panic::catch_unwind(AssertUnwindSafe(|| exec.execute(q)))
                        .unwrap_or_else(|payload| {
                            let msg = panic_message(payload.as_ref());
                            tracing::warn!(event = "worker_failed", index = i, error = %msg);
                            ExecOutcome::failure(format!("worker error: {}", msg))
                        })
                })
                .collect();
            Ok(outcomes)
        })
        .await??;
        Ok(outcomes)
    }

    async fn execute_parallel(&self, queries: &[String]) -> anyhow::Result<Vec<ExecOutcome>> {
        // Open one connection up front so a missing database fails the run
        // instead of every example.
        drop(self.pool.acquire()?);

        let sem = Arc::new(Semaphore::new(self.parallel));
        let mut handles = Vec::with_capacity(queries.len());

        for q in queries.iter() {
            let permit = sem.clone().acquire_owned().await?;
            let pool = self.pool.clone();
            let q = q.clone();
            let h = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                let exec = pool.acquire()?;
                Ok::<_, anyhow::Error>(exec.execute(&q))
            });
            handles.push(h);
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (i, h) in handles.into_iter().enumerate() {
            let outcome = match h.await {
                Ok(Ok(o)) => o,
                Ok(Err(e)) => ExecOutcome::failure(format!("connection error: {}", e)),
                Err(e) => {
                    tracing::warn!(event = "worker_failed", index = i, error = %e);
                    ExecOutcome::failure(format!("worker error: {}", e))
                }
            };
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// Executes both sides. Fails before running anything if they differ in
    /// length.
    pub async fn evaluate(
        &self,
        gold: &[String],
        pred: &[String],
    ) -> anyhow::Result<(Vec<ExecOutcome>, Vec<ExecOutcome>)> {
        ensure_aligned("gold", gold.len(), "predicted", pred.len())?;
        let gold_out = self.execute_all(gold).await?;
        let pred_out = self.execute_all(pred).await?;
        Ok((gold_out, pred_out))
    }

    /// Gold outcomes for a split: the persisted cache when present, otherwise
    /// executed once and published with exclusive-create.
    pub async fn gold_outcomes(
        &self,
        records_dir: &Path,
        split: &str,
        gold: &[String],
        refresh: bool,
    ) -> anyhow::Result<SideOutcomes> {
        let path = gold_cache_path(records_dir, split);

        if !refresh {
            if let Some(cache) = OutcomeCache::load_if_exists(&path)? {
                ensure_aligned("gold cache", cache.outcomes.len(), "gold sql", gold.len())?;
                if cache.is_stale_for(gold) {
                    tracing::warn!(
                        event = "gold_cache_stale",
                        path = %path.display(),
                        "gold cache was built from different SQL; delete it to rebuild"
                    );
                }
                tracing::info!(event = "gold_cache_hit", split, path = %path.display());
                return Ok(SideOutcomes {
                    outcomes: cache.outcomes,
                    source: OutcomeSource::Cache,
                    path,
                });
            }
        }

        tracing::info!(event = "gold_cache_miss", split, queries = gold.len());
        let outcomes = self.execute_all(gold).await?;
        let cache = OutcomeCache::new(split, "gold", gold, outcomes)?;

        let persisted = if refresh {
            cache.save(&path)?;
            Persisted::Written
        } else {
            cache.save_exclusive(&path)?
        };
        if persisted == Persisted::AlreadyExists {
            tracing::warn!(
                event = "gold_cache_race",
                path = %path.display(),
                "gold cache appeared while executing; keeping the existing file"
            );
        }

        Ok(SideOutcomes {
            outcomes: cache.outcomes,
            source: OutcomeSource::Executed,
            path,
        })
    }

    /// Executes an experiment's predictions and persists them (overwriting).
    pub async fn pred_outcomes(
        &self,
        records_dir: &Path,
        exp: &Experiment,
        split: &str,
        pred: &[String],
    ) -> anyhow::Result<SideOutcomes> {
        let path = pred_cache_path(records_dir, exp, split);
        let outcomes = self.execute_all(pred).await?;
        let cache = OutcomeCache::new(split, &exp.artifact_stem(split), pred, outcomes)?;
        cache.save(&path)?;
        tracing::debug!(event = "pred_cache_written", path = %path.display());

        Ok(SideOutcomes {
            outcomes: cache.outcomes,
            source: OutcomeSource::Executed,
            path,
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

/// What to do with a persisted side built from different SQL than the
/// current queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StalePolicy {
    /// Keep the outcomes and warn (manual invalidation).
    Warn,
    /// Drop the outcomes and warn; the caller falls back to SQL strings.
    Discard,
}

/// Loads a persisted side if present, checking its length and its SQL
/// digest against `queries`.
pub fn load_side(
    path: &Path,
    queries: &[String],
    stale: StalePolicy,
) -> anyhow::Result<Option<Vec<ExecOutcome>>> {
    let Some(cache) = OutcomeCache::load_if_exists(path)? else {
        return Ok(None);
    };
    if cache.outcomes.len() != queries.len() {
        return Err(EvalError::length_mismatch(
            "cached outcomes",
            cache.outcomes.len(),
            "examples",
            queries.len(),
        )
        .into());
    }
    if cache.is_stale_for(queries) {
        tracing::warn!(
            event = "outcome_cache_stale",
            path = %path.display(),
            discarded = stale == StalePolicy::Discard,
            "outcome cache was built from different SQL; rerun `sqleval records`"
        );
        if stale == StalePolicy::Discard {
            return Ok(None);
        }
    }
    Ok(Some(cache.outcomes))
}
