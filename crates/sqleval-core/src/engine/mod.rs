pub mod pool;
pub mod runner;

use crate::errors::{ensure_aligned, EvalError};
use crate::model::{EvalRecord, ExecOutcome};

/// Zips the aligned per-example inputs into [`EvalRecord`]s.
///
/// Every provided sequence must have the same length as `nl`; nothing is
/// truncated or padded.
pub fn assemble_records(
    nl: &[String],
    gold_sql: &[String],
    pred_sql: &[String],
    gold: Option<Vec<ExecOutcome>>,
    pred: Option<Vec<ExecOutcome>>,
) -> Result<Vec<EvalRecord>, EvalError> {
    let n = nl.len();
    ensure_aligned("nl", n, "gold sql", gold_sql.len())?;
    ensure_aligned("nl", n, "predicted sql", pred_sql.len())?;
    if let Some(g) = &gold {
        ensure_aligned("nl", n, "gold outcomes", g.len())?;
    }
    if let Some(p) = &pred {
        ensure_aligned("nl", n, "predicted outcomes", p.len())?;
    }

    let mut gold = gold.map(Vec::into_iter);
    let mut pred = pred.map(Vec::into_iter);

    Ok((0..n)
        .map(|i| EvalRecord {
            index: i,
            nl: nl[i].clone(),
            gold_sql: gold_sql[i].clone(),
            pred_sql: pred_sql[i].clone(),
            gold: gold.as_mut().and_then(Iterator::next),
            pred: pred.as_mut().and_then(Iterator::next),
        })
        .collect())
}
