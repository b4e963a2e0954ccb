//! Set-semantics comparison of query results.
//!
//! Each row becomes a fixed-order tuple of [`ValueKey`]s (column order as
//! returned by the executor). Row order and duplicate counts are ignored.

use crate::model::{ExecOutcome, RecordSet, ValueKey};
use std::collections::HashSet;

pub type RowKey = Vec<ValueKey>;

/// Rows of a record set reduced to a set. Absent means empty.
pub fn row_set(records: Option<&RecordSet>) -> HashSet<RowKey> {
    records
        .map(|r| {
            r.rows
                .iter()
                .map(|row| row.iter().map(|v| v.key()).collect())
                .collect()
        })
        .unwrap_or_default()
}

/// Record sets are equal as sets of tuples.
pub fn records_match(a: Option<&RecordSet>, b: Option<&RecordSet>) -> bool {
    row_set(a) == row_set(b)
}

/// Record sets of two outcomes; a failed side contributes no rows.
pub fn outcomes_match(a: &ExecOutcome, b: &ExecOutcome) -> bool {
    records_match(a.records(), b.records())
}

/// Precision/recall of predicted rows against gold rows, both as sets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetScore {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Both empty scores 1.0, exactly one empty scores 0.0.
pub fn set_f1(gold: &HashSet<RowKey>, pred: &HashSet<RowKey>) -> SetScore {
    match (gold.is_empty(), pred.is_empty()) {
        (true, true) => {
            return SetScore {
                precision: 1.0,
                recall: 1.0,
                f1: 1.0,
            }
        }
        (true, false) => {
            return SetScore {
                precision: 0.0,
                recall: 1.0,
                f1: 0.0,
            }
        }
        (false, true) => {
            return SetScore {
                precision: 1.0,
                recall: 0.0,
                f1: 0.0,
            }
        }
        (false, false) => {}
    }

    let hits = pred.intersection(gold).count() as f64;
    let precision = hits / pred.len() as f64;
    let recall = hits / gold.len() as f64;
    let f1 = if hits == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    };
    SetScore {
        precision,
        recall,
        f1,
    }
}
