//! Example-level inspection: which predictions matched, which returned
//! different rows, which failed to run.

use crate::compare::outcomes_match;
use crate::model::{ComparisonMode, EvalRecord, ExecOutcome, Experiment, RowDisplay};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

const RULE_WIDTH: usize = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Match,
    Mismatch,
    ExecutionError,
}

/// Disjoint partition of a split's records.
#[derive(Debug)]
pub struct Diagnostics<'a> {
    pub mode: ComparisonMode,
    pub total: usize,
    pub matches: Vec<&'a EvalRecord>,
    pub mismatches: Vec<&'a EvalRecord>,
    pub errors: Vec<&'a EvalRecord>,
    /// Predicted outcomes were available, so errors could be detected.
    pub errors_known: bool,
}

/// Records mode needs both outcomes on every record; otherwise SQL strings
/// are compared.
pub fn comparison_mode(records: &[EvalRecord]) -> ComparisonMode {
    if records.iter().all(|r| r.gold.is_some() && r.pred.is_some()) {
        ComparisonMode::Records
    } else {
        ComparisonMode::SqlString
    }
}

pub fn classify(rec: &EvalRecord, mode: ComparisonMode) -> Category {
    if rec.pred_failed() {
        return Category::ExecutionError;
    }
    let same = match (mode, &rec.gold, &rec.pred) {
        (ComparisonMode::Records, Some(g), Some(p)) => outcomes_match(g, p),
        _ => rec.sql_matches(),
    };
    if same {
        Category::Match
    } else {
        Category::Mismatch
    }
}

pub fn diagnose(records: &[EvalRecord]) -> Diagnostics<'_> {
    let mode = comparison_mode(records);
    let mut d = Diagnostics {
        mode,
        total: records.len(),
        matches: vec![],
        mismatches: vec![],
        errors: vec![],
        errors_known: !records.is_empty() && records.iter().all(|r| r.pred.is_some()),
    };
    for r in records {
        match classify(r, mode) {
            Category::Match => d.matches.push(r),
            Category::Mismatch => d.mismatches.push(r),
            Category::ExecutionError => d.errors.push(r),
        }
    }
    d
}

impl Diagnostics<'_> {
    pub fn match_rate(&self) -> f64 {
        percent(self.matches.len(), self.total)
    }

    pub fn error_rate(&self) -> f64 {
        percent(self.errors.len(), self.total)
    }

    fn noun(&self) -> &'static str {
        match self.mode {
            ComparisonMode::Records => "record",
            ComparisonMode::SqlString => "SQL",
        }
    }
}

fn percent(n: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        n as f64 / total as f64 * 100.0
    }
}

/// Identifies the run a report belongs to.
#[derive(Debug, Clone)]
pub struct ReportHeader {
    pub experiment: Experiment,
    pub split: String,
}

fn rule(out: &mut String, c: char) {
    out.extend(std::iter::repeat(c).take(RULE_WIDTH));
    out.push('\n');
}

fn write_header(out: &mut String, title: &str, h: &ReportHeader, d: &Diagnostics<'_>) {
    rule(out, '=');
    let _ = writeln!(out, "{} - Experiment: {}", title, h.experiment.name);
    let _ = writeln!(out, "Model Type: {}", h.experiment.model_type);
    let _ = writeln!(out, "Split: {}", h.split);
    let _ = writeln!(out, "Comparison Mode: {}", d.mode.label());
    rule(out, '=');
    out.push('\n');
    let _ = writeln!(out, "Total queries: {}", d.total);
}

fn write_rows(out: &mut String, label: &str, outcome: Option<&ExecOutcome>, preview: usize) {
    match outcome {
        None => {
            let _ = writeln!(out, "\n{} Records: (unavailable)", label);
        }
        Some(ExecOutcome::Failure { error }) => {
            let _ = writeln!(out, "\n{} Records: (error: {})", label, error);
        }
        Some(ExecOutcome::Success { records }) => {
            let _ = writeln!(out, "\n{} Records ({} rows):", label, records.len());
            if records.is_empty() {
                out.push_str("  (empty)\n");
                return;
            }
            for row in records.rows.iter().take(preview) {
                let _ = writeln!(out, "  {}", RowDisplay(row));
            }
            if records.len() > preview {
                let _ = writeln!(out, "  ... ({} more rows)", records.len() - preview);
            }
        }
    }
}

fn write_example(out: &mut String, n: usize, rec: &EvalRecord) {
    let _ = writeln!(out, "Example {} (Index {}):", n, rec.index);
    let _ = writeln!(out, "NL Query: {}", rec.nl);
    let _ = writeln!(out, "\nGold SQL:\n{}", rec.gold_sql);
    let _ = writeln!(out, "\nPredicted SQL:\n{}", rec.pred_sql);
}

fn write_mismatches(out: &mut String, d: &Diagnostics<'_>, preview: usize) {
    for (n, rec) in d.mismatches.iter().enumerate() {
        write_example(out, n + 1, rec);
        if d.mode == ComparisonMode::Records {
            write_rows(out, "Gold", rec.gold.as_ref(), preview);
            write_rows(out, "Predicted", rec.pred.as_ref(), preview);
        }
        out.push('\n');
        rule(out, '-');
        out.push('\n');
    }
}

fn write_errors(out: &mut String, d: &Diagnostics<'_>) {
    for (n, rec) in d.errors.iter().enumerate() {
        write_example(out, n + 1, rec);
        let msg = rec.pred.as_ref().and_then(ExecOutcome::error).unwrap_or("");
        let _ = writeln!(out, "\nError Message:\n{}", msg);
        out.push('\n');
        rule(out, '-');
        out.push('\n');
    }
}

/// Mismatch report body, `preview` rows per side.
pub fn render_mismatch_report(h: &ReportHeader, d: &Diagnostics<'_>, preview: usize) -> String {
    let mut out = String::new();
    let noun = d.noun();
    write_header(&mut out, &format!("{} MISMATCHES", noun.to_uppercase()), h, d);
    let _ = writeln!(out, "Queries with {} mismatches: {}", noun, d.mismatches.len());
    let _ = writeln!(out, "Queries with SQL errors: {}", d.errors.len());
    let _ = writeln!(out, "{} match rate: {:.2}%", capitalize(noun), d.match_rate());
    out.push('\n');
    rule(&mut out, '=');
    out.push_str(match d.mode {
        ComparisonMode::Records => "ALL RECORD MISMATCHES (Different fetched results)\n",
        ComparisonMode::SqlString => "ALL SQL MISMATCHES (Predicted SQL != Gold SQL)\n",
    });
    rule(&mut out, '=');
    out.push('\n');
    write_mismatches(&mut out, d, preview);
    out
}

pub fn render_error_report(h: &ReportHeader, d: &Diagnostics<'_>) -> String {
    let mut out = String::new();
    write_header(&mut out, "SQL ERRORS", h, d);
    let _ = writeln!(out, "Queries with SQL errors: {}", d.errors.len());
    let _ = writeln!(out, "SQL error rate: {:.2}%", d.error_rate());
    out.push('\n');
    rule(&mut out, '=');
    out.push_str("ALL QUERIES WITH SQL ERRORS (Failed to execute)\n");
    rule(&mut out, '=');
    out.push('\n');
    write_errors(&mut out, d);
    out
}

/// Console rendering: counts, then every error, then every mismatch.
pub fn render_console(d: &Diagnostics<'_>, preview: usize) -> String {
    let mut out = String::new();
    let noun = d.noun();
    let _ = writeln!(out, "Comparison mode: {}", d.mode.label());
    let _ = writeln!(out, "Total queries: {}", d.total);
    let _ = writeln!(out, "Queries with {} mismatches: {}", noun, d.mismatches.len());
    let _ = writeln!(out, "{} match rate: {:.2}%", capitalize(noun), d.match_rate());
    if d.errors_known {
        let _ = writeln!(out, "Queries with SQL errors: {}", d.errors.len());
        let _ = writeln!(out, "SQL error rate: {:.2}%", d.error_rate());
    }

    if !d.errors.is_empty() {
        out.push('\n');
        rule(&mut out, '=');
        let _ = writeln!(out, "ALL {} QUERIES WITH SQL ERRORS", d.errors.len());
        rule(&mut out, '=');
        out.push('\n');
        write_errors(&mut out, d);
    }

    out.push('\n');
    rule(&mut out, '=');
    let _ = writeln!(out, "ALL {} {} MISMATCHES", d.mismatches.len(), noun.to_uppercase());
    rule(&mut out, '=');
    out.push('\n');
    write_mismatches(&mut out, d, preview);
    out
}

#[derive(Debug, Clone)]
pub struct ReportPaths {
    pub mismatches: PathBuf,
    /// Only written when at least one prediction failed to execute.
    pub errors: Option<PathBuf>,
}

pub fn mismatch_report_path(dir: &Path, exp: &Experiment) -> PathBuf {
    dir.join(format!("{}_mismatches.txt", exp.name))
}

pub fn error_report_path(dir: &Path, exp: &Experiment) -> PathBuf {
    dir.join(format!("error_{}.txt", exp.name))
}

pub fn write_reports(
    dir: &Path,
    h: &ReportHeader,
    d: &Diagnostics<'_>,
    preview: usize,
) -> anyhow::Result<ReportPaths> {
    std::fs::create_dir_all(dir)?;

    let mismatches = mismatch_report_path(dir, &h.experiment);
    std::fs::write(&mismatches, render_mismatch_report(h, d, preview))?;

    let err_path = error_report_path(dir, &h.experiment);
    let errors = if d.errors.is_empty() {
        // a clean rerun must not leave the previous run's errors behind
        match std::fs::remove_file(&err_path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        None
    } else {
        std::fs::write(&err_path, render_error_report(h, d))?;
        Some(err_path)
    };

    tracing::info!(
        event = "reports_written",
        mismatches = d.mismatches.len(),
        errors = d.errors.len(),
        path = %mismatches.display()
    );
    Ok(ReportPaths { mismatches, errors })
}

fn capitalize(s: &str) -> String {
    let mut c = s.chars();
    match c.next() {
        Some(f) => f.to_uppercase().chain(c).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelType, RecordSet, Value};

    fn ints(v: &[i64]) -> ExecOutcome {
        ExecOutcome::success(RecordSet::new(
            v.iter().map(|i| vec![Value::Integer(*i)]).collect(),
        ))
    }

    fn rec(
        i: usize,
        gold: &str,
        pred: &str,
        g: Option<ExecOutcome>,
        p: Option<ExecOutcome>,
    ) -> EvalRecord {
        EvalRecord {
            index: i,
            nl: format!("question {i}"),
            gold_sql: gold.into(),
            pred_sql: pred.into(),
            gold: g,
            pred: p,
        }
    }

    fn header() -> ReportHeader {
        ReportHeader {
            experiment: Experiment::new("base", ModelType::Ft),
            split: "dev".into(),
        }
    }

    fn sample() -> Vec<EvalRecord> {
        let gold = "SELECT a FROM t";
        let g = || Some(ints(&[1, 2]));
        let missing = ExecOutcome::failure("no such column: nonexistent_col");
        vec![
            rec(0, gold, "SELECT a FROM t ORDER BY a DESC", g(), Some(ints(&[2, 1]))),
            rec(1, gold, "SELECT a FROM t WHERE a = 1", g(), Some(ints(&[1]))),
            rec(2, gold, "SELECT nonexistent_col FROM t", g(), Some(missing)),
        ]
    }

    #[test]
    fn partitions_are_disjoint_and_complete() {
        let records = sample();
        let d = diagnose(&records);
        assert_eq!(d.mode, ComparisonMode::Records);
        assert_eq!(d.matches.len(), 1);
        assert_eq!(d.mismatches.len(), 1);
        assert_eq!(d.errors.len(), 1);
        assert_eq!(d.matches.len() + d.mismatches.len() + d.errors.len(), d.total);
        assert_eq!(d.mismatches[0].index, 1);
        assert_eq!(d.errors[0].index, 2);
    }

    #[test]
    fn falls_back_to_sql_strings_without_gold_outcomes() {
        let records = vec![
            rec(0, "SELECT 1", " SELECT 1 ", None, Some(ints(&[1]))),
            rec(1, "SELECT 1", "SELECT 2", None, Some(ints(&[2]))),
            rec(2, "SELECT 1", "SELEC", None, Some(ExecOutcome::failure("syntax error"))),
        ];
        let d = diagnose(&records);
        assert_eq!(d.mode, ComparisonMode::SqlString);
        assert_eq!(d.matches.len(), 1);
        assert_eq!(d.mismatches.len(), 1);
        assert_eq!(d.errors.len(), 1);
        assert!(d.errors_known);

        let text = render_mismatch_report(&header(), &d, 10);
        assert!(text.contains("Comparison Mode: SQL string comparison (fallback)"));
        assert!(text.contains("ALL SQL MISMATCHES"));
        assert!(!text.contains("Gold Records"));
    }

    #[test]
    fn preview_truncates_with_suffix() {
        let many: Vec<i64> = (0..13).collect();
        let records = vec![rec(0, "g", "p", Some(ints(&many)), Some(ints(&[99])))];
        let d = diagnose(&records);

        let file = render_mismatch_report(&header(), &d, 10);
        assert!(file.contains("Gold Records (13 rows):"));
        assert!(file.contains("  (9,)\n  ... (3 more rows)"));
        assert!(!file.contains("(10,)"));

        let console = render_console(&d, 5);
        assert!(console.contains("  (4,)\n  ... (8 more rows)"));
    }

    #[test]
    fn rendering_is_deterministic_and_pure() {
        let records = sample();
        let before = format!("{:?}", records);
        let d = diagnose(&records);
        let a = render_mismatch_report(&header(), &d, 10);
        let b = render_mismatch_report(&header(), &diagnose(&records), 10);
        assert_eq!(a, b);
        assert_eq!(before, format!("{:?}", records));
    }

    #[test]
    fn report_header_and_rates() {
        let records = sample();
        let d = diagnose(&records);
        let text = render_mismatch_report(&header(), &d, 10);
        assert!(text.contains("RECORD MISMATCHES - Experiment: base"));
        assert!(text.contains("Model Type: ft"));
        assert!(text.contains("Record match rate: 33.33%"));
        assert!(text.contains("Example 1 (Index 1):"));

        let errs = render_error_report(&header(), &d);
        assert!(errs.contains("SQL error rate: 33.33%"));
        assert!(errs.contains("Error Message:\nno such column: nonexistent_col"));
    }

    #[test]
    fn writes_error_file_only_when_needed() {
        let dir = tempfile::tempdir().unwrap();
        let clean = vec![rec(0, "g", "p", Some(ints(&[1])), Some(ints(&[1])))];
        let paths = write_reports(dir.path(), &header(), &diagnose(&clean), 10).unwrap();
        assert!(paths.mismatches.ends_with("base_mismatches.txt"));
        assert!(paths.errors.is_none());

        let records = sample();
        let paths = write_reports(dir.path(), &header(), &diagnose(&records), 10).unwrap();
        let err_path = paths.errors.unwrap();
        assert!(err_path.ends_with("error_base.txt"));
        assert!(err_path.exists());
    }

    #[test]
    fn clean_rerun_removes_previous_error_file() {
        let dir = tempfile::tempdir().unwrap();
        let records = sample();
        let err_path = write_reports(dir.path(), &header(), &diagnose(&records), 10)
            .unwrap()
            .errors
            .unwrap();
        assert!(err_path.exists());

        let clean = vec![rec(0, "g", "p", Some(ints(&[1])), Some(ints(&[1])))];
        let paths = write_reports(dir.path(), &header(), &diagnose(&clean), 10).unwrap();
        assert!(paths.errors.is_none());
        assert!(!err_path.exists());
        assert!(paths.mismatches.exists());
    }

    #[test]
    fn empty_split_has_zero_rates() {
        let d = diagnose(&[]);
        assert_eq!(d.match_rate(), 0.0);
        assert_eq!(d.error_rate(), 0.0);
        assert!(!d.errors_known);
    }
}
