use crate::metrics_api::MetricsSummary;
use crate::model::Experiment;
use std::fmt::Write as _;

fn pct(v: Option<f64>) -> String {
    v.map(|x| format!("{:.2}%", x * 100.0))
        .unwrap_or_else(|| "n/a".into())
}

fn score(v: Option<f64>) -> String {
    v.map(|x| format!("{:.4}", x)).unwrap_or_else(|| "n/a".into())
}

pub fn render_metrics(exp: &Experiment, split: &str, m: &MetricsSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "\n{} ({}) on {} [{} examples, {}]",
        exp.name,
        exp.model_type,
        split,
        m.total,
        m.mode.label()
    );
    let _ = writeln!(out, "  SQL EM:     {:.4}", m.sql_em);
    let _ = writeln!(out, "  Record EM:  {}", score(m.record_em));
    let _ = writeln!(out, "  Record F1:  {}", score(m.record_f1));
    let _ = writeln!(out, "  Error rate: {}", pct(m.error_rate));
    if m.gold_errors > 0 {
        let _ = writeln!(
            out,
            "  ⚠️  {} gold queries failed to execute (scored as empty results)",
            m.gold_errors
        );
    }
    out
}

pub fn print_metrics(exp: &Experiment, split: &str, m: &MetricsSummary) {
    print!("{}", render_metrics(exp, split, m));
}

/// One row per experiment, in the order given.
pub fn render_summary_table(split: &str, rows: &[(Experiment, MetricsSummary)]) -> String {
    let mut out = String::new();
    let width = rows
        .iter()
        .map(|(e, _)| e.name.len() + e.model_type.as_str().len() + 3)
        .max()
        .unwrap_or(0)
        .max("Experiment".len());

    let _ = writeln!(out, "\nSummary ({split})");
    let _ = writeln!(
        out,
        "{:<width$}  {:>8}  {:>9}  {:>9}  {:>8}",
        "Experiment", "SQL EM", "Record EM", "Record F1", "Error %"
    );
    out.push_str(&"━".repeat(width + 44));
    out.push('\n');
    for (exp, m) in rows {
        let label = format!("{} ({})", exp.name, exp.model_type);
        let _ = writeln!(
            out,
            "{:<width$}  {:>8.4}  {:>9}  {:>9}  {:>8}",
            label,
            m.sql_em,
            score(m.record_em),
            score(m.record_f1),
            pct(m.error_rate)
        );
    }
    out
}

pub fn print_summary_table(split: &str, rows: &[(Experiment, MetricsSummary)]) {
    print!("{}", render_summary_table(split, rows));
}
