use super::exit_codes;
use super::resolve_config;
use crate::cli::args::{GlobalArgs, StatsArgs};
use serde::Serialize;
use sqleval_core::dataset::{compute_stats, Split, SplitStats, WhitespaceTokenizer};

#[derive(Serialize)]
struct StatsRow {
    split: String,
    raw: SplitStats,
    prefixed: SplitStats,
}

pub fn run(g: &GlobalArgs, args: StatsArgs) -> anyhow::Result<i32> {
    let cfg = resolve_config(g)?;
    let tok = WhitespaceTokenizer;

    let mut rows = Vec::new();
    for name in &args.splits {
        let split = Split::load(&cfg.paths.data_dir, name)?;
        let sql = split.gold_sql()?;
        rows.push(StatsRow {
            split: name.clone(),
            raw: compute_stats(&split.nl, sql, &tok, false),
            prefixed: compute_stats(&split.nl, sql, &tok, true),
        });
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(exit_codes::OK);
    }

    for r in &rows {
        println!("\n{}", r.split);
        println!("{:<28} {:>10} {:>10}", "", "raw", "prefixed");
        println!("{:<28} {:>10} {:>10}", "examples", r.raw.examples, r.prefixed.examples);
        println!(
            "{:<28} {:>10.2} {:>10.2}",
            "mean NL length", r.raw.mean_nl_length, r.prefixed.mean_nl_length
        );
        println!(
            "{:<28} {:>10.2} {:>10.2}",
            "mean SQL length", r.raw.mean_sql_length, r.prefixed.mean_sql_length
        );
        println!(
            "{:<28} {:>10} {:>10}",
            "NL vocabulary", r.raw.nl_vocab_size, r.prefixed.nl_vocab_size
        );
        println!(
            "{:<28} {:>10} {:>10}",
            "SQL vocabulary", r.raw.sql_vocab_size, r.prefixed.sql_vocab_size
        );
    }
    Ok(exit_codes::OK)
}
