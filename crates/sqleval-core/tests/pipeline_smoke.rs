use sqleval_core::engine::assemble_records;
use sqleval_core::engine::runner::{load_side, BatchEvaluator, OutcomeSource, StalePolicy};
use sqleval_core::executor::Database;
use sqleval_core::model::{Experiment, ModelType};
use sqleval_core::report::diagnostics::{diagnose, write_reports, ReportHeader};
use sqleval_core::storage::{gold_cache_path, pred_cache_path, OutcomeCache};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

fn lines(s: &[&str]) -> Vec<String> {
    s.iter().map(|x| x.to_string()).collect()
}

fn reference_db(path: &std::path::Path) {
    let conn = rusqlite::Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE city (code TEXT, name TEXT, population INTEGER);
         INSERT INTO city VALUES ('BOS', 'Boston', 650000),
                                 ('DEN', 'Denver', 715000),
                                 ('SFO', 'San Francisco', 808000);",
    )
    .unwrap();
}

#[tokio::test]
async fn gold_and_predicted_round_trip_through_records_dir() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let db_path = dir.path().join("ref.db");
    reference_db(&db_path);
    let records_dir = dir.path().join("records");

    let db = Database::new(&db_path, Some(Duration::from_secs(5)));
    let evaluator = BatchEvaluator::new(Arc::new(db), 3);

    let nl = lines(&["big cities", "all codes", "bad column"]);
    let gold = lines(&[
        "SELECT name FROM city WHERE population > 700000",
        "SELECT code FROM city",
        "SELECT name FROM city",
    ]);
    let pred = lines(&[
        "SELECT name FROM city WHERE population >= 715000",
        "SELECT code FROM city WHERE code <> 'SFO'",
        "SELECT nonexistent_col FROM city",
    ]);

    let g = evaluator.gold_outcomes(&records_dir, "dev", &gold, false).await?;
    assert_eq!(g.source, OutcomeSource::Executed);
    assert!(g.path.ends_with("ground_truth_dev.json"));

    let again = evaluator.gold_outcomes(&records_dir, "dev", &gold, false).await?;
    assert_eq!(again.source, OutcomeSource::Cache);
    assert_eq!(again.outcomes, g.outcomes);

    let exp = Experiment::new("base", ModelType::Ft);
    let p = evaluator.pred_outcomes(&records_dir, &exp, "dev", &pred).await?;
    assert!(p.outcomes[2].is_failure());

    // persisted sides load back with the same content
    let gold_path = gold_cache_path(&records_dir, "dev");
    let gold_back = load_side(&gold_path, &gold, StalePolicy::Warn)?.unwrap();
    let pred_back =
        load_side(&pred_cache_path(&records_dir, &exp, "dev"), &pred, StalePolicy::Discard)?
            .unwrap();
    assert_eq!(pred_back, p.outcomes);
    assert!(load_side(&gold_path, &gold[..2], StalePolicy::Warn).is_err());

    let cache = OutcomeCache::load(&gold_cache_path(&records_dir, "dev"))?;
    assert!(!cache.is_stale_for(&gold));
    assert!(cache.is_stale_for(&pred));

    let records = assemble_records(&nl, &gold, &pred, Some(gold_back), Some(pred_back))?;
    let diag = diagnose(&records);
    assert_eq!(diag.matches.len(), 1);
    assert_eq!(diag.mismatches.len(), 1);
    assert_eq!(diag.errors.len(), 1);

    let header = ReportHeader {
        experiment: exp,
        split: "dev".into(),
    };
    let written = write_reports(&dir.path().join("mismatches"), &header, &diag, 10)?;
    let text = std::fs::read_to_string(&written.mismatches)?;
    assert!(text.contains("Gold Records (3 rows):"));
    assert!(text.contains("('BOS',)"));
    assert!(written.errors.is_some());
    Ok(())
}

#[tokio::test]
async fn sequential_and_parallel_agree() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let db_path = dir.path().join("ref.db");
    reference_db(&db_path);

    let queries = lines(&[
        "SELECT code FROM city ORDER BY code",
        "SELECT missing FROM city",
        "",
        "SELECT count(*) FROM city",
        "DROP TABLE city",
    ]);

    let seq = BatchEvaluator::new(Arc::new(Database::new(&db_path, None)), 1)
        .execute_all(&queries)
        .await?;
    let par = BatchEvaluator::new(Arc::new(Database::new(&db_path, None)), 4)
        .execute_all(&queries)
        .await?;

    assert_eq!(seq, par);
    assert_eq!(seq[2].error(), Some("empty query"));
    assert!(seq[4].is_failure());
    assert_eq!(seq[3].records().map(|r| r.len()), Some(1));
    Ok(())
}

#[tokio::test]
async fn unreachable_database_fails_the_batch() {
    let evaluator = BatchEvaluator::new(
        Arc::new(Database::new("/no/such/ref.db", None)),
        1,
    );
    let err = evaluator
        .execute_all(&lines(&["SELECT 1"]))
        .await
        .expect_err("missing database");
    assert!(sqleval_core::errors::try_map_error(&err).is_some());
}
