use rewrite_bench_core::db::fake::FakeDatabase;
use rewrite_bench_core::engine::{Evaluator, RunAborted, RunSettings};
use rewrite_bench_core::errors::{DbError, ProviderError};
use rewrite_bench_core::model::{PlanStats, PromptMode};
use rewrite_bench_core::on_error::RewriteFailurePolicy;
use rewrite_bench_core::providers::llm::fake::FakeClient;
use rewrite_bench_core::retry::RetryPolicy;
use rewrite_bench_core::rewrite::RewriteInvoker;
use rewrite_bench_core::storage::{self, csv_sink::CsvSink};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

fn settings(on_failure: RewriteFailurePolicy) -> RunSettings {
    RunSettings {
        run_id: "e2e".into(),
        prompt_mode: PromptMode::FewShot,
        schema_hint: "t(id)".into(),
        explain: true,
        on_failure,
        db_retry: RetryPolicy {
            max_attempts: 3,
            delay_ms: 0,
            backoff: 1.0,
        },
    }
}

fn evaluator(db: FakeDatabase, client: FakeClient, on_failure: RewriteFailurePolicy) -> Evaluator {
    let invoker = RewriteInvoker::new(Arc::new(client), RetryPolicy::no_retry());
    Evaluator::new(Arc::new(db), invoker, settings(on_failure))
}

fn rejected() -> Result<String, ProviderError> {
    Err(ProviderError::Status {
        status: 400,
        body: "bad request".into(),
    })
}

fn plan(blocks: i64) -> PlanStats {
    PlanStats {
        planning_ms: Some(0.1),
        execution_ms: Some(0.5),
        shared_hit_blocks: Some(blocks),
    }
}

#[tokio::test]
async fn test_identical_rewrite_is_recorded_as_equivalent() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("out.csv");
    let db = FakeDatabase::new("tpch")
        .with_delay(Duration::from_millis(20))
        .with_rows("SELECT 1", vec![vec![json!(1)]])
        .with_plan("SELECT 1", plan(4));
    let ev = evaluator(db, FakeClient::echo(), RewriteFailurePolicy::Skip);

    let mut sink = CsvSink::open(&path)?;
    let summary = ev.run_corpus(&["SELECT 1".to_string()], &mut sink).await?;
    drop(sink);

    assert_eq!(summary.recorded, 1);
    assert_eq!(summary.same_signature, 1);

    let records = storage::load_records(&path)?;
    assert_eq!(records.len(), 1);
    let r = &records[0];
    assert_eq!(r.query_id, Some(1));
    assert_eq!(r.same_rowcount, Some(true));
    assert_eq!(r.same_signature, Some(true));
    assert_eq!(r.buffers_ratio, Some(1.0));
    // Both sides sleep the same amount.
    let speedup = r.speedup.unwrap();
    assert!((0.5..2.0).contains(&speedup), "speedup {}", speedup);

    let text = std::fs::read_to_string(&path)?;
    assert!(text.contains(",tpch,fake-model,few-shot,1,"));
    Ok(())
}

#[tokio::test]
async fn test_failing_rewritten_query_still_produces_a_record() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("out.csv");
    let db = FakeDatabase::new("db")
        .with_rows("SELECT a FROM t", vec![vec![json!(1)], vec![json!(2)]])
        .with_error(
            "SELECT b FROM t",
            DbError::Execution("column b does not exist".into()),
        )
        .with_rows("SELECT c FROM t", vec![vec![json!(3)]]);
    // Query 2 falls through to the echoing rewrite.
    let client = FakeClient::scripted(vec![Ok("```sql\nSELECT b FROM t\n```".into())]);
    let ev = evaluator(db, client, RewriteFailurePolicy::Skip);

    let queries = vec!["SELECT a FROM t".to_string(), "SELECT c FROM t".to_string()];
    let mut sink = CsvSink::open(&path)?;
    let summary = ev.run_corpus(&queries, &mut sink).await?;
    drop(sink);

    assert_eq!(summary.recorded, 2);
    assert_eq!(summary.execution_failures, 1);
    assert!(!summary.aborted);

    let records = storage::load_records(&path)?;
    assert_eq!(records.len(), 2);
    let failed = &records[0];
    assert_eq!(failed.query_id, Some(1));
    assert_eq!(failed.speedup, None);
    assert_eq!(failed.same_rowcount, Some(false));
    assert_eq!(failed.same_signature, Some(false));

    let next = &records[1];
    assert_eq!(next.query_id, Some(2));
    assert!(next.speedup.is_some());
    assert_eq!(next.same_signature, Some(true));

    let mut reader = csv::Reader::from_path(&path)?;
    let row = reader.records().next().unwrap()?;
    assert!(!row[5].is_empty(), "original_ms recorded");
    assert!(row[9].is_empty(), "rewritten_ms left empty");
    assert_eq!(&row[22], "SELECT b FROM t");
    Ok(())
}

#[tokio::test]
async fn test_transient_connection_errors_are_retried() -> anyhow::Result<()> {
    let db = FakeDatabase::new("db")
        .with_rows("SELECT 1", vec![vec![json!(1)]])
        .with_transient_failures("SELECT 1", 2);
    let ev = evaluator(db, FakeClient::echo(), RewriteFailurePolicy::Skip);

    let report = ev.evaluate(1, "SELECT 1").await;
    let rec = report.record().expect("record");
    assert!(rec.original_ms.is_some());
    assert!(rec.rewritten_ms.is_some());
    assert!(report.failures.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_skip_policy_leaves_a_gap_in_query_ids() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("out.csv");
    let db = FakeDatabase::new("db")
        .with_rows("SELECT 1", vec![vec![json!(1)]])
        .with_rows("SELECT 2", vec![vec![json!(2)]])
        .with_rows("SELECT 3", vec![vec![json!(3)]]);
    let client = FakeClient::scripted(vec![Ok("SELECT 1".into()), rejected()]);
    let ev = evaluator(db, client, RewriteFailurePolicy::Skip);

    let queries: Vec<String> = ["SELECT 1", "SELECT 2", "SELECT 3"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let mut sink = CsvSink::open(&path)?;
    let summary = ev.run_corpus(&queries, &mut sink).await?;
    drop(sink);

    assert_eq!(summary.recorded, 2);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.rewrite_failures, 1);

    let ids: Vec<_> = storage::load_records(&path)?
        .iter()
        .map(|r| r.query_id)
        .collect();
    assert_eq!(ids, vec![Some(1), Some(3)]);
    Ok(())
}

#[tokio::test]
async fn test_record_empty_policy_writes_an_empty_rewrite() -> anyhow::Result<()> {
    let db = FakeDatabase::new("db").with_rows("SELECT 1", vec![vec![json!(1)]]);
    let ev = evaluator(
        db,
        FakeClient::scripted(vec![rejected()]),
        RewriteFailurePolicy::RecordEmpty,
    );

    let report = ev.evaluate(1, "SELECT 1").await;
    let rec = report.record().expect("record");
    assert_eq!(rec.rewritten_sql, "");
    assert_eq!(rec.rewritten_ms, None);
    assert!(rec.original_ms.is_some());
    assert!(!rec.same_rowcount);
    Ok(())
}

#[tokio::test]
async fn test_abort_policy_stops_the_run_and_keeps_earlier_records() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("out.db");
    let db = FakeDatabase::new("db")
        .with_rows("SELECT 1", vec![vec![json!(1)]])
        .with_rows("SELECT 2", vec![vec![json!(2)]])
        .with_rows("SELECT 3", vec![vec![json!(3)]]);
    let client = FakeClient::scripted(vec![Ok("SELECT 1".into()), rejected()]);
    let ev = evaluator(db, client, RewriteFailurePolicy::Abort);

    let queries: Vec<String> = ["SELECT 1", "SELECT 2", "SELECT 3"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let mut sink = storage::open_sink(&path)?;
    let err = ev
        .run_corpus(&queries, sink.as_mut())
        .await
        .expect_err("run must abort");
    drop(sink);

    let aborted = err.downcast_ref::<RunAborted>().expect("RunAborted");
    assert_eq!(aborted.query_id, 2);
    assert!(aborted.summary.aborted);
    assert_eq!(aborted.summary.recorded, 1);

    let records = storage::load_records(&path)?;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].query_id, Some(1));
    Ok(())
}
