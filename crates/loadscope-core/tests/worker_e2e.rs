use std::time::Duration;

use loadscope_core::config::WorkerConfig;
use loadscope_core::model::StartSignal;
use loadscope_core::storage::Store;
use loadscope_core::transport::memory::{self, MemoryDoneSink, MemoryHandle};
use loadscope_core::worker::AnalysisWorker;
use serde_json::json;
use tempfile::TempDir;

struct Harness {
    worker: AnalysisWorker,
    store: Store,
    start: MemoryHandle,
    raw: MemoryHandle,
    done: MemoryDoneSink,
    dir: TempDir,
}

fn harness(timeout: Duration) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(&dir.path().join("perf.db")).unwrap();
    store.init_schema().unwrap();

    let config = WorkerConfig {
        db_path: dir.path().join("perf.db"),
        reports_dir: dir.path().join("reports"),
        inactivity_timeout: timeout,
        ..WorkerConfig::default()
    };

    let (start, start_source) = memory::channel();
    let (raw, raw_source) = memory::channel();
    let done = MemoryDoneSink::new();
    let worker = AnalysisWorker::new(
        store.clone(),
        config,
        Box::new(start_source),
        Box::new(raw_source),
        Box::new(done.clone()),
    );
    Harness {
        worker,
        store,
        start,
        raw,
        done,
        dir,
    }
}

fn start_msg(description: &str, total_depth: u32) -> Vec<u8> {
    serde_json::to_vec(&StartSignal {
        description: description.into(),
        total_depth,
    })
    .unwrap()
}

fn record(job_id: i64, latency_ms: f64) -> serde_json::Value {
    json!({
        "job_id": job_id,
        "worker_id": 1,
        "timestamp": "2024-01-01T10:00:00Z",
        "method": "GET",
        "endpoint": "/api/items",
        "status_code": 200,
        "latency_ms": latency_ms,
        "ttfb_ms": null,
        "response_size_bytes": 256,
        "error_msg": null,
        "scenario_step": 1,
        "is_success": true
    })
}

fn batch(job_ids: &[i64]) -> Vec<u8> {
    let records: Vec<_> = job_ids.iter().map(|&id| record(id, 25.0)).collect();
    serde_json::to_vec(&records).unwrap()
}

#[tokio::test]
async fn test_depth_completion_with_two_jobs() -> anyhow::Result<()> {
    // long window: the session must close on depth, not on the clock
    let mut h = harness(Duration::from_secs(30));
    h.start.send(start_msg("depth run", 2));
    for ids in [[1], [2], [1], [2]] {
        h.raw.send(batch(&ids));
    }

    let event = h.worker.run_one_session().await?;
    assert!(event.ok);
    assert_eq!(event.jobs_count, Some(2));
    assert_eq!(event.total_depth, Some(2));

    let sid = event.session_id.unwrap();
    let depths = h.store.get_session_job_depths(sid)?;
    assert_eq!(depths.get(&1), Some(&2));
    assert_eq!(depths.get(&2), Some(&2));
    assert_eq!(h.raw.acked(), 4);

    // aggregates and the report artifact exist
    let summary = h.store.fetch_session_summary(sid)?.unwrap();
    assert_eq!(summary.total_requests, 4);
    let report_path = h
        .dir
        .path()
        .join("reports")
        .join(event.report_filename.unwrap());
    let written = std::fs::metadata(&report_path)?.len() as usize;
    assert_eq!(written, event.report_size_bytes.unwrap());

    assert_eq!(h.done.events().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_timeout_completion_keeps_partial_depths() -> anyhow::Result<()> {
    let mut h = harness(Duration::from_millis(300));
    h.start.send(start_msg("partial run", 3));
    h.raw.send(batch(&[1]));

    let event = h.worker.run_one_session().await?;
    assert!(event.ok);
    assert_eq!(event.jobs_count, Some(1));
    assert_eq!(event.total_depth, Some(3));

    let depths = h.store.get_session_job_depths(event.session_id.unwrap())?;
    assert_eq!(depths.get(&1), Some(&1));
    assert_eq!(depths.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_empty_timeout_publishes_failure_and_no_session() -> anyhow::Result<()> {
    let mut h = harness(Duration::from_millis(200));
    h.start.send(start_msg("silent run", 2));

    let event = h.worker.run_one_session().await?;
    assert!(!event.ok);
    assert_eq!(event.error.as_deref(), Some("No RAW data received"));
    assert!(event.session_id.is_none());
    assert!(event.report_filename.is_none());

    assert!(h.store.session_ids()?.is_empty());
    assert_eq!(h.done.events().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_malformed_batches_are_nacked_without_touching_state() -> anyhow::Result<()> {
    let mut h = harness(Duration::from_millis(400));
    h.start.send(start_msg("mixed run", 1));

    // unparseable payload, then a record missing its job id, then a good one
    h.raw.send(b"not json at all".to_vec());
    let mut missing = record(5, 10.0);
    missing.as_object_mut().unwrap().remove("job_id");
    h.raw.send(serde_json::to_vec(&[missing]).unwrap());
    h.raw.send(batch(&[5]));

    let event = h.worker.run_one_session().await?;
    assert!(event.ok);
    assert_eq!(h.raw.nacked(), 2);
    assert_eq!(h.raw.acked(), 1);

    let sid = event.session_id.unwrap();
    assert_eq!(h.store.raw_results_for_session(sid)?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_batch_counts_each_job_once() -> anyhow::Result<()> {
    let mut h = harness(Duration::from_secs(30));
    h.start.send(start_msg("dup records", 2));
    // two records for job 7 in one delivery count a single repetition
    h.raw.send(batch(&[7, 7]));
    h.raw.send(batch(&[7]));

    let event = h.worker.run_one_session().await?;
    assert!(event.ok);
    let depths = h.store.get_session_job_depths(event.session_id.unwrap())?;
    assert_eq!(depths.get(&7), Some(&2));
    assert_eq!(h.store.raw_results_for_session(event.session_id.unwrap())?.len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_leftover_batches_never_leak_into_next_session() -> anyhow::Result<()> {
    let mut h = harness(Duration::from_millis(250));
    h.start.send(start_msg("first", 1));
    // the first batch completes the session; the rest must be drained
    h.raw.send(batch(&[1]));
    h.raw.send(batch(&[1]));
    h.raw.send(batch(&[9]));

    let first = h.worker.run_one_session().await?;
    assert!(first.ok);

    h.start.send(start_msg("second", 1));
    let second = h.worker.run_one_session().await?;
    assert!(!second.ok, "drained batches must not resurrect a session");

    assert_eq!(h.store.session_ids()?.len(), 1);
    let sid = first.session_id.unwrap();
    assert_eq!(h.store.raw_results_for_session(sid)?.len(), 1);
    Ok(())
}
