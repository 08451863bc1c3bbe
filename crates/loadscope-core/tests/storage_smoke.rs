use std::collections::BTreeMap;

use chrono::{TimeZone, Utc};
use loadscope_core::errors::MaterializeError;
use loadscope_core::materialize::SessionMaterializer;
use loadscope_core::model::{RawResult, SessionStatus};
use loadscope_core::sink::RawResultSink;
use loadscope_core::storage::Store;
use tempfile::tempdir;

fn record(job_id: i64, status_code: i64, latency_ms: f64) -> RawResult {
    RawResult {
        job_id,
        worker_id: 1,
        timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap(),
        method: "GET".into(),
        endpoint: "/api/items".into(),
        status_code,
        latency_ms: Some(latency_ms),
        ttfb_ms: None,
        response_size_bytes: Some(128),
        error_msg: None,
        scenario_step: Some(1),
        is_success: (200..300).contains(&status_code),
    }
}

#[test]
fn test_session_lifecycle() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let store = Store::open(&dir.path().join("perf.db"))?;
    store.init_schema()?;
    // schema init is idempotent
    store.init_schema()?;

    // single-record sink path goes through boundary validation
    let sink = RawResultSink::new(&store);
    sink.ingest(&serde_json::to_value(record(7, 200, 12.0))?)?;

    // batched path is transactional
    store.insert_raw_results(&[record(7, 200, 15.0), record(8, 503, 90.0)])?;

    let mut jobs = BTreeMap::new();
    jobs.insert(7_i64, 2_u32);
    jobs.insert(8, 1);
    let materializer = SessionMaterializer::new(&store);
    let session_id = materializer.materialize(Some("smoke"), 2, &jobs, SessionStatus::Done)?;

    let session = store.get_session(session_id)?.unwrap();
    assert_eq!(session.description.as_deref(), Some("smoke"));
    assert_eq!(session.total_depth, 2);
    assert_eq!(session.status, SessionStatus::Done);

    assert_eq!(store.get_session_job_depths(session_id)?, jobs);
    assert_eq!(store.raw_results_for_session(session_id)?.len(), 3);
    Ok(())
}

#[test]
fn test_empty_mapping_never_creates_a_session() -> anyhow::Result<()> {
    let store = Store::memory()?;
    store.init_schema()?;

    let materializer = SessionMaterializer::new(&store);
    let err = materializer
        .materialize(Some("empty"), 3, &BTreeMap::new(), SessionStatus::Done)
        .unwrap_err();
    assert!(matches!(err, MaterializeError::EmptyMapping));
    assert!(store.session_ids()?.is_empty());
    Ok(())
}

#[test]
fn test_sink_rejects_malformed_batch_before_writing() -> anyhow::Result<()> {
    let store = Store::memory()?;
    store.init_schema()?;
    let sink = RawResultSink::new(&store);

    let good = serde_json::to_value(record(1, 200, 5.0))?;
    let mut bad = good.clone();
    bad.as_object_mut().unwrap().remove("worker_id");

    assert!(sink.ingest_batch(&[good, bad]).is_err());

    // nothing of the rejected batch may be visible
    let jobs = BTreeMap::from([(1_i64, 1_u32)]);
    let sid = store.create_session_with_jobs(None, 1, &jobs, SessionStatus::Done, None)?;
    assert!(store.raw_results_for_session(sid)?.is_empty());
    Ok(())
}
