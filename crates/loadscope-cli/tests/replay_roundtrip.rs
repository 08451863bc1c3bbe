use std::fs::File;
use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;

fn record(job_id: i64, status_code: i64, latency_ms: f64) -> serde_json::Value {
    serde_json::json!({
        "job_id": job_id,
        "worker_id": 1,
        "timestamp": "2024-01-01T10:00:00Z",
        "method": "GET",
        "endpoint": "/api/items",
        "status_code": status_code,
        "latency_ms": latency_ms,
        "ttfb_ms": null,
        "response_size_bytes": 256,
        "error_msg": null,
        "scenario_step": 1,
        "is_success": (200..300).contains(&status_code)
    })
}

#[test]
fn test_replay_then_report() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("perf.db");
    let reports = dir.path().join("reports");
    let input = dir.path().join("capture.jsonl");

    let mut f = File::create(&input).unwrap();
    writeln!(
        f,
        "{}",
        serde_json::json!([record(1, 200, 12.0), record(2, 200, 30.0)])
    )
    .unwrap();
    writeln!(f, "{}", serde_json::json!([record(2, 503, 95.0)])).unwrap();
    drop(f);

    Command::cargo_bin("loadscope")
        .unwrap()
        .args([
            "replay",
            "--input",
            input.to_str().unwrap(),
            "--db",
            db.to_str().unwrap(),
            "--description",
            "capture smoke",
            "--depth",
            "1",
            "--timeout-seconds",
            "0.3",
            "--reports-dir",
            reports.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("\"event\": \"analysis_done\"")
                .and(predicate::str::contains("\"ok\": true")),
        );

    Command::cargo_bin("loadscope")
        .unwrap()
        .args([
            "aggregate",
            "--db",
            db.to_str().unwrap(),
            "--session",
            "1",
            "--bucket-seconds",
            "10",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("aggregated 1 session"));

    Command::cargo_bin("loadscope")
        .unwrap()
        .args([
            "report",
            "--db",
            db.to_str().unwrap(),
            "--session",
            "1",
            "--stdout",
        ])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Session #1")
                .and(predicate::str::contains("Total requests:"))
                .and(predicate::str::contains("/api/items")),
        );
}
