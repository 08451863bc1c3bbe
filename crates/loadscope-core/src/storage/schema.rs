/// Schema for raw measurements, sessions and their derived aggregates.
///
/// `request_results` is append-only; the three summary tables are derived
/// data, safe to delete and regenerate for a session at any time.
pub const DDL: &str = "
CREATE TABLE IF NOT EXISTS request_results (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id INTEGER NOT NULL,
    worker_id INTEGER NOT NULL,
    timestamp TEXT NOT NULL,
    method TEXT NOT NULL,
    endpoint TEXT NOT NULL,
    status_code INTEGER NOT NULL,
    latency_ms REAL,
    ttfb_ms REAL,
    response_size_bytes INTEGER,
    error_msg TEXT,
    scenario_step INTEGER,
    is_success INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_request_results_job ON request_results(job_id);

CREATE TABLE IF NOT EXISTS analysis_sessions (
    session_id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    description TEXT,
    total_depth INTEGER NOT NULL,
    status TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS analysis_session_jobs (
    session_id INTEGER NOT NULL REFERENCES analysis_sessions(session_id),
    job_id INTEGER NOT NULL,
    depth INTEGER NOT NULL,
    PRIMARY KEY (session_id, job_id)
);

CREATE TABLE IF NOT EXISTS session_summary (
    session_id INTEGER PRIMARY KEY,
    bucket_seconds INTEGER NOT NULL,
    total_requests INTEGER NOT NULL,
    success_requests INTEGER NOT NULL,
    success_rate REAL NOT NULL,
    status_2xx INTEGER NOT NULL,
    status_4xx INTEGER NOT NULL,
    status_5xx INTEGER NOT NULL,
    latency_avg REAL,
    latency_p50 REAL,
    latency_p90 REAL,
    latency_p95 REAL,
    latency_p99 REAL,
    ttfb_avg REAL,
    ttfb_p95 REAL
);

CREATE TABLE IF NOT EXISTS session_endpoint_summary (
    session_id INTEGER NOT NULL,
    endpoint TEXT NOT NULL,
    method TEXT NOT NULL,
    count INTEGER NOT NULL,
    success_rate REAL NOT NULL,
    status_5xx INTEGER NOT NULL,
    latency_avg REAL,
    latency_p95 REAL,
    latency_p99 REAL,
    PRIMARY KEY (session_id, endpoint, method)
);

CREATE TABLE IF NOT EXISTS session_timeseries_summary (
    session_id INTEGER NOT NULL,
    bucket_seconds INTEGER NOT NULL,
    bucket_start TEXT NOT NULL,
    count INTEGER NOT NULL,
    success_rate REAL NOT NULL,
    status_5xx INTEGER NOT NULL,
    latency_avg REAL,
    latency_p95 REAL,
    PRIMARY KEY (session_id, bucket_seconds, bucket_start)
);
";
