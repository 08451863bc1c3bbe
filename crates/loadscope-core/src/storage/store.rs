use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection};

use crate::errors::StorageError;
use crate::model::{
    parse_timestamp, EndpointSummaryRow, RawResult, Session, SessionStatus, SessionSummaryRow,
    TimeseriesRow,
};

#[derive(Clone)]
pub struct Store {
    pub conn: Arc<Mutex<Connection>>,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let conn = Connection::open(path)?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn init_schema(&self) -> Result<(), StorageError> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(crate::storage::schema::DDL)?;
        Ok(())
    }

    pub fn insert_raw_result(&self, r: &RawResult) -> Result<(), StorageError> {
        let conn = self.conn.lock().unwrap();
        insert_raw(&conn, r)
    }

    /// Append a whole delivery in one transaction, so a batch is either
    /// fully durable or not there at all when it gets acknowledged.
    pub fn insert_raw_results(&self, results: &[RawResult]) -> Result<(), StorageError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        for r in results {
            insert_raw(&tx, r)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Create the session row plus one depth row per job in one
    /// transaction and return the new session id.
    pub fn create_session_with_jobs(
        &self,
        description: Option<&str>,
        total_depth: u32,
        jobs: &BTreeMap<i64, u32>,
        status: SessionStatus,
        started_at: Option<&str>,
    ) -> Result<i64, StorageError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let started = started_at
            .map(str::to_string)
            .unwrap_or_else(|| chrono::Utc::now().to_rfc3339());
        tx.execute(
            "INSERT INTO analysis_sessions(started_at, description, total_depth, status)
             VALUES (?1, ?2, ?3, ?4)",
            params![started, description, total_depth, status.as_str()],
        )?;
        let session_id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                "INSERT INTO analysis_session_jobs(session_id, job_id, depth)
                 VALUES (?1, ?2, ?3)",
            )?;
            for (job_id, depth) in jobs {
                stmt.execute(params![session_id, job_id, depth])?;
            }
        }

        tx.commit()?;
        Ok(session_id)
    }

    pub fn get_session(&self, session_id: i64) -> Result<Option<Session>, StorageError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT session_id, started_at, description, total_depth, status
             FROM analysis_sessions WHERE session_id = ?1",
        )?;
        let mut rows = stmt.query(params![session_id])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Session {
                session_id: row.get(0)?,
                started_at: row.get(1)?,
                description: row.get(2)?,
                total_depth: row.get(3)?,
                status: SessionStatus::parse(&row.get::<_, String>(4)?),
            }))
        } else {
            Ok(None)
        }
    }

    pub fn get_session_job_depths(
        &self,
        session_id: i64,
    ) -> Result<BTreeMap<i64, u32>, StorageError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT job_id, depth FROM analysis_session_jobs
             WHERE session_id = ?1 ORDER BY job_id ASC",
        )?;
        let rows = stmt.query_map(params![session_id], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let mut out = BTreeMap::new();
        for r in rows {
            let (job_id, depth) = r?;
            out.insert(job_id, depth);
        }
        Ok(out)
    }

    pub fn session_ids(&self) -> Result<Vec<i64>, StorageError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT session_id FROM analysis_sessions ORDER BY session_id ASC")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    pub fn raw_results_for_session(
        &self,
        session_id: i64,
    ) -> Result<Vec<RawResult>, StorageError> {
        let conn = self.conn.lock().unwrap();
        load_raw_for_session(&conn, session_id)
    }

    pub fn fetch_session_summary(
        &self,
        session_id: i64,
    ) -> Result<Option<SessionSummaryRow>, StorageError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT session_id, bucket_seconds, total_requests, success_requests, success_rate,
                    status_2xx, status_4xx, status_5xx,
                    latency_avg, latency_p50, latency_p90, latency_p95, latency_p99,
                    ttfb_avg, ttfb_p95
             FROM session_summary WHERE session_id = ?1",
        )?;
        let mut rows = stmt.query(params![session_id])?;
        if let Some(row) = rows.next()? {
            Ok(Some(SessionSummaryRow {
                session_id: row.get(0)?,
                bucket_seconds: row.get(1)?,
                total_requests: row.get(2)?,
                success_requests: row.get(3)?,
                success_rate: row.get(4)?,
                status_2xx: row.get(5)?,
                status_4xx: row.get(6)?,
                status_5xx: row.get(7)?,
                latency_avg: row.get(8)?,
                latency_p50: row.get(9)?,
                latency_p90: row.get(10)?,
                latency_p95: row.get(11)?,
                latency_p99: row.get(12)?,
                ttfb_avg: row.get(13)?,
                ttfb_p95: row.get(14)?,
            }))
        } else {
            Ok(None)
        }
    }

    /// Per-endpoint rollups, slowest tail first (how the report lists them).
    pub fn fetch_endpoint_summaries(
        &self,
        session_id: i64,
    ) -> Result<Vec<EndpointSummaryRow>, StorageError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT session_id, endpoint, method, count, success_rate, status_5xx,
                    latency_avg, latency_p95, latency_p99
             FROM session_endpoint_summary
             WHERE session_id = ?1
             ORDER BY latency_p95 DESC",
        )?;
        let rows = stmt.query_map(params![session_id], |row| {
            Ok(EndpointSummaryRow {
                session_id: row.get(0)?,
                endpoint: row.get(1)?,
                method: row.get(2)?,
                count: row.get(3)?,
                success_rate: row.get(4)?,
                status_5xx: row.get(5)?,
                latency_avg: row.get(6)?,
                latency_p95: row.get(7)?,
                latency_p99: row.get(8)?,
            })
        })?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    pub fn fetch_timeseries(
        &self,
        session_id: i64,
        bucket_seconds: i64,
    ) -> Result<Vec<TimeseriesRow>, StorageError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT session_id, bucket_seconds, bucket_start, count, success_rate, status_5xx,
                    latency_avg, latency_p95
             FROM session_timeseries_summary
             WHERE session_id = ?1 AND bucket_seconds = ?2
             ORDER BY bucket_start ASC",
        )?;
        let rows = stmt.query_map(params![session_id, bucket_seconds], |row| {
            Ok(TimeseriesRow {
                session_id: row.get(0)?,
                bucket_seconds: row.get(1)?,
                bucket_start: row.get(2)?,
                count: row.get(3)?,
                success_rate: row.get(4)?,
                status_5xx: row.get(5)?,
                latency_avg: row.get(6)?,
                latency_p95: row.get(7)?,
            })
        })?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }
}

fn insert_raw(conn: &Connection, r: &RawResult) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO request_results (
            job_id, worker_id, timestamp,
            method, endpoint, status_code,
            latency_ms, ttfb_ms,
            response_size_bytes, error_msg,
            scenario_step, is_success
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            r.job_id,
            r.worker_id,
            r.timestamp.to_rfc3339(),
            r.method,
            r.endpoint,
            r.status_code,
            r.latency_ms,
            r.ttfb_ms,
            r.response_size_bytes,
            r.error_msg,
            r.scenario_step,
            r.is_success,
        ],
    )?;
    Ok(())
}

/// Every raw measurement reachable through the session's job ids.
pub(crate) fn load_raw_for_session(
    conn: &Connection,
    session_id: i64,
) -> Result<Vec<RawResult>, StorageError> {
    let mut stmt = conn.prepare(
        "SELECT rr.job_id, rr.worker_id, rr.timestamp, rr.method, rr.endpoint, rr.status_code,
                rr.latency_ms, rr.ttfb_ms, rr.response_size_bytes, rr.error_msg,
                rr.scenario_step, rr.is_success
         FROM request_results rr
         JOIN analysis_session_jobs sj ON sj.job_id = rr.job_id
         WHERE sj.session_id = ?1",
    )?;
    let rows = stmt.query_map(params![session_id], |row| {
        let ts: String = row.get(2)?;
        let timestamp = parse_timestamp(&ts).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                format!("unparseable timestamp: {ts:?}").into(),
            )
        })?;
        Ok(RawResult {
            job_id: row.get(0)?,
            worker_id: row.get(1)?,
            timestamp,
            method: row.get(3)?,
            endpoint: row.get(4)?,
            status_code: row.get(5)?,
            latency_ms: row.get(6)?,
            ttfb_ms: row.get(7)?,
            response_size_bytes: row.get(8)?,
            error_msg: row.get(9)?,
            scenario_step: row.get(10)?,
            is_success: row.get::<_, i64>(11)? != 0,
        })
    })?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}
