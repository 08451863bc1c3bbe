use std::collections::BTreeMap;

use rusqlite::{params, Transaction};

use loadscope_stats::{
    bucket_key, mean, percentile, render_bucket_start, success_rate, StatusPartition,
};

use crate::errors::StorageError;
use crate::model::RawResult;
use crate::storage::store::load_raw_for_session;
use crate::storage::Store;

/// Recompute and replace the session, per-endpoint and timeseries
/// aggregates for the given sessions (every session when `session_ids` is
/// `None` or empty). Returns the ids visited.
///
/// Aggregation is a pure function of the reachable raw rows and the bucket
/// width: re-running it against unchanged data stores identical rows.
pub fn compute_session_aggregates(
    store: &Store,
    session_ids: Option<&[i64]>,
    bucket_seconds: i64,
) -> Result<Vec<i64>, StorageError> {
    let sids = match session_ids {
        Some(ids) if !ids.is_empty() => ids.to_vec(),
        _ => store.session_ids()?,
    };
    for &sid in &sids {
        aggregate_one(store, sid, bucket_seconds)?;
    }
    Ok(sids)
}

/// One session, one transaction: a storage failure mid-upsert rolls the
/// whole recomputation back and leaves other sessions untouched.
fn aggregate_one(store: &Store, session_id: i64, bucket_seconds: i64) -> Result<(), StorageError> {
    let mut conn = store.conn.lock().unwrap();
    let rows = load_raw_for_session(&conn, session_id)?;
    if rows.is_empty() {
        // nothing to aggregate yet; existing aggregates stay as they are
        tracing::debug!(session_id, "no raw data for session, skipping");
        return Ok(());
    }

    let tx = conn.transaction()?;
    clear_aggregates(&tx, session_id)?;
    write_summary(&tx, session_id, bucket_seconds, &rows)?;
    write_endpoint_summaries(&tx, session_id, &rows)?;
    write_timeseries(&tx, session_id, bucket_seconds, &rows)?;
    tx.commit()?;

    tracing::info!(session_id, rows = rows.len(), "session aggregates recomputed");
    Ok(())
}

/// Replace-not-append: every aggregate row of the session goes, whatever
/// bucket width it was computed with, so a recomputation can never leave
/// stale rows behind.
fn clear_aggregates(tx: &Transaction, session_id: i64) -> Result<(), StorageError> {
    tx.execute(
        "DELETE FROM session_summary WHERE session_id = ?1",
        params![session_id],
    )?;
    tx.execute(
        "DELETE FROM session_endpoint_summary WHERE session_id = ?1",
        params![session_id],
    )?;
    tx.execute(
        "DELETE FROM session_timeseries_summary WHERE session_id = ?1",
        params![session_id],
    )?;
    Ok(())
}

fn write_summary(
    tx: &Transaction,
    session_id: i64,
    bucket_seconds: i64,
    rows: &[RawResult],
) -> Result<(), StorageError> {
    let total = rows.len() as i64;
    let success = rows.iter().filter(|r| r.is_success).count() as i64;
    let part = StatusPartition::count(rows.iter().map(|r| r.status_code));
    let lat = sorted_samples(rows.iter(), |r| r.latency_ms);
    let ttfb = sorted_samples(rows.iter(), |r| r.ttfb_ms);

    tx.execute(
        "INSERT INTO session_summary(
            session_id, bucket_seconds,
            total_requests, success_requests, success_rate,
            status_2xx, status_4xx, status_5xx,
            latency_avg, latency_p50, latency_p90, latency_p95, latency_p99,
            ttfb_avg, ttfb_p95
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
         ON CONFLICT(session_id) DO UPDATE SET
            bucket_seconds = excluded.bucket_seconds,
            total_requests = excluded.total_requests,
            success_requests = excluded.success_requests,
            success_rate = excluded.success_rate,
            status_2xx = excluded.status_2xx,
            status_4xx = excluded.status_4xx,
            status_5xx = excluded.status_5xx,
            latency_avg = excluded.latency_avg,
            latency_p50 = excluded.latency_p50,
            latency_p90 = excluded.latency_p90,
            latency_p95 = excluded.latency_p95,
            latency_p99 = excluded.latency_p99,
            ttfb_avg = excluded.ttfb_avg,
            ttfb_p95 = excluded.ttfb_p95",
        params![
            session_id,
            bucket_seconds,
            total,
            success,
            success_rate(success, total),
            part.status_2xx,
            part.status_4xx,
            part.status_5xx,
            mean(&lat),
            percentile(&lat, 50.0),
            percentile(&lat, 90.0),
            percentile(&lat, 95.0),
            percentile(&lat, 99.0),
            mean(&ttfb),
            percentile(&ttfb, 95.0),
        ],
    )?;
    Ok(())
}

fn write_endpoint_summaries(
    tx: &Transaction,
    session_id: i64,
    rows: &[RawResult],
) -> Result<(), StorageError> {
    let mut by_endpoint: BTreeMap<(&str, &str), Vec<&RawResult>> = BTreeMap::new();
    for r in rows {
        by_endpoint
            .entry((r.endpoint.as_str(), r.method.as_str()))
            .or_default()
            .push(r);
    }

    let mut stmt = tx.prepare(
        "INSERT INTO session_endpoint_summary(
            session_id, endpoint, method,
            count, success_rate, status_5xx,
            latency_avg, latency_p95, latency_p99
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(session_id, endpoint, method) DO UPDATE SET
            count = excluded.count,
            success_rate = excluded.success_rate,
            status_5xx = excluded.status_5xx,
            latency_avg = excluded.latency_avg,
            latency_p95 = excluded.latency_p95,
            latency_p99 = excluded.latency_p99",
    )?;
    for ((endpoint, method), grp) in &by_endpoint {
        let count = grp.len() as i64;
        let success = grp.iter().filter(|r| r.is_success).count() as i64;
        let status_5xx = grp
            .iter()
            .filter(|r| (500..600).contains(&r.status_code))
            .count() as i64;
        let lat = sorted_samples(grp.iter().copied(), |r| r.latency_ms);
        stmt.execute(params![
            session_id,
            endpoint,
            method,
            count,
            success_rate(success, count),
            status_5xx,
            mean(&lat),
            percentile(&lat, 95.0),
            percentile(&lat, 99.0),
        ])?;
    }
    Ok(())
}

fn write_timeseries(
    tx: &Transaction,
    session_id: i64,
    bucket_seconds: i64,
    rows: &[RawResult],
) -> Result<(), StorageError> {
    // all bucket statistics come out of the one pass over the loaded rows
    let mut by_bucket: BTreeMap<i64, Vec<&RawResult>> = BTreeMap::new();
    for r in rows {
        by_bucket
            .entry(bucket_key(r.timestamp.timestamp(), bucket_seconds))
            .or_default()
            .push(r);
    }

    let mut stmt = tx.prepare(
        "INSERT INTO session_timeseries_summary(
            session_id, bucket_seconds, bucket_start,
            count, success_rate, status_5xx,
            latency_avg, latency_p95
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(session_id, bucket_seconds, bucket_start) DO UPDATE SET
            count = excluded.count,
            success_rate = excluded.success_rate,
            status_5xx = excluded.status_5xx,
            latency_avg = excluded.latency_avg,
            latency_p95 = excluded.latency_p95",
    )?;
    for (start, grp) in &by_bucket {
        let count = grp.len() as i64;
        let success = grp.iter().filter(|r| r.is_success).count() as i64;
        let status_5xx = grp
            .iter()
            .filter(|r| (500..600).contains(&r.status_code))
            .count() as i64;
        let lat = sorted_samples(grp.iter().copied(), |r| r.latency_ms);
        stmt.execute(params![
            session_id,
            bucket_seconds,
            render_bucket_start(*start),
            count,
            success_rate(success, count),
            status_5xx,
            mean(&lat),
            percentile(&lat, 95.0),
        ])?;
    }
    Ok(())
}

fn sorted_samples<'a>(
    rows: impl IntoIterator<Item = &'a RawResult>,
    pick: impl Fn(&RawResult) -> Option<f64>,
) -> Vec<f64> {
    let mut vals: Vec<f64> = rows.into_iter().filter_map(|r| pick(r)).collect();
    vals.sort_by(f64::total_cmp);
    vals
}
