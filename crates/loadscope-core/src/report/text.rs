use crate::storage::Store;

/// Plain-text performance report for one session, read entirely from the
/// persisted aggregate tables. Mirrors the three report sections: session
/// summary, per-endpoint rollup (slowest tail first), time trend.
pub fn render_session_report(
    store: &Store,
    session_id: i64,
    bucket_seconds: i64,
) -> anyhow::Result<String> {
    let Some(session) = store.get_session(session_id)? else {
        anyhow::bail!("no session with id {}", session_id);
    };

    let mut out = String::new();
    out.push_str(&format!("Session #{}\n", session.session_id));
    let desc = session.description.as_deref().unwrap_or("");
    out.push_str(&format!(
        "Description: {}\n",
        if desc.is_empty() { "-" } else { desc }
    ));
    out.push_str(&format!(
        "Started: {} | Status: {}\n",
        session.started_at,
        session.status.as_str()
    ));
    out.push_str(&format!("Total depth: {}\n\n", session.total_depth));

    out.push_str("1. Session summary\n");
    let Some(summary) = store.fetch_session_summary(session_id)? else {
        out.push_str("   (session aggregates not computed)\n");
        return Ok(out);
    };
    out.push_str(&format!(
        "   Total requests:          {}\n",
        summary.total_requests
    ));
    out.push_str(&format!(
        "   Success rate:            {:.2}% ({}/{})\n",
        summary.success_rate * 100.0,
        summary.success_requests,
        summary.total_requests
    ));
    out.push_str(&format!(
        "   Latency avg/p95/p99 ms:  {} / {} / {}\n",
        fmt_ms(summary.latency_avg),
        fmt_ms(summary.latency_p95),
        fmt_ms(summary.latency_p99)
    ));
    out.push_str(&format!(
        "   TTFB avg/p95 ms:         {} / {}\n",
        fmt_ms(summary.ttfb_avg),
        fmt_ms(summary.ttfb_p95)
    ));
    out.push_str(&format!(
        "   Status 2xx/4xx/5xx:      {} / {} / {}\n\n",
        summary.status_2xx, summary.status_4xx, summary.status_5xx
    ));

    out.push_str("2. Endpoints\n");
    out.push_str("   endpoint  method  count  success  p95_ms  5xx\n");
    for e in store.fetch_endpoint_summaries(session_id)? {
        out.push_str(&format!(
            "   {}  {}  {}  {:.1}%  {}  {}\n",
            e.endpoint,
            e.method,
            e.count,
            e.success_rate * 100.0,
            fmt_ms(e.latency_p95),
            e.status_5xx
        ));
    }
    out.push('\n');

    out.push_str(&format!("3. Time trend (bucket {}s)\n", bucket_seconds));
    out.push_str("   bucket_start  count  success  lat_avg_ms  lat_p95_ms  5xx\n");
    for t in store.fetch_timeseries(session_id, bucket_seconds)? {
        out.push_str(&format!(
            "   {}  {}  {:.1}%  {}  {}  {}\n",
            t.bucket_start,
            t.count,
            t.success_rate * 100.0,
            fmt_ms(t.latency_avg),
            fmt_ms(t.latency_p95),
            t.status_5xx
        ));
    }

    Ok(out)
}

fn fmt_ms(v: Option<f64>) -> String {
    match v {
        Some(x) => format!("{x:.2}"),
        None => "-".into(),
    }
}
