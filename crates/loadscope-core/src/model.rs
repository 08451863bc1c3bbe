use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::ValidationError;

/// One request measurement reported by a load-generating worker.
///
/// This is the single validation boundary: a JSON record either becomes a
/// `RawResult` here or is rejected with a [`ValidationError`]. Every wire key
/// must be present; the optional ones may carry `null`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawResult {
    pub job_id: i64,
    pub worker_id: i64,
    #[serde(deserialize_with = "de_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub method: String,
    pub endpoint: String,
    pub status_code: i64,
    #[serde(deserialize_with = "de_opt_f64")]
    pub latency_ms: Option<f64>,
    #[serde(deserialize_with = "de_opt_f64")]
    pub ttfb_ms: Option<f64>,
    #[serde(deserialize_with = "de_opt_i64")]
    pub response_size_bytes: Option<i64>,
    #[serde(deserialize_with = "de_opt_string")]
    pub error_msg: Option<String>,
    #[serde(deserialize_with = "de_opt_i64")]
    pub scenario_step: Option<i64>,
    #[serde(deserialize_with = "de_flag")]
    pub is_success: bool,
}

impl RawResult {
    pub fn from_value(value: &serde_json::Value) -> Result<Self, ValidationError> {
        Self::deserialize(value).map_err(|e| ValidationError::Record(e.to_string()))
    }
}

/// Decode one raw delivery into its measurement records: either a single
/// JSON object or an array of them.
pub fn decode_batch(body: &[u8]) -> Result<Vec<serde_json::Value>, ValidationError> {
    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| ValidationError::Payload(e.to_string()))?;
    match value {
        serde_json::Value::Array(items) => Ok(items),
        obj @ serde_json::Value::Object(_) => Ok(vec![obj]),
        other => Err(ValidationError::Payload(format!(
            "expected object or array, got {}",
            json_type_name(&other)
        ))),
    }
}

fn json_type_name(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Control message that opens a collection cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartSignal {
    #[serde(default)]
    pub description: String,
    #[serde(rename = "totalDepth")]
    pub total_depth: u32,
}

impl StartSignal {
    pub fn from_bytes(body: &[u8]) -> Result<Self, ValidationError> {
        let signal: Self =
            serde_json::from_slice(body).map_err(|e| ValidationError::Payload(e.to_string()))?;
        if signal.total_depth == 0 {
            return Err(ValidationError::Payload("totalDepth must be > 0".into()));
        }
        Ok(signal)
    }
}

/// Published once per session attempt, successful or failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoneEvent {
    pub event: String,
    pub ok: bool,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jobs_count: Option<usize>,
    #[serde(rename = "totalDepth", skip_serializing_if = "Option::is_none")]
    pub total_depth: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_size_bytes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_b64: Option<String>,
}

impl DoneEvent {
    pub fn failure(description: &str, error: &str) -> Self {
        Self {
            event: "analysis_done".into(),
            ok: false,
            description: description.to_string(),
            error: Some(error.to_string()),
            session_id: None,
            jobs_count: None,
            total_depth: None,
            report_filename: None,
            report_size_bytes: None,
            report_b64: None,
        }
    }

    pub fn success(
        description: &str,
        session_id: i64,
        jobs_count: usize,
        total_depth: u32,
        report_filename: String,
        report_bytes: &[u8],
    ) -> Self {
        Self {
            event: "analysis_done".into(),
            ok: true,
            description: description.to_string(),
            error: None,
            session_id: Some(session_id),
            jobs_count: Some(jobs_count),
            total_depth: Some(total_depth),
            report_filename: Some(report_filename),
            report_size_bytes: Some(report_bytes.len()),
            report_b64: Some(BASE64.encode(report_bytes)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Done,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Done => "DONE",
            SessionStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "FAILED" => SessionStatus::Failed,
            _ => SessionStatus::Done,
        }
    }
}

/// One completed test run, created atomically together with its job depths.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: i64,
    pub started_at: String,
    pub description: Option<String>,
    pub total_depth: u32,
    pub status: SessionStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummaryRow {
    pub session_id: i64,
    pub bucket_seconds: i64,
    pub total_requests: i64,
    pub success_requests: i64,
    pub success_rate: f64,
    pub status_2xx: i64,
    pub status_4xx: i64,
    pub status_5xx: i64,
    pub latency_avg: Option<f64>,
    pub latency_p50: Option<f64>,
    pub latency_p90: Option<f64>,
    pub latency_p95: Option<f64>,
    pub latency_p99: Option<f64>,
    pub ttfb_avg: Option<f64>,
    pub ttfb_p95: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EndpointSummaryRow {
    pub session_id: i64,
    pub endpoint: String,
    pub method: String,
    pub count: i64,
    pub success_rate: f64,
    pub status_5xx: i64,
    pub latency_avg: Option<f64>,
    pub latency_p95: Option<f64>,
    pub latency_p99: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeseriesRow {
    pub session_id: i64,
    pub bucket_seconds: i64,
    pub bucket_start: String,
    pub count: i64,
    pub success_rate: f64,
    pub status_5xx: i64,
    pub latency_avg: Option<f64>,
    pub latency_p95: Option<f64>,
}

/// Accepts RFC-3339 or a naive `YYYY-MM-DDTHH:MM:SS[.fff]` /
/// `YYYY-MM-DD HH:MM:SS` wall clock, interpreted as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    None
}

fn de_timestamp<'de, D: Deserializer<'de>>(de: D) -> Result<DateTime<Utc>, D::Error> {
    let s = String::deserialize(de)?;
    parse_timestamp(&s)
        .ok_or_else(|| serde::de::Error::custom(format!("unparseable timestamp: {s:?}")))
}

/// Boolean-like success flag: JSON bool or 0/1 integer.
fn de_flag<'de, D: Deserializer<'de>>(de: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }
    Ok(match Flag::deserialize(de)? {
        Flag::Bool(b) => b,
        Flag::Int(i) => i != 0,
    })
}

fn de_opt_f64<'de, D: Deserializer<'de>>(de: D) -> Result<Option<f64>, D::Error> {
    Option::<f64>::deserialize(de)
}

fn de_opt_i64<'de, D: Deserializer<'de>>(de: D) -> Result<Option<i64>, D::Error> {
    Option::<i64>::deserialize(de)
}

fn de_opt_string<'de, D: Deserializer<'de>>(de: D) -> Result<Option<String>, D::Error> {
    Option::<String>::deserialize(de)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_record() -> serde_json::Value {
        json!({
            "job_id": 7,
            "worker_id": 2,
            "timestamp": "2024-01-01T10:00:00Z",
            "method": "GET",
            "endpoint": "/api/items",
            "status_code": 200,
            "latency_ms": 12.5,
            "ttfb_ms": null,
            "response_size_bytes": 512,
            "error_msg": null,
            "scenario_step": 1,
            "is_success": true
        })
    }

    #[test]
    fn accepts_complete_record() {
        let r = RawResult::from_value(&full_record()).unwrap();
        assert_eq!(r.job_id, 7);
        assert_eq!(r.latency_ms, Some(12.5));
        assert_eq!(r.ttfb_ms, None);
        assert!(r.is_success);
    }

    #[test]
    fn rejects_missing_required_key() {
        let mut v = full_record();
        v.as_object_mut().unwrap().remove("latency_ms");
        let err = RawResult::from_value(&v).unwrap_err();
        assert!(err.to_string().contains("latency_ms"));
    }

    #[test]
    fn coerces_integer_success_flag() {
        let mut v = full_record();
        v["is_success"] = json!(0);
        let r = RawResult::from_value(&v).unwrap();
        assert!(!r.is_success);
        v["is_success"] = json!(1);
        assert!(RawResult::from_value(&v).unwrap().is_success);
    }

    #[test]
    fn accepts_naive_timestamp_as_utc() {
        let mut v = full_record();
        v["timestamp"] = json!("2024-01-01 10:00:00");
        let r = RawResult::from_value(&v).unwrap();
        assert_eq!(r.timestamp.timestamp(), 1_704_103_200);
    }

    #[test]
    fn batch_decodes_object_or_array() {
        let one = decode_batch(br#"{"job_id": 1}"#).unwrap();
        assert_eq!(one.len(), 1);
        let many = decode_batch(br#"[{"job_id": 1}, {"job_id": 2}]"#).unwrap();
        assert_eq!(many.len(), 2);
        assert!(decode_batch(b"42").is_err());
        assert!(decode_batch(b"not json").is_err());
    }

    #[test]
    fn start_signal_requires_positive_depth() {
        let ok = StartSignal::from_bytes(br#"{"description": "smoke", "totalDepth": 3}"#).unwrap();
        assert_eq!(ok.total_depth, 3);
        assert!(StartSignal::from_bytes(br#"{"totalDepth": 0}"#).is_err());
        assert!(StartSignal::from_bytes(br#"{"description": "x"}"#).is_err());
    }

    #[test]
    fn done_event_skips_absent_fields() {
        let failed = DoneEvent::failure("smoke", "No RAW data received");
        let v = serde_json::to_value(&failed).unwrap();
        assert_eq!(v["event"], "analysis_done");
        assert_eq!(v["ok"], false);
        assert!(v.get("session_id").is_none());

        let done = DoneEvent::success("smoke", 4, 2, 3, "report_session_4.txt".into(), b"hello");
        let v = serde_json::to_value(&done).unwrap();
        assert_eq!(v["totalDepth"], 3);
        assert_eq!(v["report_size_bytes"], 5);
        assert_eq!(v["report_b64"], "aGVsbG8=");
    }
}
