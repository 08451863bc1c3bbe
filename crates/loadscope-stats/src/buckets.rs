use chrono::DateTime;

/// Floor an epoch timestamp to the start of its fixed-width bucket.
pub fn bucket_key(epoch_seconds: i64, bucket_seconds: i64) -> i64 {
    epoch_seconds.div_euclid(bucket_seconds) * bucket_seconds
}

/// Render a bucket start as `YYYY-MM-DD HH:MM:SS` (UTC), the form the
/// timeseries table is keyed and sorted by.
pub fn render_bucket_start(start_epoch: i64) -> String {
    DateTime::from_timestamp(start_epoch, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}
