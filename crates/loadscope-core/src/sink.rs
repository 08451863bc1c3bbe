use crate::errors::SinkError;
use crate::model::RawResult;
use crate::storage::Store;

/// Validates measurement records at the boundary and appends them to
/// durable storage. No deduplication: a duplicate delivery yields
/// duplicate rows, which at-least-once consumers have to live with.
pub struct RawResultSink<'a> {
    store: &'a Store,
}

impl<'a> RawResultSink<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn ingest(&self, record: &serde_json::Value) -> Result<RawResult, SinkError> {
        let r = RawResult::from_value(record)?;
        self.store.insert_raw_result(&r)?;
        Ok(r)
    }

    /// Validate every record of a delivery first, then persist them all.
    /// A batch with any malformed member is rejected before a single row
    /// is written.
    pub fn ingest_batch(&self, records: &[serde_json::Value]) -> Result<Vec<RawResult>, SinkError> {
        let parsed = records
            .iter()
            .map(RawResult::from_value)
            .collect::<Result<Vec<_>, _>>()?;
        self.store.insert_raw_results(&parsed)?;
        Ok(parsed)
    }
}
