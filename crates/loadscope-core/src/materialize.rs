use std::collections::BTreeMap;

use crate::errors::MaterializeError;
use crate::model::SessionStatus;
use crate::storage::Store;

/// Turns a finished job→depth mapping into one session record plus its
/// depth rows, atomically. An empty mapping never produces a session; the
/// caller is expected to surface that as a failed analysis attempt.
pub struct SessionMaterializer<'a> {
    store: &'a Store,
}

impl<'a> SessionMaterializer<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn materialize(
        &self,
        description: Option<&str>,
        total_depth: u32,
        jobs: &BTreeMap<i64, u32>,
        status: SessionStatus,
    ) -> Result<i64, MaterializeError> {
        if jobs.is_empty() {
            return Err(MaterializeError::EmptyMapping);
        }
        let session_id =
            self.store
                .create_session_with_jobs(description, total_depth, jobs, status, None)?;
        tracing::info!(session_id, jobs = jobs.len(), "session materialized");
        Ok(session_id)
    }
}
