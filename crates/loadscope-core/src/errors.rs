use thiserror::Error;

/// Malformed or incomplete input at the system boundary. The offending
/// delivery is rejected without redelivery.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("malformed measurement record: {0}")]
    Record(String),
    #[error("malformed payload: {0}")]
    Payload(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure to turn a finished collection cycle into a session record.
#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("jobs depth mapping is empty, refusing to create an empty session")]
    EmptyMapping,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport channel closed")]
    Closed,
    #[error("transport failure: {0}")]
    Other(String),
}
