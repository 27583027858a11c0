use thiserror::Error;

#[derive(Error, Debug)]
pub enum SqliteManagerError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),
    #[error("Connection pool error: {0}")]
    PoolError(#[from] r2d2::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Note not found: {0}")]
    NoteNotFound(String),
    #[error("Rating not found: {0}")]
    RatingNotFound(String),
    #[error("Request not found: {0}")]
    RequestNotFound(String),
    #[error("Monitored channel not found: {0}")]
    MonitoredChannelNotFound(String),
    #[error("Channel {0} is already monitored")]
    ChannelAlreadyMonitored(String),
    #[error("Batch job not found: {0}")]
    BatchJobNotFound(String),
    #[error("Invalid batch job transition from {from} to {to}")]
    InvalidJobTransition { from: String, to: String },
    #[error("Scan not found: {0}")]
    ScanNotFound(String),
    #[error("Profile not found: {0}")]
    ProfileNotFound(String),
    #[error("Fact-check item not found: {0}")]
    FactCheckItemNotFound(String),
    #[error("Invalid status value: {0}")]
    InvalidStatusValue(String),
    #[error("Unsupported embedding length: {0}")]
    UnsupportedEmbeddingLength(usize),
    #[error("Error: {0}")]
    SomeError(String),
}

impl From<&str> for SqliteManagerError {
    fn from(err: &str) -> SqliteManagerError {
        SqliteManagerError::SomeError(err.to_string())
    }
}
