use notewell_chunking::ChunkingError;
use notewell_embedding::embedding_errors::EmbeddingError;
use notewell_http_api::error::APIError;
use notewell_sqlite::SqliteManagerError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("A job of type {job_type} is already active: {active_job_id}")]
    ActiveJobExists { job_type: String, active_job_id: String },
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),
    #[error("Database error: {0}")]
    Database(#[from] SqliteManagerError),
    #[error("Chunking error: {0}")]
    Chunking(#[from] ChunkingError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<EmbeddingError> for NodeError {
    fn from(error: EmbeddingError) -> Self {
        match error {
            EmbeddingError::ProviderUnavailable(msg) => NodeError::ProviderUnavailable(msg),
            other => NodeError::ProviderUnavailable(other.to_string()),
        }
    }
}

impl NodeError {
    /// Maps domain errors onto the HTTP boundary.
    pub fn to_api_error(&self) -> APIError {
        match self {
            NodeError::BadRequest(msg) => APIError::bad_request(msg),
            NodeError::Validation(msg) => APIError::unprocessable(msg),
            NodeError::NotFound(what) => APIError::not_found(&format!("{} not found", what)),
            NodeError::Forbidden(msg) => APIError::forbidden(msg),
            NodeError::Unauthorized(msg) => APIError::unauthorized(msg),
            NodeError::Conflict(msg) => APIError::conflict(msg),
            NodeError::ActiveJobExists { job_type, active_job_id } => APIError::too_many_requests(&format!(
                "A job of type {} is already active: {}",
                job_type, active_job_id
            )),
            NodeError::ProviderUnavailable(msg) => APIError::bad_gateway(msg),
            NodeError::Database(SqliteManagerError::ChannelAlreadyMonitored(channel)) => {
                APIError::conflict(&format!("Channel {} is already monitored", channel))
            }
            NodeError::Database(err) => APIError::internal(&err.to_string()),
            NodeError::Chunking(err) => APIError::internal(&err.to_string()),
            NodeError::Internal(msg) => APIError::internal(msg),
        }
    }
}
