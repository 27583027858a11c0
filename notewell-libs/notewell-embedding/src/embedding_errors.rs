use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum EmbeddingError {
    #[error("Request failed: {0}")]
    RequestFailed(String),
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),
    #[error("Invalid model architecture")]
    InvalidModelArchitecture,
    #[error("Unimplemented model dimensions: {0}")]
    UnimplementedModelDimensions(String),
    #[error("Failed embedding generation: {0}")]
    FailedEmbeddingGeneration(String),
}

impl From<reqwest::Error> for EmbeddingError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() || error.is_connect() {
            EmbeddingError::ProviderUnavailable(error.to_string())
        } else {
            EmbeddingError::RequestFailed(error.to_string())
        }
    }
}
