use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChunkingError {
    #[error("Failed to load chunking model: {0}")]
    ModelLoad(anyhow::Error),
    #[error("Chunking model previously failed to load: {0}")]
    ModelUnavailable(String),
}
