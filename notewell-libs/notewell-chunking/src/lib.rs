pub mod chunker;
pub mod chunking_errors;

pub use chunker::{SemanticChunker, TextChunk};
pub use chunking_errors::ChunkingError;
