use crate::chunking_errors::ChunkingError;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tiktoken_rs::CoreBPE;
use tracing::warn;

const MODEL_LOAD_RETRIES: u32 = 3;
pub const DEFAULT_MAX_CHUNK_TOKENS: usize = 400;

/// A chunk of a longer document, with byte offsets back into the source text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextChunk {
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub chunk_index: usize,
    pub token_count: Option<usize>,
}

enum ModelState {
    Unloaded,
    Ready(Arc<CoreBPE>),
    Failed(String),
}

/// Splits fact-check bodies into token-bounded chunks at sentence boundaries.
///
/// The tokenizer model is loaded lazily on first use behind a lock, with
/// transient (I/O) load failures retried a few times before the handle is
/// poisoned. Chunks are exact substrings that partition the source text, so
/// concatenating the chunks of a document reproduces it byte for byte.
pub struct SemanticChunker {
    max_chunk_tokens: usize,
    model: Mutex<ModelState>,
}

impl Default for SemanticChunker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CHUNK_TOKENS)
    }
}

impl SemanticChunker {
    pub fn new(max_chunk_tokens: usize) -> Self {
        SemanticChunker {
            max_chunk_tokens,
            model: Mutex::new(ModelState::Unloaded),
        }
    }

    /// Returns the shared tokenizer handle, loading it on first call.
    fn model_handle(&self) -> Result<Arc<CoreBPE>, ChunkingError> {
        let mut state = self.model.lock().unwrap_or_else(|e| e.into_inner());
        match &*state {
            ModelState::Ready(bpe) => return Ok(bpe.clone()),
            ModelState::Failed(cause) => return Err(ChunkingError::ModelUnavailable(cause.clone())),
            ModelState::Unloaded => {}
        }

        let mut attempt = 0;
        loop {
            match tiktoken_rs::cl100k_base() {
                Ok(bpe) => {
                    let bpe = Arc::new(bpe);
                    *state = ModelState::Ready(bpe.clone());
                    return Ok(bpe);
                }
                Err(err) => {
                    let transient = err.chain().any(|cause| cause.is::<std::io::Error>());
                    if transient && attempt < MODEL_LOAD_RETRIES {
                        attempt += 1;
                        warn!(attempt, error = %err, "chunking model load failed, retrying");
                        std::thread::sleep(Duration::from_millis(100 * 2u64.pow(attempt)));
                        continue;
                    }
                    *state = ModelState::Failed(err.to_string());
                    return Err(ChunkingError::ModelLoad(err));
                }
            }
        }
    }

    /// Splits `text` into chunk strings. Empty input produces no chunks.
    pub fn chunk_text(&self, text: &str) -> Result<Vec<String>, ChunkingError> {
        Ok(self
            .chunk_text_with_positions(text)?
            .into_iter()
            .map(|c| c.text)
            .collect())
    }

    /// Splits `text` into chunks carrying byte positions and token counts.
    pub fn chunk_text_with_positions(&self, text: &str) -> Result<Vec<TextChunk>, ChunkingError> {
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let bpe = self.model_handle()?;

        let segments = split_segments(text);
        let mut chunks: Vec<TextChunk> = Vec::new();
        let mut current_start = 0usize;
        let mut current_end = 0usize;
        let mut current_tokens = 0usize;

        for (seg_start, seg_end) in segments {
            let segment = &text[seg_start..seg_end];
            let seg_tokens = bpe.encode_ordinary(segment).len();

            if current_end > current_start && current_tokens + seg_tokens > self.max_chunk_tokens {
                chunks.push(self.make_chunk(text, current_start, current_end, chunks.len(), current_tokens));
                current_start = current_end;
                current_tokens = 0;
            }

            current_end = seg_end;
            current_tokens += seg_tokens;
        }

        if current_end > current_start {
            chunks.push(self.make_chunk(text, current_start, current_end, chunks.len(), current_tokens));
        }

        Ok(chunks)
    }

    /// Batched variant. Chunk indices restart at 0 for every document.
    pub fn chunk_texts_with_positions(&self, texts: &[String]) -> Result<Vec<Vec<TextChunk>>, ChunkingError> {
        texts.iter().map(|t| self.chunk_text_with_positions(t)).collect()
    }

    pub fn chunk_texts(&self, texts: &[String]) -> Result<Vec<Vec<String>>, ChunkingError> {
        texts.iter().map(|t| self.chunk_text(t)).collect()
    }

    fn make_chunk(&self, text: &str, start: usize, end: usize, index: usize, token_count: usize) -> TextChunk {
        TextChunk {
            text: text[start..end].to_string(),
            start,
            end,
            chunk_index: index,
            token_count: Some(token_count),
        }
    }
}

/// Splits text into sentence-ish segments as (start, end) byte ranges covering
/// the whole input. A segment ends after sentence punctuation or a newline,
/// keeping the trailing whitespace with the segment it closes.
fn split_segments(text: &str) -> Vec<(usize, usize)> {
    let mut segments = Vec::new();
    let mut start = 0usize;
    let mut at_boundary = false;

    for (idx, ch) in text.char_indices() {
        if matches!(ch, '.' | '!' | '?' | '\n') {
            at_boundary = true;
        } else if at_boundary && !ch.is_whitespace() {
            segments.push((start, idx));
            start = idx;
            at_boundary = false;
        }
    }
    if start < text.len() {
        segments.push((start, text.len()));
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_produces_no_chunks() {
        let chunker = SemanticChunker::default();
        assert!(chunker.chunk_text("").unwrap().is_empty());
        assert!(chunker.chunk_text_with_positions("").unwrap().is_empty());
    }

    #[test]
    fn test_chunks_partition_the_source_text() {
        let chunker = SemanticChunker::new(8);
        let text = "The first claim is false. A second claim was mixed. The third one checks out. \
                    Another sentence here to force multiple chunks. And one more for good measure.";
        let chunks = chunker.chunk_text_with_positions(text).unwrap();

        assert!(chunks.len() > 1);
        let rebuilt: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(rebuilt, text);

        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i);
            assert_eq!(&text[chunk.start..chunk.end], chunk.text);
        }
    }

    #[test]
    fn test_rechunking_concatenation_is_stable() {
        let chunker = SemanticChunker::new(8);
        let text = "One sentence here. Two sentences here. Three sentences here. Four sentences here.";
        let first = chunker.chunk_text(text).unwrap();
        let rebuilt: String = first.concat();
        let second = chunker.chunk_text(&rebuilt).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_batched_chunk_indices_start_at_zero_per_document() {
        let chunker = SemanticChunker::new(8);
        let docs = vec![
            "Alpha sentence one. Alpha sentence two. Alpha sentence three.".to_string(),
            "Beta sentence one. Beta sentence two. Beta sentence three.".to_string(),
        ];
        let all = chunker.chunk_texts_with_positions(&docs).unwrap();
        assert_eq!(all.len(), 2);
        for doc_chunks in &all {
            assert_eq!(doc_chunks[0].chunk_index, 0);
        }
    }

    #[test]
    fn test_token_counts_are_populated() {
        let chunker = SemanticChunker::default();
        let chunks = chunker
            .chunk_text_with_positions("A short single chunk of text.")
            .unwrap();
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].token_count.unwrap() > 0);
    }
}
