use serde::{Deserialize, Serialize};

/// An imported fact-check article. Immutable once imported; long bodies are
/// split into chunks for indexing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactCheckItem {
    pub id: String,
    pub dataset_name: String,
    pub title: String,
    pub content: String,
    pub rating: Option<String>,
    pub source_url: Option<String>,
    pub dataset_tags: Vec<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactCheckChunk {
    pub id: String,
    pub item_id: String,
    pub chunk_index: i64,
    pub text: String,
    pub start_offset: i64,
    pub end_offset: i64,
    pub embedding: Vec<f32>,
    pub provider: String,
    pub model: String,
}

/// One similarity-search hit. `similarity_score` is the dense cosine score;
/// `fused_score` is the rank-fusion score the result list is ordered by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactCheckMatch {
    pub item_id: String,
    pub dataset_name: String,
    pub dataset_tags: Vec<String>,
    pub title: String,
    pub content: String,
    pub source_url: Option<String>,
    pub chunk_id: String,
    pub chunk_text: String,
    pub similarity_score: f32,
    pub fused_score: f32,
}
