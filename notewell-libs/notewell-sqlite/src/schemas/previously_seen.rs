use serde::{Deserialize, Serialize};

/// A message already associated with a published note in its community.
/// Rows are append-only and strictly scoped by community.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviouslySeenMessage {
    pub id: String,
    pub community_server_id: String,
    pub original_message_id: String,
    pub published_note_id: Option<String>,
    pub embedding: Vec<f32>,
    pub provider: String,
    pub model: String,
    pub extra_metadata: serde_json::Value,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviouslySeenMatch {
    pub record: PreviouslySeenMessage,
    pub score: f32,
}
