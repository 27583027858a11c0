use serde::{Deserialize, Serialize};

/// A record that a note is desired for a given message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteRequest {
    pub id: String,
    pub request_id: String,
    pub community_server_id: String,
    pub requested_by: String,
    pub content: String,
    pub dataset_item_id: Option<String>,
    pub similarity_score: Option<f32>,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Archived copy of a platform message, so that requests and notes can refer
/// back to the original content after the platform message is gone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageArchive {
    pub id: String,
    pub community_server_id: String,
    pub platform_message_id: String,
    pub channel_id: String,
    pub author_id: String,
    pub content: String,
    pub created_at: String,
}
