use serde::{Deserialize, Serialize};

/// Per-channel scan configuration. The previously-seen threshold overrides are
/// optional; a NULL override inherits the community default rather than
/// disabling the auto action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoredChannel {
    pub id: String,
    pub community_server_id: String,
    pub channel_id: String,
    pub enabled: bool,
    pub similarity_threshold: f32,
    pub dataset_tags: Vec<String>,
    pub previously_seen_autopublish_threshold: Option<f32>,
    pub previously_seen_autorequest_threshold: Option<f32>,
    pub updated_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}
