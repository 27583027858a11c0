use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Caller identity as extracted at the HTTP boundary. The bearer token is the
/// caller's stable profile id (the gateway has already authenticated it); the
/// gateway signals platform-level "manage server" permission with a header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthContext {
    pub bearer: String,
    pub manage_server: bool,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RatingCreateAttributes {
    pub note_id: String,
    pub rater_id: String,
    pub helpfulness_level: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RatingUpdateAttributes {
    pub helpfulness_level: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct MonitoredChannelCreateAttributes {
    pub community_server_id: String,
    pub channel_id: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub similarity_threshold: Option<f32>,
    #[serde(default)]
    pub dataset_tags: Option<Vec<String>>,
    #[serde(default)]
    pub previously_seen_autopublish_threshold: Option<f32>,
    #[serde(default)]
    pub previously_seen_autorequest_threshold: Option<f32>,
    #[serde(default)]
    pub updated_by: Option<String>,
}

fn default_enabled() -> bool {
    true
}

/// PATCH attributes. The threshold overrides distinguish "absent" from an
/// explicit null, which clears the override back to the community default.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct MonitoredChannelUpdateAttributes {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub similarity_threshold: Option<f32>,
    #[serde(default)]
    pub dataset_tags: Option<Vec<String>>,
    #[serde(
        default,
        with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub previously_seen_autopublish_threshold: Option<Option<f32>>,
    #[serde(
        default,
        with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub previously_seen_autorequest_threshold: Option<Option<f32>>,
    #[serde(default)]
    pub updated_by: Option<String>,
}

mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PreviouslySeenRecordAttributes {
    pub community_server_id: String,
    pub original_message_id: String,
    #[serde(default)]
    pub published_note_id: Option<String>,
    pub content: String,
    #[serde(default)]
    pub extra_metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PreviouslySeenCheckRequest {
    pub community_server_id: String,
    #[serde(default)]
    pub channel_id: Option<String>,
    pub message_text: String,
}

/// A platform message submitted for scanning.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BulkScanMessage {
    pub message_id: String,
    pub channel_id: String,
    pub community_server_id: String,
    pub content: String,
    pub author_id: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct BulkScanCreateAttributes {
    pub community_server_id: String,
    pub messages: Vec<BulkScanMessage>,
    #[serde(default)]
    pub scan_types: Option<Vec<String>>,
}
