use crate::errors::SqliteManagerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Pending,
    InProgress,
    Completed,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Pending => "pending",
            ScanStatus::InProgress => "in_progress",
            ScanStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ScanStatus {
    type Err = SqliteManagerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ScanStatus::Pending),
            "in_progress" => Ok(ScanStatus::InProgress),
            "completed" => Ok(ScanStatus::Completed),
            other => Err(SqliteManagerError::InvalidStatusValue(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkScanLog {
    pub id: String,
    pub community_server_id: String,
    pub initiated_by: String,
    pub status: ScanStatus,
    pub messages_scanned: i64,
    pub messages_flagged: i64,
    pub initiated_at: String,
    pub completed_at: Option<String>,
}

/// A message that survived every scan signal and the relevance filter.
/// Serialized into the per-scan flagged list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlaggedMessage {
    pub message_id: String,
    pub channel_id: String,
    pub content: String,
    pub author_id: String,
    pub timestamp: String,
    pub scan_type: String,
    pub match_score: f32,
    pub matched_claim: String,
    pub matched_source: Option<String>,
    pub dataset_item_id: Option<String>,
}
