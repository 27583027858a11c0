use notewell_http_api::schemas::BulkScanMessage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The detection signals the scan pipeline can run per message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanType {
    Similarity,
    OpenAiModeration,
}

impl ScanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanType::Similarity => "similarity",
            ScanType::OpenAiModeration => "openai_moderation",
        }
    }
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ScanType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "similarity" => Ok(ScanType::Similarity),
            "openai_moderation" => Ok(ScanType::OpenAiModeration),
            other => Err(format!("unknown scan type: {}", other)),
        }
    }
}

/// A message one signal considers worth flagging. All candidates pass through
/// the unified relevance filter before becoming flagged messages.
#[derive(Debug, Clone)]
pub struct ScanCandidate {
    pub message: BulkScanMessage,
    pub scan_type: ScanType,
    pub score: f32,
    pub matched_content: String,
    pub matched_source: Option<String>,
    pub dataset_item_id: Option<String>,
    pub match_data: serde_json::Value,
}
