use crate::errors::SqliteManagerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchJobStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl BatchJobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchJobStatus::Pending => "PENDING",
            BatchJobStatus::InProgress => "IN_PROGRESS",
            BatchJobStatus::Completed => "COMPLETED",
            BatchJobStatus::Failed => "FAILED",
            BatchJobStatus::Cancelled => "CANCELLED",
        }
    }

    /// Terminal states are absorbing: no further transitions are allowed.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BatchJobStatus::Completed | BatchJobStatus::Failed | BatchJobStatus::Cancelled
        )
    }
}

impl fmt::Display for BatchJobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BatchJobStatus {
    type Err = SqliteManagerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(BatchJobStatus::Pending),
            "IN_PROGRESS" => Ok(BatchJobStatus::InProgress),
            "COMPLETED" => Ok(BatchJobStatus::Completed),
            "FAILED" => Ok(BatchJobStatus::Failed),
            "CANCELLED" => Ok(BatchJobStatus::Cancelled),
            other => Err(SqliteManagerError::InvalidStatusValue(other.to_string())),
        }
    }
}

/// Durable ledger row for one background workflow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchJob {
    pub id: String,
    pub workflow_id: String,
    pub job_type: String,
    pub status: BatchJobStatus,
    pub total_tasks: i64,
    pub completed_tasks: i64,
    pub failed_tasks: i64,
    pub metadata: serde_json::Value,
    pub error_summary: Option<serde_json::Value>,
    pub created_at: String,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
}
