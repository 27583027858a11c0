use crate::errors::SqliteManagerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NoteStatus {
    NeedsMoreRatings,
    CurrentlyRatedHelpful,
    CurrentlyRatedNotHelpful,
}

impl NoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoteStatus::NeedsMoreRatings => "NEEDS_MORE_RATINGS",
            NoteStatus::CurrentlyRatedHelpful => "CURRENTLY_RATED_HELPFUL",
            NoteStatus::CurrentlyRatedNotHelpful => "CURRENTLY_RATED_NOT_HELPFUL",
        }
    }
}

impl fmt::Display for NoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for NoteStatus {
    type Err = SqliteManagerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEEDS_MORE_RATINGS" => Ok(NoteStatus::NeedsMoreRatings),
            "CURRENTLY_RATED_HELPFUL" => Ok(NoteStatus::CurrentlyRatedHelpful),
            "CURRENTLY_RATED_NOT_HELPFUL" => Ok(NoteStatus::CurrentlyRatedNotHelpful),
            other => Err(SqliteManagerError::InvalidStatusValue(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NoteClassification {
    Misleading,
    NotMisleading,
}

impl NoteClassification {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoteClassification::Misleading => "MISLEADING",
            NoteClassification::NotMisleading => "NOT_MISLEADING",
        }
    }
}

impl FromStr for NoteClassification {
    type Err = SqliteManagerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MISLEADING" => Ok(NoteClassification::Misleading),
            "NOT_MISLEADING" => Ok(NoteClassification::NotMisleading),
            other => Err(SqliteManagerError::InvalidStatusValue(other.to_string())),
        }
    }
}

/// A rater's judgment of how helpful a note is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HelpfulnessLevel {
    Helpful,
    SomewhatHelpful,
    NotHelpful,
}

impl HelpfulnessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            HelpfulnessLevel::Helpful => "HELPFUL",
            HelpfulnessLevel::SomewhatHelpful => "SOMEWHAT_HELPFUL",
            HelpfulnessLevel::NotHelpful => "NOT_HELPFUL",
        }
    }

    /// Numeric value used by the scorers.
    pub fn value(&self) -> f64 {
        match self {
            HelpfulnessLevel::Helpful => 1.0,
            HelpfulnessLevel::SomewhatHelpful => 0.5,
            HelpfulnessLevel::NotHelpful => 0.0,
        }
    }
}

impl fmt::Display for HelpfulnessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for HelpfulnessLevel {
    type Err = SqliteManagerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HELPFUL" => Ok(HelpfulnessLevel::Helpful),
            "SOMEWHAT_HELPFUL" => Ok(HelpfulnessLevel::SomewhatHelpful),
            "NOT_HELPFUL" => Ok(HelpfulnessLevel::NotHelpful),
            other => Err(SqliteManagerError::InvalidStatusValue(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub community_server_id: String,
    pub author_id: String,
    pub summary: String,
    pub classification: NoteClassification,
    pub status: NoteStatus,
    pub helpfulness_score: i64,
    pub request_id: Option<String>,
    pub ai_generated: bool,
    pub ai_provider: Option<String>,
    pub force_published: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub id: String,
    pub note_id: String,
    pub rater_id: String,
    pub helpfulness_level: HelpfulnessLevel,
    pub created_at: String,
    pub updated_at: String,
}

/// Aggregate counters over a note's ratings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingStats {
    pub total: usize,
    pub helpful: usize,
    pub somewhat_helpful: usize,
    pub not_helpful: usize,
    pub average_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreEventOutboxRow {
    pub id: String,
    pub note_id: String,
    pub payload: serde_json::Value,
    pub created_at: String,
    pub published_at: Option<String>,
}
