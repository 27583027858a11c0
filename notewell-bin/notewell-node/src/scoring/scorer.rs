use serde::{Deserialize, Serialize};
use std::fmt;

/// How much weight a score deserves, derived from rating volume (Bayesian
/// tier) or the MF rating status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    Provisional,
    Low,
    Standard,
    High,
}

impl ConfidenceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::Provisional => "provisional",
            ConfidenceLevel::Low => "low",
            ConfidenceLevel::Standard => "standard",
            ConfidenceLevel::High => "high",
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-note scoring output. `score` is in [0, 1]; metadata carries the
/// algorithm name, rating count, and tier for observability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringResult {
    pub score: f64,
    pub confidence: ConfidenceLevel,
    pub metadata: serde_json::Value,
}

impl ScoringResult {
    pub fn algorithm(&self) -> Option<&str> {
        self.metadata.get("algorithm").and_then(|v| v.as_str())
    }
}

/// Derived note status after a score update. Notes below the rating minimum
/// stay at NEEDS_MORE_RATINGS regardless of score.
pub fn derive_note_status(
    score: f64,
    rating_count: usize,
    min_ratings: usize,
) -> notewell_sqlite::schemas::note::NoteStatus {
    use notewell_sqlite::schemas::note::NoteStatus;
    if rating_count < min_ratings {
        NoteStatus::NeedsMoreRatings
    } else if score >= 0.5 {
        NoteStatus::CurrentlyRatedHelpful
    } else {
        NoteStatus::CurrentlyRatedNotHelpful
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notewell_sqlite::schemas::note::NoteStatus;

    #[test]
    fn test_status_derivation() {
        assert_eq!(derive_note_status(0.9, 2, 5), NoteStatus::NeedsMoreRatings);
        assert_eq!(derive_note_status(0.5, 5, 5), NoteStatus::CurrentlyRatedHelpful);
        assert_eq!(derive_note_status(0.49, 5, 5), NoteStatus::CurrentlyRatedNotHelpful);
    }
}
