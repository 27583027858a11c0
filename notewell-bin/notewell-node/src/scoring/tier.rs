use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Scoring tiers keyed off a community's note volume. MINIMAL communities use
/// the Bayesian average; everything at or above the matrix-factorization
/// threshold runs the MF core scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringTier {
    Minimal,
    Limited,
    Basic,
    Intermediate,
    Advanced,
    Full,
}

pub const MF_TIER_NOTE_THRESHOLD: i64 = 200;

impl ScoringTier {
    /// Tier for a community with `note_count` notes. The boundary is
    /// inclusive: exactly the threshold selects the MF path.
    pub fn for_note_count(note_count: i64) -> Self {
        match note_count {
            n if n < MF_TIER_NOTE_THRESHOLD => ScoringTier::Minimal,
            n if n < 1_000 => ScoringTier::Limited,
            n if n < 5_000 => ScoringTier::Basic,
            n if n < 20_000 => ScoringTier::Intermediate,
            n if n < 100_000 => ScoringTier::Advanced,
            _ => ScoringTier::Full,
        }
    }

    pub fn uses_matrix_factorization(&self) -> bool {
        !matches!(self, ScoringTier::Minimal)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScoringTier::Minimal => "minimal",
            ScoringTier::Limited => "limited",
            ScoringTier::Basic => "basic",
            ScoringTier::Intermediate => "intermediate",
            ScoringTier::Advanced => "advanced",
            ScoringTier::Full => "full",
        }
    }

    pub fn index(&self) -> u8 {
        match self {
            ScoringTier::Minimal => 0,
            ScoringTier::Limited => 1,
            ScoringTier::Basic => 2,
            ScoringTier::Intermediate => 3,
            ScoringTier::Advanced => 4,
            ScoringTier::Full => 5,
        }
    }
}

impl fmt::Display for ScoringTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ScoringTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "minimal" => Ok(ScoringTier::Minimal),
            "limited" => Ok(ScoringTier::Limited),
            "basic" => Ok(ScoringTier::Basic),
            "intermediate" => Ok(ScoringTier::Intermediate),
            "advanced" => Ok(ScoringTier::Advanced),
            "full" => Ok(ScoringTier::Full),
            other => Err(format!("unknown scoring tier: {}", other)),
        }
    }
}
