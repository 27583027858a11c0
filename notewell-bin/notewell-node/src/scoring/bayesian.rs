use crate::scoring::scorer::{ConfidenceLevel, ScoringResult};
use serde_json::json;

/// Bayesian average scorer for small communities. The observed mean is pulled
/// toward a global prior; the pull weight shrinks as ratings accumulate.
#[derive(Debug, Clone)]
pub struct BayesianAverageScorer {
    prior_mean: f64,
    prior_strength: f64,
    min_ratings: usize,
}

impl BayesianAverageScorer {
    pub fn new(prior_mean: f64, prior_strength: f64, min_ratings: usize) -> Self {
        BayesianAverageScorer {
            prior_mean,
            prior_strength,
            min_ratings,
        }
    }

    pub fn score_note(&self, note_id: &str, ratings: &[f64]) -> ScoringResult {
        let rating_count = ratings.len();
        let score = if rating_count == 0 {
            self.prior_mean
        } else {
            let mean: f64 = ratings.iter().sum::<f64>() / rating_count as f64;
            let prior_weight = self.prior_strength / (self.prior_strength + rating_count as f64);
            prior_weight * self.prior_mean + (1.0 - prior_weight) * mean
        };

        let confidence = if rating_count < self.min_ratings {
            ConfidenceLevel::Provisional
        } else {
            ConfidenceLevel::Standard
        };

        ScoringResult {
            score: score.clamp(0.0, 1.0),
            confidence,
            metadata: json!({
                "algorithm": "bayesian_average_tier0",
                "note_id": note_id,
                "rating_count": rating_count,
                "prior_mean": self.prior_mean,
                "prior_strength": self.prior_strength,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_ratings_returns_prior_provisional() {
        let scorer = BayesianAverageScorer::new(0.5, 5.0, 5);
        let result = scorer.score_note("n-1", &[]);
        assert_eq!(result.score, 0.5);
        assert_eq!(result.confidence, ConfidenceLevel::Provisional);
        assert_eq!(result.algorithm(), Some("bayesian_average_tier0"));
    }

    #[test]
    fn test_score_is_pulled_toward_prior() {
        let scorer = BayesianAverageScorer::new(0.5, 5.0, 5);
        // 3 unanimous helpful ratings: mean 1.0, but the prior keeps it below
        let result = scorer.score_note("n-1", &[1.0, 1.0, 1.0]);
        assert!(result.score < 1.0);
        assert!(result.score > 0.5);
        // weight = 5/8 prior + 3/8 mean = 0.5*0.625 + 1.0*0.375 = 0.6875
        assert!((result.score - 0.6875).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_standard_at_min_ratings() {
        let scorer = BayesianAverageScorer::new(0.5, 5.0, 3);
        let provisional = scorer.score_note("n-1", &[1.0, 1.0]);
        let standard = scorer.score_note("n-1", &[1.0, 1.0, 0.5]);
        assert_eq!(provisional.confidence, ConfidenceLevel::Provisional);
        assert_eq!(standard.confidence, ConfidenceLevel::Standard);
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let scorer = BayesianAverageScorer::new(0.5, 5.0, 5);
        let ratings = [1.0, 0.5, 0.0, 1.0, 1.0, 0.5];
        assert_eq!(scorer.score_note("n-1", &ratings), scorer.score_note("n-1", &ratings));
    }
}
