use crate::scoring::bayesian::BayesianAverageScorer;
use crate::scoring::mf_adapter::{CommunityDataProvider, MfScorerAdapter};
use crate::scoring::scorer::ScoringResult;
use crate::scoring::tier::ScoringTier;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// A tier-selected scorer instance for one community.
pub enum CommunityScorer {
    Bayesian(BayesianAverageScorer),
    MatrixFactorization(MfScorerAdapter),
}

impl CommunityScorer {
    pub fn score_note(&self, note_id: &str, ratings: &[f64]) -> ScoringResult {
        match self {
            CommunityScorer::Bayesian(scorer) => scorer.score_note(note_id, ratings),
            CommunityScorer::MatrixFactorization(adapter) => adapter.score_note(note_id, ratings),
        }
    }

    pub fn is_matrix_factorization(&self) -> bool {
        matches!(self, CommunityScorer::MatrixFactorization(_))
    }

    /// Ratings changed in the community; MF adapters drop their batch cache.
    pub fn update_ratings_version(&self) {
        if let CommunityScorer::MatrixFactorization(adapter) = self {
            adapter.update_ratings_version();
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScoringSettings {
    pub prior_mean: f64,
    pub prior_strength: f64,
    pub min_ratings: usize,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        ScoringSettings {
            prior_mean: 0.5,
            prior_strength: 5.0,
            min_ratings: 5,
        }
    }
}

/// Maps (community, note volume, optional override) to a cached scorer
/// instance. The cache key is the effective tier, so an override caches
/// independently from the computed tier.
pub struct ScorerFactory {
    data_provider: Option<Arc<dyn CommunityDataProvider>>,
    settings: ScoringSettings,
    cache: Mutex<HashMap<(String, ScoringTier), Arc<CommunityScorer>>>,
}

impl ScorerFactory {
    pub fn new(data_provider: Option<Arc<dyn CommunityDataProvider>>, settings: ScoringSettings) -> Self {
        ScorerFactory {
            data_provider,
            settings,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn get_scorer(
        &self,
        community_server_id: &str,
        note_count: i64,
        tier_override: Option<ScoringTier>,
    ) -> Arc<CommunityScorer> {
        let tier = tier_override.unwrap_or_else(|| ScoringTier::for_note_count(note_count));
        let key = (community_server_id.to_string(), tier);

        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(scorer) = cache.get(&key) {
            return scorer.clone();
        }

        debug!(community = %community_server_id, tier = %tier, note_count, "creating scorer");
        let scorer = if tier.uses_matrix_factorization() {
            CommunityScorer::MatrixFactorization(MfScorerAdapter::new(
                community_server_id,
                self.data_provider.clone(),
                self.settings.min_ratings,
            ))
        } else {
            CommunityScorer::Bayesian(BayesianAverageScorer::new(
                self.settings.prior_mean,
                self.settings.prior_strength,
                self.settings.min_ratings,
            ))
        };
        let scorer = Arc::new(scorer);
        cache.insert(key, scorer.clone());
        scorer
    }

    /// Notifies every cached scorer for the community that its ratings
    /// changed.
    pub fn bump_ratings_version(&self, community_server_id: &str) {
        let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        for ((community, _), scorer) in cache.iter() {
            if community.as_str() == community_server_id {
                scorer.update_ratings_version();
            }
        }
    }

    /// Drops every cached scorer for the community. Returns how many were
    /// removed.
    pub fn invalidate_community(&self, community_server_id: &str) -> usize {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        let before = cache.len();
        cache.retain(|(community, _), _| community.as_str() != community_server_id);
        before - cache.len()
    }

    pub fn clear_cache(&self) {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    pub fn cache_info(&self) -> serde_json::Value {
        let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        let entries: Vec<serde_json::Value> = cache
            .keys()
            .map(|(community, tier)| json!({"community_server_id": community, "tier": tier.as_str()}))
            .collect();
        json!({"cache_size": cache.len(), "cached_entries": entries})
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factory() -> ScorerFactory {
        ScorerFactory::new(None, ScoringSettings::default())
    }

    #[test]
    fn test_tier_selection_by_note_count() {
        let factory = factory();
        let small = factory.get_scorer("c", 199, None);
        let large = factory.get_scorer("c", 200, None);
        assert!(!small.is_matrix_factorization());
        assert!(large.is_matrix_factorization());
    }

    #[test]
    fn test_same_community_same_tier_returns_same_instance() {
        let factory = factory();
        let first = factory.get_scorer("c", 100, None);
        let second = factory.get_scorer("c", 150, None);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(factory.cache_info()["cache_size"], 1);
    }

    #[test]
    fn test_override_caches_under_override_tier() {
        let factory = factory();
        let computed = factory.get_scorer("c", 100, None);
        let overridden = factory.get_scorer("c", 100, Some(ScoringTier::Limited));
        assert!(!Arc::ptr_eq(&computed, &overridden));
        assert!(overridden.is_matrix_factorization());
        assert_eq!(factory.cache_info()["cache_size"], 2);

        let again = factory.get_scorer("c", 100, Some(ScoringTier::Limited));
        assert!(Arc::ptr_eq(&overridden, &again));
    }

    #[test]
    fn test_override_always_wins() {
        let factory = factory();
        let forced_bayesian = factory.get_scorer("big", 5000, Some(ScoringTier::Minimal));
        assert!(!forced_bayesian.is_matrix_factorization());
        let forced_mf = factory.get_scorer("small", 50, Some(ScoringTier::Basic));
        assert!(forced_mf.is_matrix_factorization());
    }

    #[test]
    fn test_invalidate_community_only_removes_that_community() {
        let factory = factory();
        factory.get_scorer("x", 100, None);
        factory.get_scorer("x", 300, None);
        factory.get_scorer("y", 100, None);
        assert_eq!(factory.cache_info()["cache_size"], 3);

        let removed = factory.invalidate_community("x");
        assert_eq!(removed, 2);
        assert_eq!(factory.cache_info()["cache_size"], 1);
    }

    #[test]
    fn test_different_communities_get_different_instances() {
        let factory = factory();
        let a = factory.get_scorer("a", 100, None);
        let b = factory.get_scorer("b", 100, None);
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
