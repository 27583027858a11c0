use crate::network::node_error::NodeError;
use crate::scoring::mf_core::{MfCoreScorer, PrescoringArgs};
use crate::scoring::scorer::{ConfidenceLevel, ScoringResult};
use crate::scoring::tabular::{IdMapping, NoteStatusTable, NoteTopicsTable, RatingsTable, UserEnrollmentTable};
use lru::LruCache;
use serde_json::json;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

const INTERCEPT_MIN: f64 = -0.4;
const INTERCEPT_MAX: f64 = 0.7;
const INTERCEPT_RANGE: f64 = INTERCEPT_MAX - INTERCEPT_MIN;
const CACHE_MAX_ENTRIES: usize = 10_000;

/// Community data access needed to assemble a scoring batch. Kept as a trait
/// so the adapter can be exercised without a live database.
pub trait CommunityDataProvider: Send + Sync {
    /// (note_uuid, rater_uuid, helpfulness value) for every rating in the
    /// community.
    fn get_all_ratings(&self, community_server_id: &str) -> Result<Vec<(String, String, f64)>, NodeError>;
    /// (note_uuid, current status) for every note in the community.
    fn get_all_notes(&self, community_server_id: &str) -> Result<Vec<(String, String)>, NodeError>;
    /// Stable participant ids (raters and authors).
    fn get_all_participants(&self, community_server_id: &str) -> Result<Vec<String>, NodeError>;
}

fn normalize_intercept(intercept: f64) -> f64 {
    ((intercept - INTERCEPT_MIN) / INTERCEPT_RANGE).clamp(0.0, 1.0)
}

fn map_rating_status(status: &str) -> ConfidenceLevel {
    match status {
        "CURRENTLY_RATED_HELPFUL" => ConfidenceLevel::High,
        "CURRENTLY_RATED_NOT_HELPFUL" => ConfidenceLevel::Standard,
        _ => ConfidenceLevel::Provisional,
    }
}

struct AdapterState {
    cache: LruCache<String, ScoringResult>,
    cache_version: u64,
    current_version: u64,
}

/// Adapter that gives the batch-mode MF core scorer a single-note interface.
///
/// Batch results are cached under a ratings-version counter; any rating
/// mutation in the community bumps the version, which invalidates the whole
/// cache on the next access. All operations are serialized by one lock.
pub struct MfScorerAdapter {
    community_id: String,
    data_provider: Option<Arc<dyn CommunityDataProvider>>,
    min_ratings: usize,
    scorer: MfCoreScorer,
    state: Mutex<AdapterState>,
}

impl MfScorerAdapter {
    pub fn new(
        community_id: &str,
        data_provider: Option<Arc<dyn CommunityDataProvider>>,
        min_ratings: usize,
    ) -> Self {
        MfScorerAdapter {
            community_id: community_id.to_string(),
            data_provider,
            min_ratings,
            scorer: MfCoreScorer::new(),
            state: Mutex::new(AdapterState {
                cache: LruCache::new(NonZeroUsize::new(CACHE_MAX_ENTRIES).expect("nonzero cache size")),
                cache_version: 0,
                current_version: 1,
            }),
        }
    }

    /// Scores one note, serving from the batch cache when valid.
    pub fn score_note(&self, note_id: &str, ratings: &[f64]) -> ScoringResult {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        if state.cache_version != state.current_version {
            info!(
                community = %self.community_id,
                old_version = state.cache_version,
                new_version = state.current_version,
                cached_notes = state.cache.len(),
                "invalidating MF scorer cache"
            );
            state.cache.clear();
            state.cache_version = state.current_version;
        }

        let cache_version = state.cache_version;
        if let Some(result) = state.cache.get(note_id) {
            debug!(note_id, version = cache_version, "MF cache hit");
            return result.clone();
        }

        if let Some(provider) = &self.data_provider {
            match self.execute_batch_scoring(provider.as_ref()) {
                Ok(batch_results) => {
                    for (id, result) in batch_results {
                        state.cache.put(id, result);
                    }
                    if let Some(result) = state.cache.get(note_id) {
                        return result.clone();
                    }
                    warn!(note_id, "note missing from MF batch results, using stub");
                }
                Err(error) => {
                    warn!(note_id, %error, "MF batch scoring failed, falling back to stub");
                    let mut result = self.score_stub(note_id, ratings);
                    result.metadata["degraded"] = json!(true);
                    state.cache.put(note_id.to_string(), result.clone());
                    return result;
                }
            }
        }

        let result = self.score_stub(note_id, ratings);
        state.cache.put(note_id.to_string(), result.clone());
        result
    }

    /// Bumps the ratings version. Call on every rating mutation in the
    /// community.
    pub fn update_ratings_version(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.current_version += 1;
        info!(community = %self.community_id, new_version = state.current_version, "ratings version updated");
    }

    pub fn cache_stats(&self) -> serde_json::Value {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        json!({
            "cached_notes": state.cache.len(),
            "cache_version": state.cache_version,
            "current_version": state.current_version,
            "is_valid": state.cache_version == state.current_version,
        })
    }

    fn execute_batch_scoring(
        &self,
        provider: &dyn CommunityDataProvider,
    ) -> Result<Vec<(String, ScoringResult)>, NodeError> {
        let ratings_data = provider.get_all_ratings(&self.community_id)?;
        let notes_data = provider.get_all_notes(&self.community_id)?;
        let participants = provider.get_all_participants(&self.community_id)?;

        let note_mapping = IdMapping::build(
            ratings_data
                .iter()
                .map(|(note, _, _)| note.clone())
                .chain(notes_data.iter().map(|(note, _)| note.clone())),
        );
        let rater_mapping = IdMapping::build(
            ratings_data
                .iter()
                .map(|(_, rater, _)| rater.clone())
                .chain(participants.iter().cloned()),
        );

        let mut ratings = RatingsTable::default();
        let mut rating_counts: std::collections::HashMap<i64, usize> = std::collections::HashMap::new();
        for (note_uuid, rater_uuid, value) in &ratings_data {
            let note_id = note_mapping
                .to_int(note_uuid)
                .ok_or_else(|| NodeError::Internal("note id missing from mapping".to_string()))?;
            let rater_id = rater_mapping
                .to_int(rater_uuid)
                .ok_or_else(|| NodeError::Internal("rater id missing from mapping".to_string()))?;
            ratings.push(note_id, rater_id, *value);
            *rating_counts.entry(note_id).or_insert(0) += 1;
        }

        let mut note_status = NoteStatusTable::default();
        for (note_uuid, status) in &notes_data {
            if let Some(note_id) = note_mapping.to_int(note_uuid) {
                note_status.push(note_id, status.clone());
            }
        }

        let user_enrollment = UserEnrollmentTable {
            participant_ids: participants
                .iter()
                .filter_map(|p| rater_mapping.to_int(p))
                .collect(),
        };

        let args = PrescoringArgs {
            ratings,
            note_status_history: note_status,
            user_enrollment,
            note_topics: NoteTopicsTable::default(),
        };

        debug!(
            community = %self.community_id,
            ratings = args.ratings.len(),
            notes = note_mapping.len(),
            "running MF prescore"
        );
        let prescore = self.scorer.prescore(&args);
        let scored = self.scorer.score_final(&args, &prescore);

        let mut results = Vec::with_capacity(scored.len());
        for note in scored {
            let note_uuid = match note_mapping.to_uuid(note.note_id) {
                Some(uuid) => uuid.to_string(),
                None => continue,
            };
            let rating_count = rating_counts.get(&note.note_id).copied().unwrap_or(0);
            results.push((
                note_uuid.clone(),
                ScoringResult {
                    score: normalize_intercept(note.intercept),
                    confidence: map_rating_status(&note.rating_status),
                    metadata: json!({
                        "algorithm": "mf_core",
                        "note_id": note_uuid,
                        "intercept": note.intercept,
                        "factor": note.factor,
                        "status": note.rating_status,
                        "rating_count": rating_count,
                    }),
                },
            ));
        }
        Ok(results)
    }

    fn score_stub(&self, note_id: &str, ratings: &[f64]) -> ScoringResult {
        let rating_count = ratings.len();
        let confidence = if rating_count >= self.min_ratings {
            ConfidenceLevel::Standard
        } else {
            ConfidenceLevel::Provisional
        };
        ScoringResult {
            score: 0.5,
            confidence,
            metadata: json!({
                "algorithm": "mf_core_stub",
                "note_id": note_id,
                "rating_count": rating_count,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProvider {
        ratings: Vec<(String, String, f64)>,
        notes: Vec<(String, String)>,
    }

    impl CommunityDataProvider for FixedProvider {
        fn get_all_ratings(&self, _c: &str) -> Result<Vec<(String, String, f64)>, NodeError> {
            Ok(self.ratings.clone())
        }

        fn get_all_notes(&self, _c: &str) -> Result<Vec<(String, String)>, NodeError> {
            Ok(self.notes.clone())
        }

        fn get_all_participants(&self, _c: &str) -> Result<Vec<String>, NodeError> {
            Ok(self.ratings.iter().map(|(_, r, _)| r.clone()).collect())
        }
    }

    fn provider() -> Arc<FixedProvider> {
        let mut ratings = Vec::new();
        for rater in 0..8 {
            ratings.push(("note-a".to_string(), format!("rater-{}", rater), 1.0));
            ratings.push(("note-b".to_string(), format!("rater-{}", rater), 0.0));
        }
        Arc::new(FixedProvider {
            ratings,
            notes: vec![
                ("note-a".to_string(), "NEEDS_MORE_RATINGS".to_string()),
                ("note-b".to_string(), "NEEDS_MORE_RATINGS".to_string()),
            ],
        })
    }

    #[test]
    fn test_batch_results_are_cached_and_deterministic() {
        let adapter = MfScorerAdapter::new("community", Some(provider()), 5);

        let first = adapter.score_note("note-a", &[1.0; 8]);
        let second = adapter.score_note("note-a", &[1.0; 8]);
        assert_eq!(first, second);
        assert_eq!(first.algorithm(), Some("mf_core"));

        let stats = adapter.cache_stats();
        assert_eq!(stats["cached_notes"], 2);
        assert_eq!(stats["is_valid"], true);
    }

    #[test]
    fn test_helpful_note_outranks_unhelpful() {
        let adapter = MfScorerAdapter::new("community", Some(provider()), 5);
        let a = adapter.score_note("note-a", &[1.0; 8]);
        let b = adapter.score_note("note-b", &[0.0; 8]);
        assert!(a.score > b.score);
        assert!(a.score >= 0.0 && a.score <= 1.0);
        assert!(b.score >= 0.0 && b.score <= 1.0);
    }

    #[test]
    fn test_version_bump_invalidates_cache() {
        let adapter = MfScorerAdapter::new("community", Some(provider()), 5);
        adapter.score_note("note-a", &[1.0; 8]);
        assert_eq!(adapter.cache_stats()["cached_notes"], 2);

        adapter.update_ratings_version();
        assert_eq!(adapter.cache_stats()["is_valid"], false);

        adapter.score_note("note-a", &[1.0; 8]);
        let stats = adapter.cache_stats();
        assert_eq!(stats["is_valid"], true);
        assert_eq!(stats["cached_notes"], 2);
    }

    #[test]
    fn test_without_provider_uses_stub() {
        let adapter = MfScorerAdapter::new("community", None, 5);
        let few = adapter.score_note("note-x", &[1.0]);
        assert_eq!(few.score, 0.5);
        assert_eq!(few.confidence, ConfidenceLevel::Provisional);
        assert_eq!(few.algorithm(), Some("mf_core_stub"));

        let many = adapter.score_note("note-y", &[1.0, 0.5, 1.0, 0.0, 1.0]);
        assert_eq!(many.confidence, ConfidenceLevel::Standard);
    }

    #[test]
    fn test_unknown_note_falls_back_to_stub() {
        let adapter = MfScorerAdapter::new("community", Some(provider()), 5);
        let result = adapter.score_note("note-missing", &[1.0, 1.0]);
        assert_eq!(result.algorithm(), Some("mf_core_stub"));
    }

    #[test]
    fn test_intercept_normalization_bounds() {
        assert_eq!(normalize_intercept(INTERCEPT_MIN), 0.0);
        assert_eq!(normalize_intercept(INTERCEPT_MAX), 1.0);
        assert_eq!(normalize_intercept(-1.0), 0.0);
        assert_eq!(normalize_intercept(1.0), 1.0);
        assert!((normalize_intercept(0.15) - 0.5).abs() < 1e-9);
    }
}
