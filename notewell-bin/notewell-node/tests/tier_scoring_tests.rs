mod common;

use notewell_node::scoring::scorer_factory::{ScorerFactory, ScoringSettings};
use notewell_node::scoring::tier::ScoringTier;
use notewell_sqlite::schemas::note::HelpfulnessLevel;
use notewell_sqlite::SqliteManager;
use std::sync::Arc;
use tempfile::TempDir;

fn db_backed_factory() -> (TempDir, Arc<SqliteManager>, ScorerFactory) {
    let dir = TempDir::new().unwrap();
    let db = Arc::new(SqliteManager::new(dir.path().join("tiers.db")).unwrap());
    let provider = Arc::new(common::SqliteDataProvider { db: db.clone() });
    let factory = ScorerFactory::new(Some(provider), ScoringSettings::default());
    (dir, db, factory)
}

#[tokio::test]
async fn s2_tier_boundary_and_instance_caching() {
    let (_dir, _db, factory) = db_backed_factory();

    let bayesian = factory.get_scorer("c", 199, None);
    let mf = factory.get_scorer("c", 200, None);
    assert!(!bayesian.is_matrix_factorization());
    assert!(mf.is_matrix_factorization());

    // Same community and tier: the cached instance comes back.
    let first = factory.get_scorer("c", 100, None);
    let second = factory.get_scorer("c", 100, None);
    assert!(Arc::ptr_eq(&first, &second));

    // An override caches independently from the computed tier.
    let overridden = factory.get_scorer("c", 100, Some(ScoringTier::Limited));
    assert!(!Arc::ptr_eq(&first, &overridden));
    assert!(overridden.is_matrix_factorization());
}

#[tokio::test]
async fn mf_scorer_uses_community_ratings_from_the_database() {
    let (_dir, db, factory) = db_backed_factory();

    // A polarized community: one note everyone likes, one nobody does.
    let good = common::seed_note(&db, "guild-mf");
    let bad = common::seed_note(&db, "guild-mf");
    for i in 0..8 {
        db.upsert_rating(&good.id, &format!("rater-{}", i), HelpfulnessLevel::Helpful).unwrap();
        db.upsert_rating(&bad.id, &format!("rater-{}", i), HelpfulnessLevel::NotHelpful).unwrap();
    }

    let scorer = factory.get_scorer("guild-mf", 500, None);
    assert!(scorer.is_matrix_factorization());

    let good_values: Vec<f64> = vec![1.0; 8];
    let bad_values: Vec<f64> = vec![0.0; 8];
    let good_result = scorer.score_note(&good.id, &good_values);
    let bad_result = scorer.score_note(&bad.id, &bad_values);

    assert_eq!(good_result.algorithm(), Some("mf_core"));
    assert!(good_result.score > bad_result.score);
    assert!((0.0..=1.0).contains(&good_result.score));
    assert!((0.0..=1.0).contains(&bad_result.score));

    // Determinism: identical inputs and cache state give identical results.
    let again = scorer.score_note(&good.id, &good_values);
    assert_eq!(good_result, again);
}

#[tokio::test]
async fn rating_mutation_invalidates_mf_cache_via_factory() {
    let (_dir, db, factory) = db_backed_factory();

    let note = common::seed_note(&db, "guild-mf");
    for i in 0..6 {
        db.upsert_rating(&note.id, &format!("rater-{}", i), HelpfulnessLevel::Helpful).unwrap();
    }

    let scorer = factory.get_scorer("guild-mf", 300, None);
    let before = scorer.score_note(&note.id, &vec![1.0; 6]);

    // New dissenting ratings arrive; the factory bumps the version the way
    // the rating flow does.
    for i in 6..12 {
        db.upsert_rating(&note.id, &format!("rater-{}", i), HelpfulnessLevel::NotHelpful).unwrap();
    }
    factory.bump_ratings_version("guild-mf");

    let after = scorer.score_note(&note.id, &vec![1.0; 6]);
    assert!(after.score < before.score, "before {} after {}", before.score, after.score);
}
