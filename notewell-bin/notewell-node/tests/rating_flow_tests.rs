mod common;

use notewell_http_api::api_v2::api_v2_router::api_v2_routes;
use notewell_sqlite::schemas::note::{HelpfulnessLevel, NoteStatus};
use serde_json::json;

fn rating_body(note_id: &str, rater_id: &str, level: &str) -> serde_json::Value {
    json!({
        "data": {
            "type": "ratings",
            "attributes": {
                "note_id": note_id,
                "rater_id": rater_id,
                "helpfulness_level": level,
            }
        }
    })
}

#[tokio::test]
async fn s1_rating_updates_score_and_status() {
    let harness = common::build_node("http://localhost:1/", "http://localhost:1/");
    let caller = common::seed_service_account(&harness.db);
    let note = common::seed_note(&harness.db, "guild-1");

    for i in 0..4 {
        harness
            .db
            .upsert_rating(&note.id, &format!("rater-{}", i), HelpfulnessLevel::Helpful)
            .unwrap();
    }
    harness
        .db
        .upsert_rating(&note.id, "rater-4", HelpfulnessLevel::NotHelpful)
        .unwrap();

    let api = api_v2_routes(harness.sender.clone());
    let response = warp::test::request()
        .method("POST")
        .path("/v2/ratings")
        .header("authorization", format!("Bearer {}", caller.id))
        .json(&rating_body(&note.id, "rater-new", "HELPFUL"))
        .reply(&api)
        .await;

    assert_eq!(response.status(), 201);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/vnd.api+json"
    );
    let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body["data"]["type"], "ratings");
    assert_eq!(body["jsonapi"]["version"], "1.1");

    // 6 ratings (5 helpful, 1 not): the Bayesian score lands well above 0.5,
    // and the count clears MIN_RATINGS_NEEDED.
    let updated = harness.db.get_note(&note.id).unwrap().unwrap();
    assert!(updated.helpfulness_score >= 50, "score was {}", updated.helpfulness_score);
    assert_eq!(updated.status, NoteStatus::CurrentlyRatedHelpful);

    // The score-update event went through the outbox, not inline.
    let pending = harness.db.get_unpublished_score_events(10).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].note_id, note.id);
}

#[tokio::test]
async fn rating_below_min_count_stays_needs_more_ratings() {
    let harness = common::build_node("http://localhost:1/", "http://localhost:1/");
    let caller = common::seed_service_account(&harness.db);
    let note = common::seed_note(&harness.db, "guild-1");

    let api = api_v2_routes(harness.sender.clone());
    let response = warp::test::request()
        .method("POST")
        .path("/v2/ratings")
        .header("authorization", format!("Bearer {}", caller.id))
        .json(&rating_body(&note.id, "rater-1", "HELPFUL"))
        .reply(&api)
        .await;

    assert_eq!(response.status(), 201);
    let updated = harness.db.get_note(&note.id).unwrap().unwrap();
    assert_eq!(updated.status, NoteStatus::NeedsMoreRatings);
}

#[tokio::test]
async fn rating_upsert_is_observationally_idempotent() {
    let harness = common::build_node("http://localhost:1/", "http://localhost:1/");
    let caller = common::seed_service_account(&harness.db);
    let note = common::seed_note(&harness.db, "guild-1");
    let api = api_v2_routes(harness.sender.clone());

    for _ in 0..2 {
        let response = warp::test::request()
            .method("POST")
            .path("/v2/ratings")
            .header("authorization", format!("Bearer {}", caller.id))
            .json(&rating_body(&note.id, "rater-1", "HELPFUL"))
            .reply(&api)
            .await;
        assert_eq!(response.status(), 201);
    }

    let ratings = harness.db.get_ratings_for_note(&note.id).unwrap();
    assert_eq!(ratings.len(), 1);
    assert_eq!(ratings[0].helpfulness_level, HelpfulnessLevel::Helpful);
}

#[tokio::test]
async fn rating_re_rate_updates_in_place() {
    let harness = common::build_node("http://localhost:1/", "http://localhost:1/");
    let caller = common::seed_service_account(&harness.db);
    let note = common::seed_note(&harness.db, "guild-1");
    let api = api_v2_routes(harness.sender.clone());

    let first = warp::test::request()
        .method("POST")
        .path("/v2/ratings")
        .header("authorization", format!("Bearer {}", caller.id))
        .json(&rating_body(&note.id, "rater-1", "HELPFUL"))
        .reply(&api)
        .await;
    let first_body: serde_json::Value = serde_json::from_slice(first.body()).unwrap();

    let second = warp::test::request()
        .method("POST")
        .path("/v2/ratings")
        .header("authorization", format!("Bearer {}", caller.id))
        .json(&rating_body(&note.id, "rater-1", "NOT_HELPFUL"))
        .reply(&api)
        .await;
    let second_body: serde_json::Value = serde_json::from_slice(second.body()).unwrap();

    assert_eq!(first_body["data"]["id"], second_body["data"]["id"]);
    assert_eq!(second_body["data"]["attributes"]["helpfulness_level"], "NOT_HELPFUL");
    assert_eq!(harness.db.get_ratings_for_note(&note.id).unwrap().len(), 1);
}

#[tokio::test]
async fn rating_unknown_note_is_404() {
    let harness = common::build_node("http://localhost:1/", "http://localhost:1/");
    let caller = common::seed_service_account(&harness.db);
    let api = api_v2_routes(harness.sender.clone());

    let response = warp::test::request()
        .method("POST")
        .path("/v2/ratings")
        .header("authorization", format!("Bearer {}", caller.id))
        .json(&rating_body("missing-note", "rater-1", "HELPFUL"))
        .reply(&api)
        .await;

    assert_eq!(response.status(), 404);
    let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body["errors"][0]["status"], "404");
}

#[tokio::test]
async fn rating_stats_aggregate_counts() {
    let harness = common::build_node("http://localhost:1/", "http://localhost:1/");
    let caller = common::seed_service_account(&harness.db);
    let note = common::seed_note(&harness.db, "guild-1");
    harness.db.upsert_rating(&note.id, "r1", HelpfulnessLevel::Helpful).unwrap();
    harness.db.upsert_rating(&note.id, "r2", HelpfulnessLevel::Helpful).unwrap();
    harness
        .db
        .upsert_rating(&note.id, "r3", HelpfulnessLevel::SomewhatHelpful)
        .unwrap();

    let api = api_v2_routes(harness.sender.clone());
    let response = warp::test::request()
        .method("GET")
        .path(&format!("/v2/notes/{}/ratings/stats", note.id))
        .header("authorization", format!("Bearer {}", caller.id))
        .reply(&api)
        .await;

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body["data"]["type"], "rating-stats");
    assert_eq!(body["data"]["attributes"]["total"], 3);
    assert_eq!(body["data"]["attributes"]["helpful"], 2);
    assert_eq!(body["data"]["attributes"]["somewhat_helpful"], 1);
    assert_eq!(body["data"]["attributes"]["not_helpful"], 0);
}

#[tokio::test]
async fn list_ratings_requires_membership() {
    let harness = common::build_node("http://localhost:1/", "http://localhost:1/");
    let outsider = common::seed_member(&harness.db, "other-guild", notewell_sqlite::schemas::identity::MemberRole::Member);
    let note = common::seed_note(&harness.db, "guild-1");

    let api = api_v2_routes(harness.sender.clone());
    let response = warp::test::request()
        .method("GET")
        .path(&format!("/v2/notes/{}/ratings", note.id))
        .header("authorization", format!("Bearer {}", outsider.id))
        .reply(&api)
        .await;

    assert_eq!(response.status(), 403);
}

#[tokio::test]
async fn missing_bearer_token_is_401() {
    let harness = common::build_node("http://localhost:1/", "http://localhost:1/");
    let note = common::seed_note(&harness.db, "guild-1");
    let api = api_v2_routes(harness.sender.clone());

    let response = warp::test::request()
        .method("GET")
        .path(&format!("/v2/notes/{}/ratings", note.id))
        .reply(&api)
        .await;

    assert_eq!(response.status(), 401);
}
