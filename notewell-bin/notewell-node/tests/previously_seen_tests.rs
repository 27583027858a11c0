mod common;

use notewell_embedding::embedding_generator::EmbeddingGenerator;
use notewell_embedding::mock_generator::MockGenerator;
use notewell_embedding::model_type::{EmbeddingModelType, OpenAITextEmbedding};
use notewell_http_api::api_v2::api_v2_router::api_v2_routes;
use notewell_sqlite::schemas::identity::MemberRole;
use notewell_sqlite::schemas::monitored_channel::MonitoredChannel;
use notewell_sqlite::schemas::previously_seen::PreviouslySeenMessage;
use notewell_sqlite::SqliteManager;
use serde_json::json;
use uuid::Uuid;

/// Builds a unit vector with the requested cosine similarity to `base`.
fn vector_with_cosine(base: &[f32], cosine: f32) -> Vec<f32> {
    // Gram-Schmidt: find a unit vector orthogonal to base, then mix.
    let norm: f32 = base.iter().map(|v| v * v).sum::<f32>().sqrt();
    let unit: Vec<f32> = base.iter().map(|v| v / norm).collect();

    let mut arbitrary = vec![0.0f32; base.len()];
    arbitrary[0] = 1.0;
    let dot: f32 = arbitrary.iter().zip(unit.iter()).map(|(a, b)| a * b).sum();
    let mut ortho: Vec<f32> = arbitrary.iter().zip(unit.iter()).map(|(a, b)| a - dot * b).collect();
    let ortho_norm: f32 = ortho.iter().map(|v| v * v).sum::<f32>().sqrt();
    for v in ortho.iter_mut() {
        *v /= ortho_norm;
    }

    let residual = (1.0 - cosine * cosine).sqrt();
    unit.iter()
        .zip(ortho.iter())
        .map(|(u, o)| cosine * u + residual * o)
        .collect()
}

async fn mock_embedding_of(text: &str) -> Vec<f32> {
    MockGenerator::new(
        EmbeddingModelType::OpenAITextEmbedding(OpenAITextEmbedding::TextEmbedding3Small),
        common::MOCK_EMBEDDING_DIMS,
    )
    .generate_embedding(text)
    .await
    .unwrap()
}

fn seed_channel_with_autopublish(db: &SqliteManager, community: &str, channel_id: &str, autopublish: f32) {
    let now = SqliteManager::now_rfc3339();
    db.add_monitored_channel(&MonitoredChannel {
        id: Uuid::new_v4().to_string(),
        community_server_id: community.to_string(),
        channel_id: channel_id.to_string(),
        enabled: true,
        similarity_threshold: 0.6,
        dataset_tags: vec!["snopes".to_string()],
        previously_seen_autopublish_threshold: Some(autopublish),
        previously_seen_autorequest_threshold: None,
        updated_by: None,
        created_at: now.clone(),
        updated_at: now,
    })
    .unwrap();
}

#[tokio::test]
async fn s3_channel_override_gates_autopublish_but_not_autorequest() {
    let harness = common::build_node("http://localhost:1/", "http://localhost:1/");
    let caller = common::seed_member(&harness.db, "guild-1", MemberRole::Member);
    seed_channel_with_autopublish(&harness.db, "guild-1", "chan-1", 0.95);

    // A stored record at similarity ~0.92 to the query text.
    let query_text = "is this message a repeat of something we have seen";
    let query_embedding = mock_embedding_of(query_text).await;
    let stored_embedding = vector_with_cosine(&query_embedding, 0.92);
    harness
        .db
        .record_previously_seen(&PreviouslySeenMessage {
            id: Uuid::new_v4().to_string(),
            community_server_id: "guild-1".to_string(),
            original_message_id: "msg-original".to_string(),
            published_note_id: Some("note-published".to_string()),
            embedding: stored_embedding,
            provider: "openai".to_string(),
            model: "text-embedding-3-small".to_string(),
            extra_metadata: json!({}),
            created_at: SqliteManager::now_rfc3339(),
        })
        .unwrap();

    let api = api_v2_routes(harness.sender.clone());
    let response = warp::test::request()
        .method("POST")
        .path("/v2/previously-seen-messages/check")
        .header("authorization", format!("Bearer {}", caller.id))
        .json(&json!({
            "community_server_id": "guild-1",
            "channel_id": "chan-1",
            "message_text": query_text,
        }))
        .reply(&api)
        .await;

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
    let attributes = &body["data"]["attributes"];

    // 0.92 clears the default autorequest (0.75) but not the channel's
    // autopublish override (0.95).
    assert_eq!(attributes["should_auto_publish"], false);
    assert_eq!(attributes["should_auto_request"], true);
    assert!((attributes["autopublish_threshold"].as_f64().unwrap() - 0.95).abs() < 1e-6);
    assert!((attributes["autorequest_threshold"].as_f64().unwrap() - 0.75).abs() < 1e-6);
    let top_score = attributes["top_match"]["score"].as_f64().unwrap();
    assert!((top_score - 0.92).abs() < 0.01, "top score was {}", top_score);
}

#[tokio::test]
async fn check_without_channel_uses_community_defaults() {
    let harness = common::build_node("http://localhost:1/", "http://localhost:1/");
    let caller = common::seed_member(&harness.db, "guild-1", MemberRole::Member);

    let text = "a previously seen message body";
    let embedding = mock_embedding_of(text).await;
    harness
        .db
        .record_previously_seen(&PreviouslySeenMessage {
            id: Uuid::new_v4().to_string(),
            community_server_id: "guild-1".to_string(),
            original_message_id: "msg-1".to_string(),
            published_note_id: None,
            embedding,
            provider: "openai".to_string(),
            model: "text-embedding-3-small".to_string(),
            extra_metadata: json!({}),
            created_at: SqliteManager::now_rfc3339(),
        })
        .unwrap();

    let api = api_v2_routes(harness.sender.clone());
    let response = warp::test::request()
        .method("POST")
        .path("/v2/previously-seen-messages/check")
        .header("authorization", format!("Bearer {}", caller.id))
        .json(&json!({"community_server_id": "guild-1", "message_text": text}))
        .reply(&api)
        .await;

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
    let attributes = &body["data"]["attributes"];

    // Identical text gives cosine 1.0, clearing both defaults.
    assert_eq!(attributes["should_auto_publish"], true);
    assert_eq!(attributes["should_auto_request"], true);
    assert!((attributes["autopublish_threshold"].as_f64().unwrap() - 0.9).abs() < 1e-6);
}

#[tokio::test]
async fn matches_never_leak_across_communities() {
    let harness = common::build_node("http://localhost:1/", "http://localhost:1/");
    let caller = common::seed_member(&harness.db, "guild-2", MemberRole::Member);

    let text = "content recorded only in guild one";
    let embedding = mock_embedding_of(text).await;
    harness
        .db
        .record_previously_seen(&PreviouslySeenMessage {
            id: Uuid::new_v4().to_string(),
            community_server_id: "guild-1".to_string(),
            original_message_id: "msg-1".to_string(),
            published_note_id: None,
            embedding,
            provider: "openai".to_string(),
            model: "text-embedding-3-small".to_string(),
            extra_metadata: json!({}),
            created_at: SqliteManager::now_rfc3339(),
        })
        .unwrap();

    let api = api_v2_routes(harness.sender.clone());
    let response = warp::test::request()
        .method("POST")
        .path("/v2/previously-seen-messages/check")
        .header("authorization", format!("Bearer {}", caller.id))
        .json(&json!({"community_server_id": "guild-2", "message_text": text}))
        .reply(&api)
        .await;

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
    let attributes = &body["data"]["attributes"];
    assert_eq!(attributes["matches"].as_array().unwrap().len(), 0);
    assert_eq!(attributes["should_auto_publish"], false);
    assert_eq!(attributes["should_auto_request"], false);
}

#[tokio::test]
async fn check_unknown_community_is_404() {
    let harness = common::build_node("http://localhost:1/", "http://localhost:1/");
    let caller = common::seed_service_account(&harness.db);

    let api = api_v2_routes(harness.sender.clone());
    let response = warp::test::request()
        .method("POST")
        .path("/v2/previously-seen-messages/check")
        .header("authorization", format!("Bearer {}", caller.id))
        .json(&json!({"community_server_id": "ghost-guild", "message_text": "anything at all"}))
        .reply(&api)
        .await;

    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn record_is_idempotent_per_community_and_message() {
    let harness = common::build_node("http://localhost:1/", "http://localhost:1/");
    let caller = common::seed_member(&harness.db, "guild-1", MemberRole::Member);
    let api = api_v2_routes(harness.sender.clone());

    let body = json!({
        "data": {
            "type": "previously-seen-messages",
            "attributes": {
                "community_server_id": "guild-1",
                "original_message_id": "msg-42",
                "content": "the same repeated message",
            }
        }
    });

    let first = warp::test::request()
        .method("POST")
        .path("/v2/previously-seen-messages")
        .header("authorization", format!("Bearer {}", caller.id))
        .json(&body)
        .reply(&api)
        .await;
    assert_eq!(first.status(), 201);
    let first_body: serde_json::Value = serde_json::from_slice(first.body()).unwrap();

    let second = warp::test::request()
        .method("POST")
        .path("/v2/previously-seen-messages")
        .header("authorization", format!("Bearer {}", caller.id))
        .json(&body)
        .reply(&api)
        .await;
    assert_eq!(second.status(), 201);
    let second_body: serde_json::Value = serde_json::from_slice(second.body()).unwrap();

    assert_eq!(first_body["data"]["id"], second_body["data"]["id"]);
    assert_eq!(harness.db.get_all_previously_seen_ids("guild-1").unwrap().len(), 1);
}
