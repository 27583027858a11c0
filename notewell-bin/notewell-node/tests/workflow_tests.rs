mod common;

use async_trait::async_trait;
use notewell_chunking::SemanticChunker;
use notewell_embedding::embedding_errors::EmbeddingError;
use notewell_embedding::embedding_generator::EmbeddingGenerator;
use notewell_embedding::model_type::{EmbeddingModelType, OpenAITextEmbedding};
use notewell_http_api::api_v2::api_v2_router::api_v2_routes;
use notewell_node::scoring::scorer_factory::{ScorerFactory, ScoringSettings};
use notewell_node::services::embedding_service::EmbeddingService;
use notewell_node::workflows::batch_job_adapter::BatchJobAdapter;
use notewell_node::workflows::engine::WorkflowContext;
use notewell_node::workflows::rechunk_workflow::run_rechunk_fact_check;
use notewell_sqlite::schemas::batch_job::BatchJobStatus;
use notewell_sqlite::schemas::fact_check::FactCheckItem;
use notewell_sqlite::SqliteManager;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

#[derive(Clone)]
struct FailingGenerator;

#[async_trait]
impl EmbeddingGenerator for FailingGenerator {
    fn model_type(&self) -> EmbeddingModelType {
        EmbeddingModelType::OpenAITextEmbedding(OpenAITextEmbedding::TextEmbedding3Small)
    }

    fn box_clone(&self) -> Box<dyn EmbeddingGenerator> {
        Box::new(self.clone())
    }

    async fn generate_embedding(&self, _input: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::ProviderUnavailable("embedding server down".to_string()))
    }

    async fn generate_embeddings(&self, _inputs: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Err(EmbeddingError::ProviderUnavailable("embedding server down".to_string()))
    }
}

fn seed_items(db: &SqliteManager, count: usize) {
    for i in 0..count {
        db.add_fact_check_item(&FactCheckItem {
            id: Uuid::new_v4().to_string(),
            dataset_name: "snopes".to_string(),
            title: format!("Claim {}", i),
            content: format!("A long enough body for claim number {}.", i),
            rating: None,
            source_url: None,
            dataset_tags: vec!["snopes".to_string()],
            created_at: SqliteManager::now_rfc3339(),
        })
        .unwrap();
    }
}

#[tokio::test]
async fn s5_rechunk_dispatch_conflicts_with_active_job_of_same_type() {
    let harness = common::build_node("http://localhost:1/", "http://localhost:1/");
    let caller = common::seed_service_account(&harness.db);

    // A non-terminal job of the same type is already in the ledger.
    let active = harness
        .db
        .create_batch_job("wf-active", "rechunk:fact_check", 5, serde_json::json!({}))
        .unwrap();

    let api = api_v2_routes(harness.sender.clone());
    let response = warp::test::request()
        .method("POST")
        .path("/v2/chunks/fact-check/rechunk")
        .header("authorization", format!("Bearer {}", caller.id))
        .reply(&api)
        .await;

    assert_eq!(response.status(), 429);
    let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
    let detail = body["errors"][0]["detail"].as_str().unwrap();
    assert!(detail.contains("rechunk:fact_check"), "detail: {}", detail);
    assert!(detail.contains(&active.id), "detail: {}", detail);

    // The rejected dispatch created no new row.
    assert_eq!(harness.db.list_batch_jobs(None).unwrap().len(), 1);
}

#[tokio::test]
async fn s6_circuit_breaker_aborts_after_consecutive_failures() {
    let dir = TempDir::new().unwrap();
    let db = Arc::new(SqliteManager::new(dir.path().join("circuit.db")).unwrap());
    seed_items(&db, 10);

    let adapter = Arc::new(BatchJobAdapter::new(db.clone()));
    let job_id = adapter
        .create_for_workflow("wf-circuit", "rechunk:fact_check", 10, serde_json::json!({}))
        .unwrap();
    adapter.update_status(&job_id, BatchJobStatus::InProgress);

    let ctx = WorkflowContext {
        db: db.clone(),
        adapter: adapter.clone(),
        chunker: Arc::new(SemanticChunker::default()),
        embedding_service: Arc::new(EmbeddingService::new(db.clone(), Box::new(FailingGenerator))),
        scorer_factory: Arc::new(ScorerFactory::new(None, ScoringSettings::default())),
        breaker_threshold: 5,
        progress_batch: 10,
        min_ratings: 5,
        workflow_id: "wf-circuit".to_string(),
        batch_job_id: job_id.clone(),
        cancel_flag: Arc::new(AtomicBool::new(false)),
    };

    let outcome = run_rechunk_fact_check(&ctx).await;
    assert!(!outcome.success);
    assert_eq!(outcome.completed, 0);
    assert_eq!(outcome.failed, 5);
    let summary = outcome.error_summary.clone().unwrap();
    assert_eq!(summary["stage"], "circuit_open");
    assert_eq!(summary["error_type"], "CircuitOpenError");

    adapter.finalize_job(&job_id, false, outcome.completed, outcome.failed, outcome.error_summary);
    let job = db.get_batch_job(&job_id).unwrap().unwrap();
    assert_eq!(job.status, BatchJobStatus::Failed);
    assert_eq!(job.completed_tasks, 0);
    assert_eq!(job.failed_tasks, 5);
    assert_eq!(job.error_summary.unwrap()["stage"], "circuit_open");
}

#[tokio::test]
async fn rechunk_dispatch_runs_to_completion() {
    let harness = common::build_node("http://localhost:1/", "http://localhost:1/");
    let caller = common::seed_service_account(&harness.db);
    seed_items(&harness.db, 3);

    let api = api_v2_routes(harness.sender.clone());
    let response = warp::test::request()
        .method("POST")
        .path("/v2/chunks/fact-check/rechunk")
        .header("authorization", format!("Bearer {}", caller.id))
        .reply(&api)
        .await;
    assert_eq!(response.status(), 201);
    let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body["data"]["type"], "batch-jobs");
    assert_eq!(body["data"]["attributes"]["job_type"], "rechunk:fact_check");
    assert_eq!(body["data"]["attributes"]["total_tasks"], 3);
    let job_id = body["data"]["id"].as_str().unwrap().to_string();

    // The mock generator embeds everything, so the run completes.
    for _ in 0..100 {
        let job = harness.db.get_batch_job(&job_id).unwrap().unwrap();
        if job.status.is_terminal() {
            assert_eq!(job.status, BatchJobStatus::Completed);
            assert_eq!(job.completed_tasks, 3);
            assert_eq!(job.failed_tasks, 0);
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    panic!("rechunk job never reached a terminal state");
}

#[tokio::test]
async fn cancel_terminal_task_requires_force() {
    let harness = common::build_node("http://localhost:1/", "http://localhost:1/");
    let caller = common::seed_service_account(&harness.db);

    let job = harness
        .db
        .create_batch_job("wf-done", "rechunk:fact_check", 1, serde_json::json!({}))
        .unwrap();
    harness.db.start_batch_job(&job.id).unwrap();
    harness.db.complete_batch_job(&job.id, 1, 0).unwrap();

    let api = api_v2_routes(harness.sender.clone());
    let without_force = warp::test::request()
        .method("DELETE")
        .path(&format!("/v2/chunks/tasks/{}", job.id))
        .header("authorization", format!("Bearer {}", caller.id))
        .reply(&api)
        .await;
    assert_eq!(without_force.status(), 400);

    let with_force = warp::test::request()
        .method("DELETE")
        .path(&format!("/v2/chunks/tasks/{}?force=true", job.id))
        .header("authorization", format!("Bearer {}", caller.id))
        .reply(&api)
        .await;
    assert_eq!(with_force.status(), 200);
}

#[tokio::test]
async fn cancel_pending_task_transitions_to_cancelled() {
    let harness = common::build_node("http://localhost:1/", "http://localhost:1/");
    let caller = common::seed_service_account(&harness.db);

    let job = harness
        .db
        .create_batch_job("wf-pending", "rechunk:previously_seen", 4, serde_json::json!({}))
        .unwrap();

    let api = api_v2_routes(harness.sender.clone());
    let response = warp::test::request()
        .method("DELETE")
        .path(&format!("/v2/chunks/tasks/{}", job.id))
        .header("authorization", format!("Bearer {}", caller.id))
        .reply(&api)
        .await;
    assert_eq!(response.status(), 200);

    let cancelled = harness.db.get_batch_job(&job.id).unwrap().unwrap();
    assert_eq!(cancelled.status, BatchJobStatus::Cancelled);
}

#[tokio::test]
async fn cancel_unknown_task_is_404() {
    let harness = common::build_node("http://localhost:1/", "http://localhost:1/");
    let caller = common::seed_service_account(&harness.db);

    let api = api_v2_routes(harness.sender.clone());
    let response = warp::test::request()
        .method("DELETE")
        .path("/v2/chunks/tasks/not-a-task")
        .header("authorization", format!("Bearer {}", caller.id))
        .reply(&api)
        .await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn list_chunk_tasks_filters_by_status() {
    let harness = common::build_node("http://localhost:1/", "http://localhost:1/");
    let caller = common::seed_service_account(&harness.db);

    let pending = harness
        .db
        .create_batch_job("wf-a", "rechunk:fact_check", 1, serde_json::json!({}))
        .unwrap();
    let done = harness
        .db
        .create_batch_job("wf-b", "rechunk:previously_seen", 1, serde_json::json!({}))
        .unwrap();
    harness.db.start_batch_job(&done.id).unwrap();
    harness.db.complete_batch_job(&done.id, 1, 0).unwrap();

    let api = api_v2_routes(harness.sender.clone());
    let response = warp::test::request()
        .method("GET")
        .path("/v2/chunks/tasks?status=pending")
        .header("authorization", format!("Bearer {}", caller.id))
        .reply(&api)
        .await;
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["id"], serde_json::json!(pending.id));
}
