mod auth;
mod network;
mod previously_seen;
mod scanning;
mod scoring;
mod services;
mod utils;
mod workflows;

use auth::authorizer::Authorizer;
use network::node::Node;
use notewell_chunking::SemanticChunker;
use notewell_embedding::embedding_generator::RemoteEmbeddingGenerator;
use notewell_embedding::model_type::EmbeddingModelType;
use notewell_http_api::api_v2::api_v2_router::api_v2_routes;
use notewell_sqlite::SqliteManager;
use previously_seen::cache::{PreviouslySeenCache, PreviouslySeenDefaults};
use scanning::relevance_filter::RelevanceFilter;
use scanning::scan_pipeline::{ModerationSignal, ScanPipeline, ScanSignal, SimilaritySignal};
use scoring::mf_adapter::CommunityDataProvider;
use scoring::scorer_factory::{ScorerFactory, ScoringSettings};
use services::embedding_service::EmbeddingService;
use services::llm_client::LlmClient;
use services::moderation::ModerationClient;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use utils::environment::fetch_node_environment;
use workflows::batch_job_adapter::BatchJobAdapter;
use workflows::engine::{WorkflowEngine, WorkflowEngineSettings};
use workflows::note_writer::NoteWriter;
use workflows::outbox_publisher::{LoggingEventSink, OutboxPublisher};
use workflows::token_gate::TokenGate;

use crate::network::node_error::NodeError;

/// Community data access for the MF scorer, backed by the node database.
struct SqliteDataProvider {
    db: Arc<SqliteManager>,
}

impl CommunityDataProvider for SqliteDataProvider {
    fn get_all_ratings(&self, community_server_id: &str) -> Result<Vec<(String, String, f64)>, NodeError> {
        let ratings = self.db.get_ratings_for_community(community_server_id)?;
        Ok(ratings
            .into_iter()
            .map(|r| (r.note_id, r.rater_id, r.helpfulness_level.value()))
            .collect())
    }

    fn get_all_notes(&self, community_server_id: &str) -> Result<Vec<(String, String)>, NodeError> {
        let notes = self.db.get_notes_for_community(community_server_id)?;
        Ok(notes.into_iter().map(|n| (n.id, n.status.as_str().to_string())).collect())
    }

    fn get_all_participants(&self, community_server_id: &str) -> Result<Vec<String>, NodeError> {
        Ok(self.db.get_participant_ids(community_server_id)?)
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("notewell_node=info".parse().expect("valid directive")))
        .init();

    let settings = fetch_node_environment();
    info!(api = %settings.api_listen_address, db = %settings.db_path, "starting notewell node");

    if let Some(parent) = std::path::Path::new(&settings.db_path).parent() {
        std::fs::create_dir_all(parent).expect("failed to create storage directory");
    }
    let db = Arc::new(SqliteManager::new(&settings.db_path).expect("failed to open database"));

    let model_type = EmbeddingModelType::from_str(&settings.embedding_model).expect("unknown embedding model");
    let generator = RemoteEmbeddingGenerator::new(
        model_type,
        &settings.embeddings_server_url,
        settings.embeddings_server_api_key.clone(),
    );
    let embedding_service = Arc::new(EmbeddingService::new(db.clone(), Box::new(generator)));

    let chunker = Arc::new(SemanticChunker::default());

    let llm = Arc::new(LlmClient::new(
        &settings.llm_server_url,
        settings.llm_server_api_key.clone(),
        &settings.relevance_check_model,
        settings.relevance_check_timeout_secs,
    ));
    let relevance_filter = Arc::new(RelevanceFilter::new(llm.clone(), settings.relevance_check_enabled));
    let moderation = Arc::new(ModerationClient::new(
        &settings.moderation_server_url,
        settings.moderation_server_api_key.clone(),
        settings.relevance_check_timeout_secs,
    ));

    let signals: Vec<Arc<dyn ScanSignal>> = vec![
        Arc::new(SimilaritySignal::new(
            embedding_service.clone(),
            db.clone(),
            settings.similarity_default_threshold,
            settings.similarity_score_threshold,
            vec!["snopes".to_string()],
            settings.similarity_search_limit,
        )),
        Arc::new(ModerationSignal::new(moderation)),
    ];
    let scan_pipeline = Arc::new(ScanPipeline::new(db.clone(), signals, relevance_filter));

    let previously_seen_cache = Arc::new(PreviouslySeenCache::new(
        db.clone(),
        embedding_service.clone(),
        PreviouslySeenDefaults {
            autopublish_threshold: settings.previously_seen_autopublish_threshold,
            autorequest_threshold: settings.previously_seen_autorequest_threshold,
            top_k: settings.previously_seen_top_k,
        },
    ));

    let data_provider: Arc<dyn CommunityDataProvider> = Arc::new(SqliteDataProvider { db: db.clone() });
    let scorer_factory = Arc::new(ScorerFactory::new(
        Some(data_provider),
        ScoringSettings {
            prior_mean: settings.bayesian_prior_mean,
            prior_strength: settings.bayesian_prior_strength,
            min_ratings: settings.min_ratings_needed,
        },
    ));

    let adapter = Arc::new(BatchJobAdapter::new(db.clone()));
    let token_gate = Arc::new(TokenGate::new(settings.token_pool_capacity));
    let note_writer = Arc::new(NoteWriter::new(
        db.clone(),
        Arc::new(LlmClient::new(
            &settings.llm_server_url,
            settings.llm_server_api_key.clone(),
            &settings.ai_note_writer_model,
            settings.relevance_check_timeout_secs,
        )),
        token_gate.clone(),
        settings.ai_note_writing_enabled,
    ));
    let workflow_engine = Arc::new(WorkflowEngine::new(
        db.clone(),
        adapter,
        chunker,
        embedding_service.clone(),
        scorer_factory.clone(),
        token_gate,
        WorkflowEngineSettings {
            worker_concurrency: settings.queue_worker_concurrency,
            global_concurrency: settings.queue_global_concurrency,
            breaker_threshold: settings.circuit_breaker_threshold,
            progress_batch: settings.progress_update_batch,
            min_ratings: settings.min_ratings_needed,
        },
    ));

    let authorizer = Arc::new(Authorizer::new(
        db.clone(),
        settings.service_account_email_domains.clone(),
        settings.service_account_username_prefixes.clone(),
    ));

    let outbox = Arc::new(OutboxPublisher::new(db.clone(), Arc::new(LoggingEventSink)));
    let _outbox_handle = outbox.start();

    let (commands_sender, commands_receiver) = async_channel::bounded(256);
    let node = Arc::new(Node::new(
        settings.clone(),
        db,
        authorizer,
        embedding_service,
        previously_seen_cache,
        scan_pipeline,
        scorer_factory,
        workflow_engine,
        note_writer,
        commands_receiver,
    ));

    let api_address = settings.api_listen_address;
    let api = tokio::spawn(async move {
        warp::serve(api_v2_routes(commands_sender)).run(api_address).await;
    });

    let node_loop = tokio::spawn(node.run());

    let _ = tokio::join!(api, node_loop);
}
