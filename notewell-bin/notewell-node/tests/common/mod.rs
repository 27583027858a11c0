#![allow(dead_code)]

use notewell_embedding::embedding_generator::EmbeddingGenerator;
use notewell_embedding::mock_generator::MockGenerator;
use notewell_embedding::model_type::{EmbeddingModelType, OpenAITextEmbedding};
use notewell_http_api::node_commands::NodeCommand;
use notewell_node::auth::authorizer::Authorizer;
use notewell_node::network::node::Node;
use notewell_node::previously_seen::cache::{PreviouslySeenCache, PreviouslySeenDefaults};
use notewell_node::scanning::relevance_filter::RelevanceFilter;
use notewell_node::scanning::scan_pipeline::{ModerationSignal, ScanPipeline, ScanSignal, SimilaritySignal};
use notewell_node::scoring::mf_adapter::CommunityDataProvider;
use notewell_node::scoring::scorer_factory::{ScorerFactory, ScoringSettings};
use notewell_node::services::embedding_service::EmbeddingService;
use notewell_node::services::llm_client::LlmClient;
use notewell_node::services::moderation::ModerationClient;
use notewell_node::network::node_error::NodeError;
use notewell_node::utils::environment::NodeEnvironment;
use notewell_node::workflows::batch_job_adapter::BatchJobAdapter;
use notewell_node::workflows::engine::{WorkflowEngine, WorkflowEngineSettings};
use notewell_node::workflows::note_writer::NoteWriter;
use notewell_node::workflows::token_gate::TokenGate;
use notewell_sqlite::schemas::identity::{CommunityMember, MemberRole, UserProfile};
use notewell_sqlite::schemas::note::{Note, NoteClassification, NoteStatus};
use notewell_sqlite::SqliteManager;
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

pub const MOCK_EMBEDDING_DIMS: usize = 64;

pub fn test_environment(llm_url: &str, moderation_url: &str) -> NodeEnvironment {
    NodeEnvironment {
        api_listen_address: "127.0.0.1:0".parse().unwrap(),
        db_path: String::new(),
        embeddings_server_url: "http://localhost:0/".to_string(),
        embeddings_server_api_key: None,
        embedding_model: "text-embedding-3-small".to_string(),
        llm_server_url: llm_url.to_string(),
        llm_server_api_key: None,
        relevance_check_model: "gpt-5-mini".to_string(),
        relevance_check_enabled: true,
        relevance_check_timeout_secs: 5,
        ai_note_writing_enabled: false,
        ai_note_writer_model: "gpt-5-mini".to_string(),
        moderation_server_url: moderation_url.to_string(),
        moderation_server_api_key: None,
        similarity_default_threshold: 0.6,
        similarity_score_threshold: 0.1,
        similarity_search_limit: 5,
        previously_seen_autopublish_threshold: 0.9,
        previously_seen_autorequest_threshold: 0.75,
        previously_seen_top_k: 5,
        min_ratings_needed: 5,
        bayesian_prior_mean: 0.5,
        bayesian_prior_strength: 5.0,
        circuit_breaker_threshold: 5,
        progress_update_batch: 10,
        queue_worker_concurrency: 2,
        queue_global_concurrency: 4,
        token_pool_capacity: 16,
        service_account_email_domains: vec!["svc.notewell.internal".to_string()],
        service_account_username_prefixes: vec!["svc-".to_string()],
    }
}

pub struct SqliteDataProvider {
    pub db: Arc<SqliteManager>,
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

pub struct TestHarness {
    pub _dir: TempDir,
    pub db: Arc<SqliteManager>,
    pub node: Arc<Node>,
    pub sender: async_channel::Sender<NodeCommand>,
}

/// Builds a full node wired to a mock embedding generator and the given LLM /
/// moderation endpoints, and starts the command loop.
pub fn build_node(llm_url: &str, moderation_url: &str) -> TestHarness {
    let dir = TempDir::new().unwrap();
    let db = Arc::new(SqliteManager::new(dir.path().join("node.db")).unwrap());
    let settings = test_environment(llm_url, moderation_url);

    let generator = MockGenerator::new(
        EmbeddingModelType::OpenAITextEmbedding(OpenAITextEmbedding::TextEmbedding3Small),
        MOCK_EMBEDDING_DIMS,
    );
    let embedding_service = Arc::new(EmbeddingService::new(db.clone(), generator.box_clone()));
    let chunker = Arc::new(notewell_chunking::SemanticChunker::default());

    let llm = Arc::new(LlmClient::new(
        &settings.llm_server_url,
        None,
        &settings.relevance_check_model,
        settings.relevance_check_timeout_secs,
    ));
    let relevance_filter = Arc::new(RelevanceFilter::new(llm, settings.relevance_check_enabled));
    let moderation = Arc::new(ModerationClient::new(&settings.moderation_server_url, None, 5));

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
            None,
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

    let (sender, receiver) = async_channel::bounded(64);
    let node = Arc::new(Node::new(
        settings,
        db.clone(),
        authorizer,
        embedding_service,
        previously_seen_cache,
        scan_pipeline,
        scorer_factory,
        workflow_engine,
        note_writer,
        receiver,
    ));
    tokio::spawn(node.clone().run());

    TestHarness {
        _dir: dir,
        db,
        node,
        sender,
    }
}

pub fn seed_service_account(db: &SqliteManager) -> UserProfile {
    let profile = UserProfile {
        id: Uuid::new_v4().to_string(),
        username: format!("svc-test-{}", Uuid::new_v4()),
        email: None,
        is_service_account: true,
        is_platform_admin: false,
        is_active: true,
        created_at: SqliteManager::now_rfc3339(),
    };
    db.add_user_profile(&profile).unwrap();
    profile
}

pub fn seed_member(db: &SqliteManager, community: &str, role: MemberRole) -> UserProfile {
    let profile = UserProfile {
        id: Uuid::new_v4().to_string(),
        username: format!("user-{}", Uuid::new_v4()),
        email: None,
        is_service_account: false,
        is_platform_admin: false,
        is_active: true,
        created_at: SqliteManager::now_rfc3339(),
    };
    db.add_user_profile(&profile).unwrap();
    db.add_community_member(&CommunityMember {
        id: Uuid::new_v4().to_string(),
        community_server_id: community.to_string(),
        profile_id: profile.id.clone(),
        role,
        is_active: true,
        banned_at: None,
        created_at: SqliteManager::now_rfc3339(),
    })
    .unwrap();
    profile
}

pub fn seed_note(db: &SqliteManager, community: &str) -> Note {
    let now = SqliteManager::now_rfc3339();
    let note = Note {
        id: Uuid::new_v4().to_string(),
        community_server_id: community.to_string(),
        author_id: Uuid::new_v4().to_string(),
        summary: "Adds missing context to the claim".to_string(),
        classification: NoteClassification::NotMisleading,
        status: NoteStatus::NeedsMoreRatings,
        helpfulness_score: 0,
        request_id: None,
        ai_generated: false,
        ai_provider: None,
        force_published: false,
        created_at: now.clone(),
        updated_at: now,
    };
    db.add_note(&note).unwrap();
    note
}
