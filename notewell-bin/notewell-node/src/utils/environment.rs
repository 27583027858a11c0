use std::env;
use std::net::{IpAddr, SocketAddr};

/// Runtime configuration, fetched once at startup from environment variables
/// and passed down to every component. Domain code never reads the
/// environment directly.
#[derive(Debug, Clone)]
pub struct NodeEnvironment {
    pub api_listen_address: SocketAddr,
    pub db_path: String,

    pub embeddings_server_url: String,
    pub embeddings_server_api_key: Option<String>,
    pub embedding_model: String,

    pub llm_server_url: String,
    pub llm_server_api_key: Option<String>,
    pub relevance_check_model: String,
    pub relevance_check_enabled: bool,
    pub relevance_check_timeout_secs: u64,
    pub ai_note_writing_enabled: bool,
    pub ai_note_writer_model: String,

    pub moderation_server_url: String,
    pub moderation_server_api_key: Option<String>,

    pub similarity_default_threshold: f32,
    pub similarity_score_threshold: f32,
    pub similarity_search_limit: usize,

    pub previously_seen_autopublish_threshold: f32,
    pub previously_seen_autorequest_threshold: f32,
    pub previously_seen_top_k: usize,

    pub min_ratings_needed: usize,
    pub bayesian_prior_mean: f64,
    pub bayesian_prior_strength: f64,

    pub circuit_breaker_threshold: u32,
    pub progress_update_batch: i64,
    pub queue_worker_concurrency: usize,
    pub queue_global_concurrency: usize,
    pub token_pool_capacity: u32,

    pub service_account_email_domains: Vec<String>,
    pub service_account_username_prefixes: Vec<String>,
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_list(key: &str, default: &str) -> Vec<String> {
    env_string(key, default)
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

pub fn fetch_node_environment() -> NodeEnvironment {
    let api_ip: IpAddr = env_parse("NODE_API_IP", "0.0.0.0".parse().unwrap());
    let api_port: u16 = env_parse("NODE_API_PORT", 9550);

    NodeEnvironment {
        api_listen_address: SocketAddr::new(api_ip, api_port),
        db_path: env_string("NODE_STORAGE_PATH", "storage/notewell.db"),

        embeddings_server_url: env_string("EMBEDDINGS_SERVER_URL", "https://api.openai.com/"),
        embeddings_server_api_key: env::var("EMBEDDINGS_SERVER_API_KEY").ok().filter(|s| !s.is_empty()),
        embedding_model: env_string("EMBEDDING_MODEL", "text-embedding-3-small"),

        llm_server_url: env_string("LLM_SERVER_URL", "https://api.openai.com/"),
        llm_server_api_key: env::var("LLM_SERVER_API_KEY").ok().filter(|s| !s.is_empty()),
        relevance_check_model: env_string("RELEVANCE_CHECK_MODEL", "gpt-5-mini"),
        relevance_check_enabled: env_parse("RELEVANCE_CHECK_ENABLED", true),
        relevance_check_timeout_secs: env_parse("RELEVANCE_CHECK_TIMEOUT_SECS", 10),
        ai_note_writing_enabled: env_parse("AI_NOTE_WRITING_ENABLED", false),
        ai_note_writer_model: env_string("AI_NOTE_WRITER_MODEL", "gpt-5-mini"),

        moderation_server_url: env_string("MODERATION_SERVER_URL", "https://api.openai.com/"),
        moderation_server_api_key: env::var("MODERATION_SERVER_API_KEY").ok().filter(|s| !s.is_empty()),

        similarity_default_threshold: env_parse("SIMILARITY_SEARCH_DEFAULT_THRESHOLD", 0.6),
        similarity_score_threshold: env_parse("SIMILARITY_SCORE_THRESHOLD", 0.1),
        similarity_search_limit: env_parse("SIMILARITY_SEARCH_LIMIT", 5),

        previously_seen_autopublish_threshold: env_parse("PREVIOUSLY_SEEN_AUTOPUBLISH_THRESHOLD", 0.9),
        previously_seen_autorequest_threshold: env_parse("PREVIOUSLY_SEEN_AUTOREQUEST_THRESHOLD", 0.75),
        previously_seen_top_k: env_parse("PREVIOUSLY_SEEN_TOP_K", 5),

        min_ratings_needed: env_parse("MIN_RATINGS_NEEDED", 5),
        bayesian_prior_mean: env_parse("BAYESIAN_PRIOR_MEAN", 0.5),
        bayesian_prior_strength: env_parse("BAYESIAN_PRIOR_STRENGTH", 5.0),

        circuit_breaker_threshold: env_parse("CIRCUIT_BREAKER_THRESHOLD", 5),
        progress_update_batch: env_parse("PROGRESS_UPDATE_BATCH", 10),
        queue_worker_concurrency: env_parse("QUEUE_WORKER_CONCURRENCY", 6),
        queue_global_concurrency: env_parse("QUEUE_GLOBAL_CONCURRENCY", 12),
        token_pool_capacity: env_parse("TOKEN_POOL_CAPACITY", 16),

        service_account_email_domains: env_list("SERVICE_ACCOUNT_EMAIL_DOMAINS", "svc.notewell.internal"),
        service_account_username_prefixes: env_list("SERVICE_ACCOUNT_USERNAME_PREFIXES", "svc-"),
    }
}
