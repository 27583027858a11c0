pub mod audit_log_manager;
pub mod batch_job_manager;
pub mod errors;
pub mod fact_check_manager;
pub mod identity_manager;
pub mod message_archive_manager;
pub mod monitored_channel_manager;
pub mod note_manager;
pub mod outbox_manager;
pub mod previously_seen_manager;
pub mod request_manager;
pub mod scan_manager;
pub mod schemas;
pub mod workflow_queue_manager;

pub use errors::SqliteManagerError;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use std::path::Path;

/// The node's persistence layer. One pooled SQLite database holds every row
/// the core mutates; each domain gets its own `impl SqliteManager` file.
pub struct SqliteManager {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteManager {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, SqliteManagerError> {
        let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = 5000;",
            )
        });
        let pool = Pool::builder().max_size(16).build(manager)?;

        let db = SqliteManager { pool };
        db.initialize_tables()?;
        Ok(db)
    }

    pub fn get_connection(
        &self,
    ) -> Result<r2d2::PooledConnection<SqliteConnectionManager>, SqliteManagerError> {
        Ok(self.pool.get()?)
    }

    fn initialize_tables(&self) -> Result<(), SqliteManagerError> {
        let conn = self.get_connection()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS user_profiles (
                id TEXT PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                email TEXT,
                is_service_account INTEGER NOT NULL DEFAULT 0,
                is_platform_admin INTEGER NOT NULL DEFAULT 0,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS community_members (
                id TEXT PRIMARY KEY,
                community_server_id TEXT NOT NULL,
                profile_id TEXT NOT NULL,
                role TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                banned_at TEXT,
                created_at TEXT NOT NULL,
                UNIQUE (community_server_id, profile_id)
            );

            CREATE TABLE IF NOT EXISTS fact_check_items (
                id TEXT PRIMARY KEY,
                dataset_name TEXT NOT NULL,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                rating TEXT,
                source_url TEXT,
                dataset_tags TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS fact_check_chunks (
                id TEXT PRIMARY KEY,
                item_id TEXT NOT NULL REFERENCES fact_check_items(id) ON DELETE CASCADE,
                chunk_index INTEGER NOT NULL,
                text TEXT NOT NULL,
                start_offset INTEGER NOT NULL,
                end_offset INTEGER NOT NULL,
                embedding BLOB NOT NULL,
                provider TEXT NOT NULL,
                model TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_fact_check_chunks_item ON fact_check_chunks(item_id);

            CREATE TABLE IF NOT EXISTS notes (
                id TEXT PRIMARY KEY,
                community_server_id TEXT NOT NULL,
                author_id TEXT NOT NULL,
                summary TEXT NOT NULL,
                classification TEXT NOT NULL,
                status TEXT NOT NULL,
                helpfulness_score INTEGER NOT NULL DEFAULT 0,
                request_id TEXT,
                ai_generated INTEGER NOT NULL DEFAULT 0,
                ai_provider TEXT,
                force_published INTEGER NOT NULL DEFAULT 0,
                deleted_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_notes_community ON notes(community_server_id);

            CREATE TABLE IF NOT EXISTS ratings (
                id TEXT PRIMARY KEY,
                note_id TEXT NOT NULL REFERENCES notes(id) ON DELETE CASCADE,
                rater_id TEXT NOT NULL,
                helpfulness_level TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (note_id, rater_id)
            );

            CREATE TABLE IF NOT EXISTS requests (
                id TEXT PRIMARY KEY,
                request_id TEXT NOT NULL UNIQUE,
                community_server_id TEXT NOT NULL,
                requested_by TEXT NOT NULL,
                content TEXT NOT NULL,
                dataset_item_id TEXT,
                similarity_score REAL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_requests_community ON requests(community_server_id);

            CREATE TABLE IF NOT EXISTS message_archives (
                id TEXT PRIMARY KEY,
                community_server_id TEXT NOT NULL,
                platform_message_id TEXT NOT NULL,
                channel_id TEXT NOT NULL,
                author_id TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS previously_seen_messages (
                id TEXT PRIMARY KEY,
                community_server_id TEXT NOT NULL,
                original_message_id TEXT NOT NULL,
                published_note_id TEXT,
                embedding BLOB NOT NULL,
                provider TEXT NOT NULL,
                model TEXT NOT NULL,
                extra_metadata TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL,
                UNIQUE (community_server_id, original_message_id)
            );
            CREATE INDEX IF NOT EXISTS idx_previously_seen_community
                ON previously_seen_messages(community_server_id);

            CREATE TABLE IF NOT EXISTS monitored_channels (
                id TEXT PRIMARY KEY,
                community_server_id TEXT NOT NULL,
                channel_id TEXT NOT NULL UNIQUE,
                enabled INTEGER NOT NULL DEFAULT 1,
                similarity_threshold REAL NOT NULL,
                dataset_tags TEXT NOT NULL,
                previously_seen_autopublish_threshold REAL,
                previously_seen_autorequest_threshold REAL,
                updated_by TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS batch_jobs (
                id TEXT PRIMARY KEY,
                workflow_id TEXT NOT NULL UNIQUE,
                job_type TEXT NOT NULL,
                status TEXT NOT NULL,
                total_tasks INTEGER NOT NULL DEFAULT 0,
                completed_tasks INTEGER NOT NULL DEFAULT 0,
                failed_tasks INTEGER NOT NULL DEFAULT 0,
                metadata TEXT NOT NULL DEFAULT '{}',
                error_summary TEXT,
                created_at TEXT NOT NULL,
                started_at TEXT,
                finished_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_batch_jobs_type_status ON batch_jobs(job_type, status);

            CREATE TABLE IF NOT EXISTS bulk_scan_logs (
                id TEXT PRIMARY KEY,
                community_server_id TEXT NOT NULL,
                initiated_by TEXT NOT NULL,
                status TEXT NOT NULL,
                messages_scanned INTEGER NOT NULL DEFAULT 0,
                messages_flagged INTEGER NOT NULL DEFAULT 0,
                initiated_at TEXT NOT NULL,
                completed_at TEXT
            );

            CREATE TABLE IF NOT EXISTS flagged_messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                scan_id TEXT NOT NULL,
                payload TEXT NOT NULL,
                expires_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_flagged_messages_scan ON flagged_messages(scan_id);

            CREATE TABLE IF NOT EXISTS score_event_outbox (
                id TEXT PRIMARY KEY,
                note_id TEXT NOT NULL,
                payload TEXT NOT NULL,
                created_at TEXT NOT NULL,
                published_at TEXT
            );

            CREATE TABLE IF NOT EXISTS audit_logs (
                id TEXT PRIMARY KEY,
                user_id TEXT,
                action TEXT NOT NULL,
                resource TEXT NOT NULL,
                resource_id TEXT,
                details TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS workflow_queues (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                queue_name TEXT NOT NULL,
                workflow_id TEXT NOT NULL UNIQUE,
                payload TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_workflow_queues_name ON workflow_queues(queue_name);",
        )?;
        Ok(())
    }

    /// Serializes an embedding into the little-endian f32 BLOB layout used by
    /// every vector column.
    pub fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
        bytemuck::cast_slice(embedding).to_vec()
    }

    /// Inverse of [`Self::embedding_to_blob`]. Copies so callers never depend
    /// on BLOB alignment.
    pub fn blob_to_embedding(blob: &[u8]) -> Result<Vec<f32>, SqliteManagerError> {
        if blob.len() % 4 != 0 {
            return Err(SqliteManagerError::UnsupportedEmbeddingLength(blob.len()));
        }
        Ok(bytemuck::pod_collect_to_vec(blob))
    }

    /// Cosine similarity between two vectors; 0.0 when either is degenerate.
    pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        if a.len() != b.len() || a.is_empty() {
            return 0.0;
        }
        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;
        for (x, y) in a.iter().zip(b.iter()) {
            dot += x * y;
            norm_a += x * x;
            norm_b += y * y;
        }
        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }
        dot / (norm_a.sqrt() * norm_b.sqrt())
    }

    /// Fixed-width RFC 3339 so stored timestamps compare lexicographically.
    pub fn now_rfc3339() -> String {
        chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
    }
}
