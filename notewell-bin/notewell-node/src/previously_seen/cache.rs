use crate::network::node_error::NodeError;
use crate::services::embedding_service::EmbeddingService;
use notewell_sqlite::schemas::previously_seen::{PreviouslySeenMatch, PreviouslySeenMessage};
use notewell_sqlite::SqliteManager;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Community-default thresholds when a channel carries no override.
#[derive(Debug, Clone, Copy)]
pub struct PreviouslySeenDefaults {
    pub autopublish_threshold: f32,
    pub autorequest_threshold: f32,
    pub top_k: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreviouslySeenCheckResult {
    pub matches: Vec<ScoredSeenMessage>,
    pub top_match: Option<ScoredSeenMessage>,
    pub should_auto_publish: bool,
    pub should_auto_request: bool,
    pub autopublish_threshold: f32,
    pub autorequest_threshold: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoredSeenMessage {
    pub id: String,
    pub original_message_id: String,
    pub published_note_id: Option<String>,
    pub score: f32,
}

impl From<&PreviouslySeenMatch> for ScoredSeenMessage {
    fn from(m: &PreviouslySeenMatch) -> Self {
        ScoredSeenMessage {
            id: m.record.id.clone(),
            original_message_id: m.record.original_message_id.clone(),
            published_note_id: m.record.published_note_id.clone(),
            score: m.score,
        }
    }
}

/// Embedding-keyed recognition of repeat content with per-channel auto-action
/// thresholds.
pub struct PreviouslySeenCache {
    db: Arc<SqliteManager>,
    embedding_service: Arc<EmbeddingService>,
    defaults: PreviouslySeenDefaults,
}

impl PreviouslySeenCache {
    pub fn new(db: Arc<SqliteManager>, embedding_service: Arc<EmbeddingService>, defaults: PreviouslySeenDefaults) -> Self {
        PreviouslySeenCache {
            db,
            embedding_service,
            defaults,
        }
    }

    /// Scores `message_text` against the community's previously-seen records.
    /// Matches are strictly community-scoped. Effective thresholds come from
    /// the channel override when present, else the community defaults; a NULL
    /// override means inherit, not disable.
    pub async fn check(
        &self,
        community_server_id: &str,
        channel_id: Option<&str>,
        message_text: &str,
    ) -> Result<PreviouslySeenCheckResult, NodeError> {
        let (autopublish_threshold, autorequest_threshold) = self.effective_thresholds(community_server_id, channel_id)?;

        let embedding = self
            .embedding_service
            .generate_embedding(community_server_id, message_text)
            .await?;
        let matches =
            self.db
                .previously_seen_top_matches(community_server_id, &embedding.vector, self.defaults.top_k)?;

        let scored: Vec<ScoredSeenMessage> = matches.iter().map(ScoredSeenMessage::from).collect();
        let top_match = scored.first().cloned();
        let should_auto_publish = matches.iter().any(|m| m.score >= autopublish_threshold);
        let should_auto_request = matches.iter().any(|m| m.score >= autorequest_threshold);

        info!(
            community = %community_server_id,
            matches = scored.len(),
            should_auto_publish,
            should_auto_request,
            "previously-seen check"
        );

        Ok(PreviouslySeenCheckResult {
            matches: scored,
            top_match,
            should_auto_publish,
            should_auto_request,
            autopublish_threshold,
            autorequest_threshold,
        })
    }

    /// Appends a previously-seen record, embedding the content. Re-recording
    /// the same message in the same community is idempotent.
    pub async fn record(
        &self,
        community_server_id: &str,
        original_message_id: &str,
        published_note_id: Option<String>,
        content: &str,
        extra_metadata: serde_json::Value,
    ) -> Result<PreviouslySeenMessage, NodeError> {
        let embedding = self
            .embedding_service
            .generate_embedding(community_server_id, content)
            .await?;

        let record = PreviouslySeenMessage {
            id: Uuid::new_v4().to_string(),
            community_server_id: community_server_id.to_string(),
            original_message_id: original_message_id.to_string(),
            published_note_id,
            embedding: embedding.vector,
            provider: embedding.provider,
            model: embedding.model,
            extra_metadata,
            created_at: SqliteManager::now_rfc3339(),
        };
        Ok(self.db.record_previously_seen(&record)?)
    }

    fn effective_thresholds(
        &self,
        community_server_id: &str,
        channel_id: Option<&str>,
    ) -> Result<(f32, f32), NodeError> {
        let channel = match channel_id {
            Some(channel_id) => self
                .db
                .get_monitored_channel_by_channel_id(community_server_id, channel_id)?,
            None => None,
        };
        let autopublish = channel
            .as_ref()
            .and_then(|c| c.previously_seen_autopublish_threshold)
            .unwrap_or(self.defaults.autopublish_threshold);
        let autorequest = channel
            .as_ref()
            .and_then(|c| c.previously_seen_autorequest_threshold)
            .unwrap_or(self.defaults.autorequest_threshold);
        Ok((autopublish, autorequest))
    }
}
