use crate::network::node_error::NodeError;
use crate::scanning::relevance_filter::RelevanceFilter;
use crate::scanning::scan_types::{ScanCandidate, ScanType};
use crate::services::embedding_service::EmbeddingService;
use crate::services::moderation::ModerationClient;
use async_trait::async_trait;
use notewell_http_api::schemas::BulkScanMessage;
use notewell_sqlite::schemas::scan::FlaggedMessage;
use notewell_sqlite::SqliteManager;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, info_span, warn};

/// Messages shorter than this never reach any signal.
pub const MIN_SCAN_CONTENT_LENGTH: usize = 10;

#[async_trait]
pub trait ScanSignal: Send + Sync {
    fn scan_type(&self) -> ScanType;
    async fn candidate(&self, message: &BulkScanMessage) -> Result<Option<ScanCandidate>, NodeError>;
}

/// Similarity signal: one candidate per message from the top fact-check match
/// above the channel's threshold. Never runs the relevance check itself.
pub struct SimilaritySignal {
    embedding_service: Arc<EmbeddingService>,
    db: Arc<SqliteManager>,
    default_threshold: f32,
    score_threshold: f32,
    default_dataset_tags: Vec<String>,
    limit: usize,
}

impl SimilaritySignal {
    pub fn new(
        embedding_service: Arc<EmbeddingService>,
        db: Arc<SqliteManager>,
        default_threshold: f32,
        score_threshold: f32,
        default_dataset_tags: Vec<String>,
        limit: usize,
    ) -> Self {
        SimilaritySignal {
            embedding_service,
            db,
            default_threshold,
            score_threshold,
            default_dataset_tags,
            limit,
        }
    }
}

#[async_trait]
impl ScanSignal for SimilaritySignal {
    fn scan_type(&self) -> ScanType {
        ScanType::Similarity
    }

    async fn candidate(&self, message: &BulkScanMessage) -> Result<Option<ScanCandidate>, NodeError> {
        // Per-channel overrides win over the community defaults.
        let channel = self
            .db
            .get_monitored_channel_by_channel_id(&message.community_server_id, &message.channel_id)?;
        let (threshold, tags) = match &channel {
            Some(ch) => (ch.similarity_threshold, ch.dataset_tags.clone()),
            None => (self.default_threshold, self.default_dataset_tags.clone()),
        };

        let matches = self
            .embedding_service
            .similarity_search(
                &message.community_server_id,
                &message.content,
                &tags,
                threshold,
                self.score_threshold,
                self.limit,
            )
            .await?;

        let top = match matches.into_iter().next() {
            Some(top) => top,
            None => return Ok(None),
        };

        Ok(Some(ScanCandidate {
            message: message.clone(),
            scan_type: ScanType::Similarity,
            score: top.similarity_score,
            matched_content: top.title.clone(),
            matched_source: top.source_url.clone(),
            dataset_item_id: Some(top.item_id.clone()),
            match_data: json!({
                "item_id": top.item_id,
                "dataset_name": top.dataset_name,
                "chunk_id": top.chunk_id,
                "similarity_score": top.similarity_score,
                "fused_score": top.fused_score,
            }),
        }))
    }
}

/// Moderation signal: one candidate per message the provider flags.
pub struct ModerationSignal {
    client: Arc<ModerationClient>,
}

impl ModerationSignal {
    pub fn new(client: Arc<ModerationClient>) -> Self {
        ModerationSignal { client }
    }
}

#[async_trait]
impl ScanSignal for ModerationSignal {
    fn scan_type(&self) -> ScanType {
        ScanType::OpenAiModeration
    }

    async fn candidate(&self, message: &BulkScanMessage) -> Result<Option<ScanCandidate>, NodeError> {
        let result = self.client.moderate_text(&message.content).await?;
        if !result.flagged {
            return Ok(None);
        }
        Ok(Some(ScanCandidate {
            message: message.clone(),
            scan_type: ScanType::OpenAiModeration,
            score: result.max_score as f32,
            matched_content: result.flagged_categories.join(", "),
            matched_source: None,
            dataset_item_id: None,
            match_data: json!({
                "categories": result.categories,
                "scores": result.scores,
                "flagged_categories": result.flagged_categories,
                "max_score": result.max_score,
            }),
        }))
    }
}

/// Per-message multi-signal candidate generation followed by the unified
/// relevance filter.
pub struct ScanPipeline {
    db: Arc<SqliteManager>,
    signals: Vec<Arc<dyn ScanSignal>>,
    relevance_filter: Arc<RelevanceFilter>,
}

impl ScanPipeline {
    pub fn new(db: Arc<SqliteManager>, signals: Vec<Arc<dyn ScanSignal>>, relevance_filter: Arc<RelevanceFilter>) -> Self {
        ScanPipeline {
            db,
            signals,
            relevance_filter,
        }
    }

    /// Runs the enabled signals over the messages, filters the candidates for
    /// verifiable claims, persists flagged results under `scan_id`, and
    /// returns them. `scan_types = None` enables every configured signal; an
    /// empty slice disables them all.
    pub async fn process_messages(
        &self,
        scan_id: &str,
        messages: &[BulkScanMessage],
        scan_types: Option<&[ScanType]>,
    ) -> Result<Vec<FlaggedMessage>, NodeError> {
        let (flagged, _scores) = self.process_messages_inner(scan_id, messages, scan_types, false).await?;
        Ok(flagged)
    }

    /// Debug-mode variant: identical filtering, plus the per-message top
    /// signal scores for diagnostics.
    pub async fn process_messages_with_scores(
        &self,
        scan_id: &str,
        messages: &[BulkScanMessage],
        scan_types: Option<&[ScanType]>,
    ) -> Result<(Vec<FlaggedMessage>, Vec<(String, f32)>), NodeError> {
        self.process_messages_inner(scan_id, messages, scan_types, true).await
    }

    async fn process_messages_inner(
        &self,
        scan_id: &str,
        messages: &[BulkScanMessage],
        scan_types: Option<&[ScanType]>,
        debug_scores: bool,
    ) -> Result<(Vec<FlaggedMessage>, Vec<(String, f32)>), NodeError> {
        let span = info_span!(
            "scan.process_messages",
            scan_id = %scan_id,
            message_count = messages.len(),
            candidate_count = tracing::field::Empty,
            flagged_count = tracing::field::Empty,
        );

        let enabled: Vec<Arc<dyn ScanSignal>> = match scan_types {
            Some(types) => self
                .signals
                .iter()
                .filter(|s| types.contains(&s.scan_type()))
                .cloned()
                .collect(),
            None => self.signals.clone(),
        };

        let mut candidates: Vec<ScanCandidate> = Vec::new();
        let mut scores: Vec<(String, f32)> = Vec::new();
        for message in messages {
            if message.content.len() < MIN_SCAN_CONTENT_LENGTH {
                continue;
            }
            for signal in &enabled {
                match signal.candidate(message).await {
                    Ok(Some(candidate)) => {
                        if debug_scores {
                            scores.push((message.message_id.clone(), candidate.score));
                        }
                        candidates.push(candidate);
                    }
                    Ok(None) => {}
                    Err(error) => {
                        // A failing signal skips its candidate only; the scan
                        // carries on.
                        warn!(
                            message_id = %message.message_id,
                            scan_type = %signal.scan_type(),
                            %error,
                            "scan signal failed"
                        );
                    }
                }
            }
        }
        span.record("candidate_count", candidates.len());

        let flagged = self.filter_candidates_with_relevance(scan_id, candidates).await?;
        span.record("flagged_count", flagged.len());
        Ok((flagged, scores))
    }

    /// Applies the relevance filter to every candidate, independent of which
    /// signal produced it. Check failures drop the candidate, never the scan.
    async fn filter_candidates_with_relevance(
        &self,
        scan_id: &str,
        candidates: Vec<ScanCandidate>,
    ) -> Result<Vec<FlaggedMessage>, NodeError> {
        let candidates_count = candidates.len();
        let mut flagged: Vec<FlaggedMessage> = Vec::new();
        let mut filtered_count = 0usize;

        for candidate in candidates {
            let decision = self
                .relevance_filter
                .check(&candidate.message.content, &candidate.matched_content)
                .await;

            match decision {
                Ok(decision) if decision.is_relevant => {
                    let message = FlaggedMessage {
                        message_id: candidate.message.message_id.clone(),
                        channel_id: candidate.message.channel_id.clone(),
                        content: candidate.message.content.clone(),
                        author_id: candidate.message.author_id.clone(),
                        timestamp: candidate.message.timestamp.clone(),
                        scan_type: candidate.scan_type.to_string(),
                        match_score: candidate.score,
                        matched_claim: candidate.matched_content.clone(),
                        matched_source: candidate.matched_source.clone(),
                        dataset_item_id: candidate.dataset_item_id.clone(),
                    };
                    self.db.push_flagged_message(scan_id, &message)?;
                    flagged.push(message);
                }
                Ok(decision) => {
                    filtered_count += 1;
                    info!(
                        message_id = %candidate.message.message_id,
                        scan_type = %candidate.scan_type,
                        reasoning = %decision.reasoning,
                        "candidate filtered by relevance check"
                    );
                }
                Err(error) => {
                    filtered_count += 1;
                    warn!(
                        message_id = %candidate.message.message_id,
                        %error,
                        "relevance check failed, dropping candidate"
                    );
                }
            }
        }

        info!(
            scan_id = %scan_id,
            candidates_count,
            flagged_count = flagged.len(),
            filtered_count,
            "Relevance filtering complete"
        );
        Ok(flagged)
    }
}
