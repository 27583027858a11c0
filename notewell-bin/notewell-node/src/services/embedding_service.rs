use crate::network::node_error::NodeError;
use notewell_embedding::embedding_generator::EmbeddingGenerator;
use notewell_sqlite::schemas::fact_check::FactCheckMatch;
use notewell_sqlite::SqliteManager;
use std::sync::Arc;
use tracing::{info_span, Instrument};

/// A generated embedding together with the provider identity that produced
/// it, persisted alongside every stored vector.
#[derive(Debug, Clone)]
pub struct GeneratedEmbedding {
    pub vector: Vec<f32>,
    pub provider: String,
    pub model: String,
}

/// Wraps the embedding generator and the similarity index behind the node's
/// tracing conventions.
pub struct EmbeddingService {
    db: Arc<SqliteManager>,
    generator: Box<dyn EmbeddingGenerator>,
}

impl EmbeddingService {
    pub fn new(db: Arc<SqliteManager>, generator: Box<dyn EmbeddingGenerator>) -> Self {
        EmbeddingService { db, generator }
    }

    /// Generates an embedding for `text`, recording the text length on the
    /// span. Fails with `ProviderUnavailable` when the provider cannot be
    /// reached after retries.
    pub async fn generate_embedding(
        &self,
        community_server_id: &str,
        text: &str,
    ) -> Result<GeneratedEmbedding, NodeError> {
        let span = info_span!(
            "embedding.generate",
            community_server_id = %community_server_id,
            text_length = text.len(),
        );
        let model_type = self.generator.model_type();
        let vector = self.generator.generate_embedding(text).instrument(span).await?;
        Ok(GeneratedEmbedding {
            vector,
            provider: model_type.provider_name().to_string(),
            model: model_type.to_string(),
        })
    }

    /// Hybrid search over the fact-check index. The top fused score is
    /// recorded on the span when the result set is non-empty.
    pub async fn similarity_search(
        &self,
        community_server_id: &str,
        query_text: &str,
        dataset_tags: &[String],
        similarity_threshold: f32,
        score_threshold: f32,
        limit: usize,
    ) -> Result<Vec<FactCheckMatch>, NodeError> {
        let span = info_span!(
            "embedding.similarity_search",
            community_server_id = %community_server_id,
            query_length = query_text.len(),
            top_score = tracing::field::Empty,
        );
        let embedding = self.generate_embedding(community_server_id, query_text).await?;
        let matches = self.db.similarity_search(
            &embedding.vector,
            query_text,
            dataset_tags,
            similarity_threshold,
            score_threshold,
            limit,
        )?;
        if let Some(top) = matches.first() {
            span.record("top_score", top.fused_score as f64);
        }
        Ok(matches)
    }
}
