use crate::network::node_error::NodeError;
use crate::workflows::circuit_breaker::CircuitBreaker;
use crate::workflows::engine::{WorkflowContext, WorkflowOutcome};
use notewell_sqlite::schemas::fact_check::FactCheckChunk;
use tracing::{info, warn};
use uuid::Uuid;

/// Rechunks and re-embeds every fact-check item. Item failures are recorded
/// and skipped; the circuit breaker aborts the run after too many consecutive
/// failures.
pub async fn run_rechunk_fact_check(ctx: &WorkflowContext) -> WorkflowOutcome {
    let item_ids = match ctx.db.get_all_fact_check_item_ids() {
        Ok(ids) => ids,
        Err(err) => {
            return WorkflowOutcome::failed(0, 0, "list_items", "DatabaseError", &err.to_string());
        }
    };

    let mut breaker = CircuitBreaker::new(ctx.breaker_threshold);
    let mut completed: i64 = 0;
    let mut failed: i64 = 0;

    for (index, item_id) in item_ids.iter().enumerate() {
        if ctx.is_cancelled() {
            info!(workflow_id = %ctx.workflow_id, "rechunk cancelled at item boundary");
            return WorkflowOutcome::cancelled(completed, failed);
        }

        match process_fact_check_item(ctx, item_id).await {
            Ok(chunks_created) => {
                completed += 1;
                breaker.record_success();
                info!(item_id = %item_id, chunks_created, "rechunked fact-check item");
            }
            Err(err) => {
                failed += 1;
                warn!(item_id = %item_id, %err, "fact-check rechunk item failed");
                if let Err(open) = breaker.record_failure() {
                    return WorkflowOutcome::failed(
                        completed,
                        failed,
                        "circuit_open",
                        "CircuitOpenError",
                        &open.to_string(),
                    );
                }
            }
        }

        if (index as i64 + 1) % ctx.progress_batch == 0 {
            // Fire-and-forget progress; a failed write never fails the run.
            ctx.adapter
                .update_progress(&ctx.batch_job_id, Some(completed), Some(failed), false, false);
        }
    }

    WorkflowOutcome::completed_ok(completed, failed)
}

/// Chunk + embed one fact-check item, replacing its stored chunks. Returns
/// the number of chunks created; empty content produces zero chunks.
async fn process_fact_check_item(ctx: &WorkflowContext, item_id: &str) -> Result<usize, NodeError> {
    let item = ctx
        .db
        .get_fact_check_item(item_id)?
        .ok_or_else(|| NodeError::NotFound(format!("Fact-check item {}", item_id)))?;

    if item.content.is_empty() {
        ctx.db.replace_fact_check_chunks(item_id, &[])?;
        return Ok(0);
    }

    let text_chunks = ctx.chunker.chunk_text_with_positions(&item.content)?;
    let mut chunks = Vec::with_capacity(text_chunks.len());
    for text_chunk in text_chunks {
        let embedding = ctx
            .embedding_service
            .generate_embedding("rechunk", &text_chunk.text)
            .await?;
        chunks.push(FactCheckChunk {
            id: Uuid::new_v4().to_string(),
            item_id: item_id.to_string(),
            chunk_index: text_chunk.chunk_index as i64,
            text: text_chunk.text,
            start_offset: text_chunk.start as i64,
            end_offset: text_chunk.end as i64,
            embedding: embedding.vector,
            provider: embedding.provider,
            model: embedding.model,
        });
    }

    ctx.db.replace_fact_check_chunks(item_id, &chunks)?;
    Ok(chunks.len())
}

/// Re-embeds previously-seen records, optionally restricted to one community.
/// Records without retrievable content count as completed with zero chunks.
pub async fn run_rechunk_previously_seen(ctx: &WorkflowContext, community_server_id: Option<&str>) -> WorkflowOutcome {
    let communities = match community_server_id {
        Some(community) => vec![community.to_string()],
        None => match ctx.db.get_previously_seen_communities() {
            Ok(communities) => communities,
            Err(err) => {
                return WorkflowOutcome::failed(0, 0, "list_communities", "DatabaseError", &err.to_string());
            }
        },
    };

    let mut record_ids: Vec<String> = Vec::new();
    for community in &communities {
        match ctx.db.get_all_previously_seen_ids(community) {
            Ok(ids) => record_ids.extend(ids),
            Err(err) => {
                return WorkflowOutcome::failed(0, 0, "list_items", "DatabaseError", &err.to_string());
            }
        }
    }

    let mut breaker = CircuitBreaker::new(ctx.breaker_threshold);
    let mut completed: i64 = 0;
    let mut failed: i64 = 0;

    for (index, record_id) in record_ids.iter().enumerate() {
        if ctx.is_cancelled() {
            info!(workflow_id = %ctx.workflow_id, "previously-seen rechunk cancelled at item boundary");
            return WorkflowOutcome::cancelled(completed, failed);
        }

        match process_previously_seen_record(ctx, record_id).await {
            Ok(_) => {
                completed += 1;
                breaker.record_success();
            }
            Err(err) => {
                failed += 1;
                warn!(record_id = %record_id, %err, "previously-seen rechunk item failed");
                if let Err(open) = breaker.record_failure() {
                    return WorkflowOutcome::failed(
                        completed,
                        failed,
                        "circuit_open",
                        "CircuitOpenError",
                        &open.to_string(),
                    );
                }
            }
        }

        if (index as i64 + 1) % ctx.progress_batch == 0 {
            ctx.adapter
                .update_progress(&ctx.batch_job_id, Some(completed), Some(failed), false, false);
        }
    }

    WorkflowOutcome::completed_ok(completed, failed)
}

async fn process_previously_seen_record(ctx: &WorkflowContext, record_id: &str) -> Result<usize, NodeError> {
    let record = ctx
        .db
        .get_previously_seen_by_id(record_id)?
        .ok_or_else(|| NodeError::NotFound(format!("Previously-seen record {}", record_id)))?;

    // The original message text travels in the record metadata; without it
    // there is nothing to re-embed.
    let content = record
        .extra_metadata
        .get("content")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if content.is_empty() {
        return Ok(0);
    }

    let embedding = ctx
        .embedding_service
        .generate_embedding(&record.community_server_id, content)
        .await?;
    ctx.db
        .update_previously_seen_embedding(record_id, &embedding.vector, &embedding.provider, &embedding.model)?;
    Ok(1)
}
