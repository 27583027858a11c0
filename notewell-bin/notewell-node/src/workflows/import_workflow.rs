use crate::network::node_error::NodeError;
use crate::workflows::circuit_breaker::CircuitBreaker;
use crate::workflows::engine::{WorkflowContext, WorkflowOutcome};
use notewell_sqlite::schemas::fact_check::{FactCheckChunk, FactCheckItem};
use notewell_sqlite::SqliteManager;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

/// One row of the import CSV. Extra columns are ignored.
#[derive(Debug, Deserialize)]
struct ImportRow {
    title: String,
    content: String,
    #[serde(default)]
    rating: Option<String>,
    #[serde(default)]
    source_url: Option<String>,
}

/// Counts data rows without importing, used to size the BatchJob at dispatch.
pub fn count_csv_rows(csv_data: &str) -> usize {
    csv::Reader::from_reader(csv_data.as_bytes())
        .into_deserialize::<ImportRow>()
        .count()
}

/// CSV import workflow: parse each row, store the item, chunk and embed its
/// content, and promote it into the index. Malformed rows count as failures
/// without aborting the import.
pub async fn run_import_fact_check(
    ctx: &WorkflowContext,
    dataset_name: &str,
    dataset_tags: &[String],
    csv_data: &str,
) -> WorkflowOutcome {
    let mut reader = csv::Reader::from_reader(csv_data.as_bytes());
    let rows: Vec<Result<ImportRow, csv::Error>> = reader.deserialize().collect();

    let mut breaker = CircuitBreaker::new(ctx.breaker_threshold);
    let mut completed: i64 = 0;
    let mut failed: i64 = 0;

    for (index, row) in rows.into_iter().enumerate() {
        if ctx.is_cancelled() {
            info!(workflow_id = %ctx.workflow_id, "import cancelled at row boundary");
            return WorkflowOutcome::cancelled(completed, failed);
        }

        let result = match row {
            Ok(row) => import_row(ctx, dataset_name, dataset_tags, row).await,
            Err(err) => Err(NodeError::Validation(format!("malformed CSV row {}: {}", index + 1, err))),
        };

        match result {
            Ok(item_id) => {
                completed += 1;
                breaker.record_success();
                info!(row = index + 1, item_id = %item_id, "imported fact-check item");
            }
            Err(err) => {
                failed += 1;
                warn!(row = index + 1, %err, "import row failed");
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

async fn import_row(
    ctx: &WorkflowContext,
    dataset_name: &str,
    dataset_tags: &[String],
    row: ImportRow,
) -> Result<String, NodeError> {
    if row.title.is_empty() || row.content.is_empty() {
        return Err(NodeError::Validation("row is missing title or content".to_string()));
    }

    let item = FactCheckItem {
        id: Uuid::new_v4().to_string(),
        dataset_name: dataset_name.to_string(),
        title: row.title,
        content: row.content,
        rating: row.rating,
        source_url: row.source_url,
        dataset_tags: dataset_tags.to_vec(),
        created_at: SqliteManager::now_rfc3339(),
    };
    ctx.db.add_fact_check_item(&item)?;

    let text_chunks = ctx.chunker.chunk_text_with_positions(&item.content)?;
    let mut chunks = Vec::with_capacity(text_chunks.len());
    for text_chunk in text_chunks {
        let embedding = ctx
            .embedding_service
            .generate_embedding("import", &text_chunk.text)
            .await?;
        chunks.push(FactCheckChunk {
            id: Uuid::new_v4().to_string(),
            item_id: item.id.clone(),
            chunk_index: text_chunk.chunk_index as i64,
            text: text_chunk.text,
            start_offset: text_chunk.start as i64,
            end_offset: text_chunk.end as i64,
            embedding: embedding.vector,
            provider: embedding.provider,
            model: embedding.model,
        });
    }
    ctx.db.replace_fact_check_chunks(&item.id, &chunks)?;

    Ok(item.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_csv_rows_skips_header() {
        let csv_data = "title,content\nClaim A,Body A\nClaim B,Body B\n";
        assert_eq!(count_csv_rows(csv_data), 2);
        assert_eq!(count_csv_rows("title,content\n"), 0);
    }
}
