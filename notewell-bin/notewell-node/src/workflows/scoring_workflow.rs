use crate::network::node_error::NodeError;
use crate::scoring::scorer::derive_note_status;
use crate::workflows::circuit_breaker::CircuitBreaker;
use crate::workflows::engine::{WorkflowContext, WorkflowOutcome};
use tracing::{info, warn};

/// Scoring fan-out: recomputes the helpfulness score and status of every note
/// in a community with the tier-selected scorer.
pub async fn run_score_community(ctx: &WorkflowContext, community_server_id: &str) -> WorkflowOutcome {
    let notes = match ctx.db.get_notes_for_community(community_server_id) {
        Ok(notes) => notes,
        Err(err) => {
            return WorkflowOutcome::failed(0, 0, "list_notes", "DatabaseError", &err.to_string());
        }
    };

    let note_count = notes.len() as i64;
    let scorer = ctx.scorer_factory.get_scorer(community_server_id, note_count, None);

    let mut breaker = CircuitBreaker::new(ctx.breaker_threshold);
    let mut completed: i64 = 0;
    let mut failed: i64 = 0;

    for (index, note) in notes.iter().enumerate() {
        if ctx.is_cancelled() {
            info!(workflow_id = %ctx.workflow_id, "scoring cancelled at note boundary");
            return WorkflowOutcome::cancelled(completed, failed);
        }

        match score_one_note(ctx, &scorer, &note.id) {
            Ok(()) => {
                completed += 1;
                breaker.record_success();
            }
            Err(err) => {
                failed += 1;
                warn!(note_id = %note.id, %err, "note scoring failed");
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

fn score_one_note(
    ctx: &WorkflowContext,
    scorer: &crate::scoring::scorer_factory::CommunityScorer,
    note_id: &str,
) -> Result<(), NodeError> {
    let ratings = ctx.db.get_ratings_for_note(note_id)?;
    let values: Vec<f64> = ratings.iter().map(|r| r.helpfulness_level.value()).collect();

    let result = scorer.score_note(note_id, &values);
    let status = derive_note_status(result.score, values.len(), ctx.min_ratings);
    let helpfulness_score = (result.score * 100.0).floor() as i64;

    ctx.db.update_note_score(note_id, helpfulness_score, status)?;
    Ok(())
}
