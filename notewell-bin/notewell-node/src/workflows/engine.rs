use crate::network::node_error::NodeError;
use crate::scoring::scorer_factory::ScorerFactory;
use crate::services::embedding_service::EmbeddingService;
use crate::workflows::batch_job_adapter::BatchJobAdapter;
use crate::workflows::import_workflow::run_import_fact_check;
use crate::workflows::rechunk_workflow::{run_rechunk_fact_check, run_rechunk_previously_seen};
use crate::workflows::scoring_workflow::run_score_community;
use crate::workflows::token_gate::{TokenGate, WorkflowWeight};
use dashmap::DashMap;
use notewell_chunking::SemanticChunker;
use notewell_sqlite::schemas::batch_job::{BatchJob, BatchJobStatus};
use notewell_sqlite::SqliteManager;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};
use uuid::Uuid;

/// The durable workflows the engine can run. Serialized into the queue table
/// so queued work survives a restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkflowJob {
    RechunkFactCheck,
    RechunkPreviouslySeen {
        community_server_id: Option<String>,
    },
    ImportFactCheck {
        dataset_name: String,
        dataset_tags: Vec<String>,
        csv_data: String,
    },
    ScoreCommunity {
        community_server_id: String,
    },
}

impl WorkflowJob {
    pub fn job_type(&self) -> &'static str {
        match self {
            WorkflowJob::RechunkFactCheck => "rechunk:fact_check",
            WorkflowJob::RechunkPreviouslySeen { .. } => "rechunk:previously_seen",
            WorkflowJob::ImportFactCheck { .. } => "import:fact_check",
            WorkflowJob::ScoreCommunity { .. } => "score:community",
        }
    }

    pub fn queue_name(&self) -> &'static str {
        match self {
            WorkflowJob::RechunkFactCheck | WorkflowJob::RechunkPreviouslySeen { .. } => "rechunk",
            WorkflowJob::ImportFactCheck { .. } => "import",
            WorkflowJob::ScoreCommunity { .. } => "scoring",
        }
    }

    pub fn weight(&self) -> WorkflowWeight {
        match self {
            WorkflowJob::RechunkFactCheck | WorkflowJob::RechunkPreviouslySeen { .. } => WorkflowWeight::Rechunk,
            WorkflowJob::ImportFactCheck { .. } => WorkflowWeight::Import,
            WorkflowJob::ScoreCommunity { .. } => WorkflowWeight::Scoring,
        }
    }
}

/// Everything a workflow run function needs. Steps observe `cancel_flag` at
/// item boundaries.
pub struct WorkflowContext {
    pub db: Arc<SqliteManager>,
    pub adapter: Arc<BatchJobAdapter>,
    pub chunker: Arc<SemanticChunker>,
    pub embedding_service: Arc<EmbeddingService>,
    pub scorer_factory: Arc<ScorerFactory>,
    pub breaker_threshold: u32,
    pub progress_batch: i64,
    pub min_ratings: usize,
    pub workflow_id: String,
    pub batch_job_id: String,
    pub cancel_flag: Arc<AtomicBool>,
}

impl WorkflowContext {
    pub fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::SeqCst)
    }
}

/// Result of one workflow run. `cancelled` means the BatchJob was already
/// transitioned by the cancel path and must not be finalized again.
#[derive(Debug, Clone)]
pub struct WorkflowOutcome {
    pub success: bool,
    pub cancelled: bool,
    pub completed: i64,
    pub failed: i64,
    pub error_summary: Option<serde_json::Value>,
}

impl WorkflowOutcome {
    pub fn completed_ok(completed: i64, failed: i64) -> Self {
        WorkflowOutcome {
            success: true,
            cancelled: false,
            completed,
            failed,
            error_summary: None,
        }
    }

    pub fn failed(completed: i64, failed: i64, stage: &str, error_type: &str, message: &str) -> Self {
        WorkflowOutcome {
            success: false,
            cancelled: false,
            completed,
            failed,
            error_summary: Some(serde_json::json!({
                "stage": stage,
                "error_type": error_type,
                "message": message,
            })),
        }
    }

    pub fn cancelled(completed: i64, failed: i64) -> Self {
        WorkflowOutcome {
            success: false,
            cancelled: true,
            completed,
            failed,
            error_summary: None,
        }
    }
}

struct TrackedTask {
    batch_job_id: String,
    cancel_flag: Arc<AtomicBool>,
}

struct QueuedWorkflow {
    workflow_id: String,
    batch_job_id: String,
    job: WorkflowJob,
}

struct EngineShared {
    db: Arc<SqliteManager>,
    adapter: Arc<BatchJobAdapter>,
    chunker: Arc<SemanticChunker>,
    embedding_service: Arc<EmbeddingService>,
    scorer_factory: Arc<ScorerFactory>,
    token_gate: Arc<TokenGate>,
    task_tracker: DashMap<String, TrackedTask>,
    dispatch_lock: std::sync::Mutex<()>,
    breaker_threshold: u32,
    progress_batch: i64,
    min_ratings: usize,
}

#[derive(Debug, Clone)]
pub struct WorkflowEngineSettings {
    pub worker_concurrency: usize,
    pub global_concurrency: usize,
    pub breaker_threshold: u32,
    pub progress_batch: i64,
    pub min_ratings: usize,
}

/// Durable workflow execution: named queues with bounded workers, one
/// BatchJob per run, weighted token admission, and cancellation at step
/// boundaries.
pub struct WorkflowEngine {
    shared: Arc<EngineShared>,
    queue_tx: async_channel::Sender<QueuedWorkflow>,
}

impl WorkflowEngine {
    pub fn new(
        db: Arc<SqliteManager>,
        adapter: Arc<BatchJobAdapter>,
        chunker: Arc<SemanticChunker>,
        embedding_service: Arc<EmbeddingService>,
        scorer_factory: Arc<ScorerFactory>,
        token_gate: Arc<TokenGate>,
        settings: WorkflowEngineSettings,
    ) -> Self {
        let (queue_tx, queue_rx) = async_channel::unbounded::<QueuedWorkflow>();
        let shared = Arc::new(EngineShared {
            db,
            adapter,
            chunker,
            embedding_service,
            scorer_factory,
            token_gate,
            task_tracker: DashMap::new(),
            dispatch_lock: std::sync::Mutex::new(()),
            breaker_threshold: settings.breaker_threshold,
            progress_batch: settings.progress_batch,
            min_ratings: settings.min_ratings,
        });

        // Queue workers: `worker_concurrency` consumers share one receiver,
        // and the global semaphore caps simultaneous runs across queues.
        let global_slots = Arc::new(Semaphore::new(settings.global_concurrency.max(1)));
        for worker_index in 0..settings.worker_concurrency.max(1) {
            let rx = queue_rx.clone();
            let shared = shared.clone();
            let global_slots = global_slots.clone();
            tokio::spawn(async move {
                while let Ok(queued) = rx.recv().await {
                    let _slot = match global_slots.clone().acquire_owned().await {
                        Ok(slot) => slot,
                        Err(_) => break,
                    };
                    Self::run_queued(&shared, queued).await;
                }
                info!(worker_index, "workflow worker stopped");
            });
        }

        let engine = WorkflowEngine { shared, queue_tx };
        engine.recover_persisted_queue();
        engine
    }

    /// Re-enqueues workflows persisted before a restart.
    fn recover_persisted_queue(&self) {
        let entries: Vec<(String, String, WorkflowJob)> = match self.shared.db.load_queued_workflows() {
            Ok(entries) => entries,
            Err(err) => {
                error!(%err, "failed to load persisted workflow queue");
                return;
            }
        };
        for (_queue, workflow_id, job) in entries {
            let batch_job_id = match self.shared.adapter.get_job_by_workflow_id(&workflow_id) {
                Some(job_row) if !job_row.status.is_terminal() => job_row.id,
                _ => {
                    let _ = self.shared.db.remove_queued_workflow(&workflow_id);
                    continue;
                }
            };
            info!(workflow_id = %workflow_id, job_type = job.job_type(), "recovering queued workflow");
            self.track_and_send(workflow_id, batch_job_id, job);
        }
    }

    /// Dispatches a workflow. Creating the BatchJob row here makes the
    /// at-most-one-active-per-type check race-free: a second dispatch of the
    /// same type sees the PENDING row and is rejected without creating
    /// anything.
    pub fn dispatch(&self, job: WorkflowJob, total_tasks: i64, metadata: serde_json::Value) -> Result<BatchJob, NodeError> {
        let job_type = job.job_type();
        let workflow_id = Uuid::new_v4().to_string();

        // The lock covers check-then-create so two concurrent dispatches of
        // the same type cannot both pass the active check.
        let batch_job_id = {
            let _guard = self.shared.dispatch_lock.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(active) = self.shared.db.get_active_batch_job_by_type(job_type)? {
                return Err(NodeError::ActiveJobExists {
                    job_type: job_type.to_string(),
                    active_job_id: active.id,
                });
            }
            self.shared
                .adapter
                .create_for_workflow(&workflow_id, job_type, total_tasks, metadata)
                .ok_or_else(|| NodeError::Internal("failed to create batch job".to_string()))?
        };

        if let Err(err) = self
            .shared
            .db
            .persist_queued_workflow(job.queue_name(), &workflow_id, &job)
        {
            warn!(%err, workflow_id = %workflow_id, "failed to persist queued workflow");
        }

        let batch_job = self
            .shared
            .db
            .get_batch_job(&batch_job_id)?
            .ok_or_else(|| NodeError::Internal("batch job vanished after creation".to_string()))?;

        self.track_and_send(workflow_id, batch_job_id, job);
        Ok(batch_job)
    }

    fn track_and_send(&self, workflow_id: String, batch_job_id: String, job: WorkflowJob) {
        self.shared.task_tracker.insert(
            workflow_id.clone(),
            TrackedTask {
                batch_job_id: batch_job_id.clone(),
                cancel_flag: Arc::new(AtomicBool::new(false)),
            },
        );
        let queued = QueuedWorkflow {
            workflow_id,
            batch_job_id,
            job,
        };
        if self.queue_tx.try_send(queued).is_err() {
            error!("workflow queue is closed; dropping dispatch");
        }
    }

    async fn run_queued(shared: &Arc<EngineShared>, queued: QueuedWorkflow) {
        let cancel_flag = shared
            .task_tracker
            .get(&queued.workflow_id)
            .map(|t| t.cancel_flag.clone())
            .unwrap_or_else(|| Arc::new(AtomicBool::new(true)));

        if cancel_flag.load(Ordering::SeqCst) {
            let _ = shared.db.remove_queued_workflow(&queued.workflow_id);
            return;
        }

        // Weighted admission: heavy workflows take more tokens from the pool.
        let _permit = shared.token_gate.acquire("default", queued.job.weight()).await;

        if !shared
            .adapter
            .update_status(&queued.batch_job_id, BatchJobStatus::InProgress)
        {
            // Cancelled (or otherwise already transitioned) before starting.
            let _ = shared.db.remove_queued_workflow(&queued.workflow_id);
            shared.task_tracker.remove(&queued.workflow_id);
            return;
        }

        let ctx = WorkflowContext {
            db: shared.db.clone(),
            adapter: shared.adapter.clone(),
            chunker: shared.chunker.clone(),
            embedding_service: shared.embedding_service.clone(),
            scorer_factory: shared.scorer_factory.clone(),
            breaker_threshold: shared.breaker_threshold,
            progress_batch: shared.progress_batch,
            min_ratings: shared.min_ratings,
            workflow_id: queued.workflow_id.clone(),
            batch_job_id: queued.batch_job_id.clone(),
            cancel_flag,
        };

        info!(workflow_id = %ctx.workflow_id, job_type = queued.job.job_type(), "workflow started");
        let outcome = match &queued.job {
            WorkflowJob::RechunkFactCheck => run_rechunk_fact_check(&ctx).await,
            WorkflowJob::RechunkPreviouslySeen { community_server_id } => {
                run_rechunk_previously_seen(&ctx, community_server_id.as_deref()).await
            }
            WorkflowJob::ImportFactCheck {
                dataset_name,
                dataset_tags,
                csv_data,
            } => run_import_fact_check(&ctx, dataset_name, dataset_tags, csv_data).await,
            WorkflowJob::ScoreCommunity { community_server_id } => {
                run_score_community(&ctx, community_server_id).await
            }
        };

        if !outcome.cancelled {
            shared.adapter.finalize_job(
                &queued.batch_job_id,
                outcome.success,
                outcome.completed,
                outcome.failed,
                outcome.error_summary.clone(),
            );
        }
        info!(
            workflow_id = %ctx.workflow_id,
            success = outcome.success,
            cancelled = outcome.cancelled,
            completed = outcome.completed,
            failed = outcome.failed,
            "workflow finished"
        );

        let _ = shared.db.remove_queued_workflow(&queued.workflow_id);
        shared.task_tracker.remove(&queued.workflow_id);
    }

    /// Cancels a task by BatchJob id. Terminal tasks require `force`; a
    /// forced cancel of a terminal task only clears tracking state.
    pub fn cancel_task(&self, batch_job_id: &str, force: bool) -> Result<BatchJob, NodeError> {
        let job = self
            .shared
            .db
            .get_batch_job(batch_job_id)?
            .ok_or_else(|| NodeError::NotFound(format!("Task {}", batch_job_id)))?;

        if job.status.is_terminal() && !force {
            return Err(NodeError::BadRequest(format!(
                "Task {} is already {} and can only be cancelled with force=true",
                batch_job_id, job.status
            )));
        }

        // Release the per-job tracking entry and signal the running workflow.
        let workflow_id = job.workflow_id.clone();
        if let Some((_, tracked)) = self.shared.task_tracker.remove(&workflow_id) {
            tracked.cancel_flag.store(true, Ordering::SeqCst);
            debug_assert_eq!(tracked.batch_job_id, job.id);
        }
        let _ = self.shared.db.remove_queued_workflow(&workflow_id);

        if !job.status.is_terminal() {
            let cancelled = self.shared.db.cancel_batch_job(batch_job_id)?;
            info!(batch_job_id, "task cancelled");
            return Ok(cancelled);
        }
        Ok(job)
    }

    pub fn list_tasks(&self, status: Option<BatchJobStatus>) -> Result<Vec<BatchJob>, NodeError> {
        Ok(self.shared.db.list_batch_jobs(status)?)
    }
}
