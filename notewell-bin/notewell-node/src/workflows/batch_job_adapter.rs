use notewell_sqlite::schemas::batch_job::{BatchJob, BatchJobStatus};
use notewell_sqlite::SqliteManager;
use std::sync::Arc;
use tracing::{error, info};

/// Fire-and-forget bridge between workflow execution and the BatchJob ledger.
///
/// None of these methods ever surfaces an error to the workflow: a progress
/// or status write that fails is logged and reported as `false`/`None`, and
/// the workflow carries on.
pub struct BatchJobAdapter {
    db: Arc<SqliteManager>,
}

impl BatchJobAdapter {
    pub fn new(db: Arc<SqliteManager>) -> Self {
        BatchJobAdapter { db }
    }

    /// Creates the BatchJob row bound to a workflow. Returns the job id, or
    /// None when creation failed.
    pub fn create_for_workflow(
        &self,
        workflow_id: &str,
        job_type: &str,
        total_tasks: i64,
        metadata: serde_json::Value,
    ) -> Option<String> {
        match self.db.create_batch_job(workflow_id, job_type, total_tasks, metadata) {
            Ok(job) => {
                info!(workflow_id, job_type, total_tasks, job_id = %job.id, "created batch job");
                Some(job.id)
            }
            Err(err) => {
                error!(workflow_id, job_type, %err, "failed to create batch job");
                None
            }
        }
    }

    pub fn update_status(&self, job_id: &str, status: BatchJobStatus) -> bool {
        let result = match status {
            BatchJobStatus::InProgress => self.db.start_batch_job(job_id).map(|_| ()),
            BatchJobStatus::Completed => {
                match self.db.get_batch_job(job_id) {
                    Ok(Some(job)) => self
                        .db
                        .complete_batch_job(job_id, job.completed_tasks, job.failed_tasks)
                        .map(|_| ()),
                    Ok(None) => {
                        error!(job_id, "batch job not found for status update");
                        return false;
                    }
                    Err(err) => Err(err),
                }
            }
            BatchJobStatus::Cancelled => self.db.cancel_batch_job(job_id).map(|_| ()),
            BatchJobStatus::Failed => self
                .db
                .fail_batch_job(job_id, serde_json::json!({"stage": "unknown"}))
                .map(|_| ()),
            BatchJobStatus::Pending => Ok(()),
        };
        match result {
            Ok(()) => true,
            Err(err) => {
                error!(job_id, status = %status, %err, "failed to update batch job status");
                false
            }
        }
    }

    /// Sets progress counters, either absolutely or as unit increments on top
    /// of the stored values.
    pub fn update_progress(
        &self,
        job_id: &str,
        completed_tasks: Option<i64>,
        failed_tasks: Option<i64>,
        increment_completed: bool,
        increment_failed: bool,
    ) -> bool {
        let job = match self.db.get_batch_job(job_id) {
            Ok(Some(job)) => job,
            Ok(None) => {
                error!(job_id, "batch job not found for progress update");
                return false;
            }
            Err(err) => {
                error!(job_id, %err, "failed to load batch job for progress update");
                return false;
            }
        };

        let mut completed = completed_tasks.unwrap_or(job.completed_tasks);
        let mut failed = failed_tasks.unwrap_or(job.failed_tasks);
        if increment_completed {
            completed = job.completed_tasks + 1;
        }
        if increment_failed {
            failed = job.failed_tasks + 1;
        }

        match self.db.update_batch_job_progress(job_id, completed, failed) {
            Ok(_) => true,
            Err(err) => {
                error!(job_id, %err, "failed to update batch job progress");
                false
            }
        }
    }

    /// Finalizes the BatchJob: COMPLETED with counters on success, FAILED
    /// with the error summary otherwise.
    pub fn finalize_job(
        &self,
        job_id: &str,
        success: bool,
        completed_tasks: i64,
        failed_tasks: i64,
        error_summary: Option<serde_json::Value>,
    ) -> bool {
        let result = if success {
            self.db.complete_batch_job(job_id, completed_tasks, failed_tasks).map(|_| ())
        } else {
            let progress_ok = self
                .db
                .update_batch_job_progress(job_id, completed_tasks, failed_tasks)
                .is_ok();
            if !progress_ok {
                error!(job_id, "failed to store final progress before failing job");
            }
            self.db
                .fail_batch_job(
                    job_id,
                    error_summary.unwrap_or_else(|| serde_json::json!({"stage": "unknown"})),
                )
                .map(|_| ())
        };
        match result {
            Ok(()) => {
                info!(job_id, success, completed_tasks, failed_tasks, "finalized batch job");
                true
            }
            Err(err) => {
                error!(job_id, %err, "failed to finalize batch job");
                false
            }
        }
    }

    pub fn get_job_by_workflow_id(&self, workflow_id: &str) -> Option<BatchJob> {
        match self.db.get_batch_job_by_workflow_id(workflow_id) {
            Ok(job) => job,
            Err(err) => {
                error!(workflow_id, %err, "failed to load batch job by workflow id");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn adapter() -> (TempDir, BatchJobAdapter, Arc<SqliteManager>) {
        let dir = TempDir::new().unwrap();
        let db = Arc::new(SqliteManager::new(dir.path().join("adapter.db")).unwrap());
        (dir, BatchJobAdapter::new(db.clone()), db)
    }

    #[test]
    fn test_create_and_progress_increments() {
        let (_dir, adapter, db) = adapter();
        let job_id = adapter
            .create_for_workflow("wf-1", "rechunk:fact_check", 100, serde_json::json!({}))
            .unwrap();
        assert!(adapter.update_status(&job_id, BatchJobStatus::InProgress));

        assert!(adapter.update_progress(&job_id, Some(10), Some(2), false, false));
        assert!(adapter.update_progress(&job_id, None, None, true, false));
        assert!(adapter.update_progress(&job_id, None, None, false, true));

        let job = db.get_batch_job(&job_id).unwrap().unwrap();
        assert_eq!(job.completed_tasks, 11);
        assert_eq!(job.failed_tasks, 3);
    }

    #[test]
    fn test_adapter_never_errors_on_missing_job() {
        let (_dir, adapter, _db) = adapter();
        assert!(!adapter.update_status("missing", BatchJobStatus::InProgress));
        assert!(!adapter.update_progress("missing", Some(1), None, false, false));
        assert!(!adapter.finalize_job("missing", true, 1, 0, None));
        assert!(adapter.get_job_by_workflow_id("missing").is_none());
    }

    #[test]
    fn test_finalize_failed_records_summary_and_counts() {
        let (_dir, adapter, db) = adapter();
        let job_id = adapter
            .create_for_workflow("wf-2", "rechunk:previously_seen", 10, serde_json::json!({}))
            .unwrap();
        adapter.update_status(&job_id, BatchJobStatus::InProgress);

        assert!(adapter.finalize_job(
            &job_id,
            false,
            0,
            5,
            Some(serde_json::json!({"stage": "circuit_open", "error_type": "CircuitOpenError", "message": "boom"})),
        ));

        let job = db.get_batch_job(&job_id).unwrap().unwrap();
        assert_eq!(job.status, BatchJobStatus::Failed);
        assert_eq!(job.completed_tasks, 0);
        assert_eq!(job.failed_tasks, 5);
        assert_eq!(job.error_summary.unwrap()["stage"], "circuit_open");
    }
}
