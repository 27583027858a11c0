use crate::schemas::batch_job::{BatchJob, BatchJobStatus};
use crate::{SqliteManager, SqliteManagerError};
use rusqlite::{params, OptionalExtension, Row};
use std::str::FromStr;
use uuid::Uuid;

fn job_from_row(row: &Row) -> Result<BatchJob, rusqlite::Error> {
    let metadata_json: String = row.get(7)?;
    let metadata = serde_json::from_str(&metadata_json)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
    let error_summary = match row.get::<_, Option<String>>(8)? {
        Some(json) => Some(
            serde_json::from_str(&json).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?,
        ),
        None => None,
    };
    Ok(BatchJob {
        id: row.get(0)?,
        workflow_id: row.get(1)?,
        job_type: row.get(2)?,
        status: BatchJobStatus::from_str(&row.get::<_, String>(3)?)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?,
        total_tasks: row.get(4)?,
        completed_tasks: row.get(5)?,
        failed_tasks: row.get(6)?,
        metadata,
        error_summary,
        created_at: row.get(9)?,
        started_at: row.get(10)?,
        finished_at: row.get(11)?,
    })
}

const JOB_COLUMNS: &str = "id, workflow_id, job_type, status, total_tasks, completed_tasks, failed_tasks, \
                           metadata, error_summary, created_at, started_at, finished_at";

impl SqliteManager {
    pub fn create_batch_job(
        &self,
        workflow_id: &str,
        job_type: &str,
        total_tasks: i64,
        metadata: serde_json::Value,
    ) -> Result<BatchJob, SqliteManagerError> {
        let conn = self.get_connection()?;
        let id = Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO batch_jobs (id, workflow_id, job_type, status, total_tasks, metadata, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id,
                workflow_id,
                job_type,
                BatchJobStatus::Pending.as_str(),
                total_tasks,
                serde_json::to_string(&metadata)?,
                Self::now_rfc3339(),
            ],
        )?;
        self.get_batch_job(&id)?
            .ok_or_else(|| SqliteManagerError::BatchJobNotFound(id))
    }

    pub fn get_batch_job(&self, id: &str) -> Result<Option<BatchJob>, SqliteManagerError> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(&format!("SELECT {} FROM batch_jobs WHERE id = ?1", JOB_COLUMNS))?;
        Ok(stmt.query_row(params![id], job_from_row).optional()?)
    }

    pub fn get_batch_job_by_workflow_id(&self, workflow_id: &str) -> Result<Option<BatchJob>, SqliteManagerError> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM batch_jobs WHERE workflow_id = ?1",
            JOB_COLUMNS
        ))?;
        Ok(stmt.query_row(params![workflow_id], job_from_row).optional()?)
    }

    /// The oldest non-terminal job of the given type, if any. Used to enforce
    /// at-most-one-active-per-type dispatch.
    pub fn get_active_batch_job_by_type(&self, job_type: &str) -> Result<Option<BatchJob>, SqliteManagerError> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM batch_jobs WHERE job_type = ?1 AND status IN (?2, ?3) ORDER BY created_at LIMIT 1",
            JOB_COLUMNS
        ))?;
        Ok(stmt
            .query_row(
                params![
                    job_type,
                    BatchJobStatus::Pending.as_str(),
                    BatchJobStatus::InProgress.as_str()
                ],
                job_from_row,
            )
            .optional()?)
    }

    pub fn list_batch_jobs(&self, status: Option<BatchJobStatus>) -> Result<Vec<BatchJob>, SqliteManagerError> {
        let conn = self.get_connection()?;
        let jobs = match status {
            Some(status) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM batch_jobs WHERE status = ?1 ORDER BY created_at DESC",
                    JOB_COLUMNS
                ))?;
                let rows = stmt.query_map(params![status.as_str()], job_from_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM batch_jobs ORDER BY created_at DESC",
                    JOB_COLUMNS
                ))?;
                let rows = stmt.query_map([], job_from_row)?;
                rows.collect::<Result<Vec<_>, _>>()?
            }
        };
        Ok(jobs)
    }

    /// PENDING → IN_PROGRESS. Any other starting state is rejected.
    pub fn start_batch_job(&self, id: &str) -> Result<BatchJob, SqliteManagerError> {
        let job = self
            .get_batch_job(id)?
            .ok_or_else(|| SqliteManagerError::BatchJobNotFound(id.to_string()))?;
        if job.status != BatchJobStatus::Pending {
            return Err(SqliteManagerError::InvalidJobTransition {
                from: job.status.to_string(),
                to: BatchJobStatus::InProgress.to_string(),
            });
        }
        let conn = self.get_connection()?;
        conn.execute(
            "UPDATE batch_jobs SET status = ?1, started_at = ?2 WHERE id = ?3",
            params![BatchJobStatus::InProgress.as_str(), Self::now_rfc3339(), id],
        )?;
        self.get_batch_job(id)?
            .ok_or_else(|| SqliteManagerError::BatchJobNotFound(id.to_string()))
    }

    /// Sets absolute progress counters. Counts are clamped so that
    /// completed + failed never exceeds total.
    pub fn update_batch_job_progress(
        &self,
        id: &str,
        completed_tasks: i64,
        failed_tasks: i64,
    ) -> Result<BatchJob, SqliteManagerError> {
        let job = self
            .get_batch_job(id)?
            .ok_or_else(|| SqliteManagerError::BatchJobNotFound(id.to_string()))?;
        if job.status.is_terminal() {
            return Err(SqliteManagerError::InvalidJobTransition {
                from: job.status.to_string(),
                to: job.status.to_string(),
            });
        }
        let completed = completed_tasks.max(0).min(job.total_tasks);
        let failed = failed_tasks.max(0).min(job.total_tasks - completed);
        let conn = self.get_connection()?;
        conn.execute(
            "UPDATE batch_jobs SET completed_tasks = ?1, failed_tasks = ?2 WHERE id = ?3",
            params![completed, failed, id],
        )?;
        self.get_batch_job(id)?
            .ok_or_else(|| SqliteManagerError::BatchJobNotFound(id.to_string()))
    }

    pub fn complete_batch_job(
        &self,
        id: &str,
        completed_tasks: i64,
        failed_tasks: i64,
    ) -> Result<BatchJob, SqliteManagerError> {
        self.finalize_batch_job(id, BatchJobStatus::Completed, completed_tasks, failed_tasks, None)
    }

    pub fn fail_batch_job(
        &self,
        id: &str,
        error_summary: serde_json::Value,
    ) -> Result<BatchJob, SqliteManagerError> {
        let job = self
            .get_batch_job(id)?
            .ok_or_else(|| SqliteManagerError::BatchJobNotFound(id.to_string()))?;
        self.finalize_batch_job(
            id,
            BatchJobStatus::Failed,
            job.completed_tasks,
            job.failed_tasks,
            Some(error_summary),
        )
    }

    pub fn cancel_batch_job(&self, id: &str) -> Result<BatchJob, SqliteManagerError> {
        let job = self
            .get_batch_job(id)?
            .ok_or_else(|| SqliteManagerError::BatchJobNotFound(id.to_string()))?;
        self.finalize_batch_job(
            id,
            BatchJobStatus::Cancelled,
            job.completed_tasks,
            job.failed_tasks,
            None,
        )
    }

    fn finalize_batch_job(
        &self,
        id: &str,
        status: BatchJobStatus,
        completed_tasks: i64,
        failed_tasks: i64,
        error_summary: Option<serde_json::Value>,
    ) -> Result<BatchJob, SqliteManagerError> {
        let job = self
            .get_batch_job(id)?
            .ok_or_else(|| SqliteManagerError::BatchJobNotFound(id.to_string()))?;
        if job.status.is_terminal() {
            return Err(SqliteManagerError::InvalidJobTransition {
                from: job.status.to_string(),
                to: status.to_string(),
            });
        }
        let completed = completed_tasks.max(0).min(job.total_tasks);
        let failed = failed_tasks.max(0).min(job.total_tasks - completed);
        let error_json = match &error_summary {
            Some(value) => Some(serde_json::to_string(value)?),
            None => None,
        };
        let conn = self.get_connection()?;
        conn.execute(
            "UPDATE batch_jobs SET status = ?1, completed_tasks = ?2, failed_tasks = ?3, \
             error_summary = ?4, finished_at = ?5 WHERE id = ?6",
            params![status.as_str(), completed, failed, error_json, Self::now_rfc3339(), id],
        )?;
        self.get_batch_job(id)?
            .ok_or_else(|| SqliteManagerError::BatchJobNotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_db() -> (TempDir, SqliteManager) {
        let dir = TempDir::new().unwrap();
        let db = SqliteManager::new(dir.path().join("jobs.db")).unwrap();
        (dir, db)
    }

    #[test]
    fn test_lifecycle_and_monotonic_transitions() {
        let (_dir, db) = test_db();
        let job = db
            .create_batch_job("wf-1", "rechunk:fact_check", 10, serde_json::json!({}))
            .unwrap();
        assert_eq!(job.status, BatchJobStatus::Pending);

        // complete_job requires the job to have been started first
        let started = db.start_batch_job(&job.id).unwrap();
        assert_eq!(started.status, BatchJobStatus::InProgress);
        assert!(started.started_at.is_some());

        // starting twice is not a valid transition
        assert!(matches!(
            db.start_batch_job(&job.id),
            Err(SqliteManagerError::InvalidJobTransition { .. })
        ));

        let done = db.complete_batch_job(&job.id, 8, 2).unwrap();
        assert_eq!(done.status, BatchJobStatus::Completed);
        assert_eq!(done.completed_tasks, 8);
        assert_eq!(done.failed_tasks, 2);

        // terminal states are absorbing
        assert!(matches!(
            db.cancel_batch_job(&job.id),
            Err(SqliteManagerError::InvalidJobTransition { .. })
        ));
        assert!(matches!(
            db.fail_batch_job(&job.id, serde_json::json!({"stage": "x"})),
            Err(SqliteManagerError::InvalidJobTransition { .. })
        ));
    }

    #[test]
    fn test_progress_counts_never_exceed_total() {
        let (_dir, db) = test_db();
        let job = db
            .create_batch_job("wf-2", "rechunk:previously_seen", 5, serde_json::json!({}))
            .unwrap();
        db.start_batch_job(&job.id).unwrap();

        let updated = db.update_batch_job_progress(&job.id, 4, 4).unwrap();
        assert_eq!(updated.completed_tasks, 4);
        assert_eq!(updated.failed_tasks, 1);
        assert!(updated.completed_tasks + updated.failed_tasks <= updated.total_tasks);
    }

    #[test]
    fn test_active_job_lookup_by_type() {
        let (_dir, db) = test_db();
        let job = db
            .create_batch_job("wf-3", "rechunk:fact_check", 3, serde_json::json!({}))
            .unwrap();

        let active = db.get_active_batch_job_by_type("rechunk:fact_check").unwrap();
        assert_eq!(active.unwrap().id, job.id);
        assert!(db.get_active_batch_job_by_type("import:fact_check").unwrap().is_none());

        db.start_batch_job(&job.id).unwrap();
        assert!(db.get_active_batch_job_by_type("rechunk:fact_check").unwrap().is_some());

        db.complete_batch_job(&job.id, 3, 0).unwrap();
        assert!(db.get_active_batch_job_by_type("rechunk:fact_check").unwrap().is_none());
    }

    #[test]
    fn test_fail_records_error_summary() {
        let (_dir, db) = test_db();
        let job = db
            .create_batch_job("wf-4", "import:fact_check", 10, serde_json::json!({}))
            .unwrap();
        db.start_batch_job(&job.id).unwrap();
        db.update_batch_job_progress(&job.id, 0, 5).unwrap();

        let failed = db
            .fail_batch_job(
                &job.id,
                serde_json::json!({"stage": "circuit_open", "error_type": "CircuitOpenError", "message": "5 consecutive failures"}),
            )
            .unwrap();
        assert_eq!(failed.status, BatchJobStatus::Failed);
        assert_eq!(failed.error_summary.unwrap()["stage"], "circuit_open");
        assert_eq!(failed.failed_tasks, 5);
    }

    #[test]
    fn test_get_by_workflow_id() {
        let (_dir, db) = test_db();
        let job = db
            .create_batch_job("wf-5", "score:community", 1, serde_json::json!({"community": "g"}))
            .unwrap();
        let fetched = db.get_batch_job_by_workflow_id("wf-5").unwrap().unwrap();
        assert_eq!(fetched.id, job.id);
        assert!(db.get_batch_job_by_workflow_id("wf-unknown").unwrap().is_none());
    }
}
