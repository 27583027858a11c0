use crate::network::node::Node;
use crate::network::node_error::NodeError;
use crate::workflows::engine::WorkflowJob;
use notewell_http_api::jsonapi;
use notewell_http_api::schemas::AuthContext;
use notewell_sqlite::request_manager::ClearRequestsMode;
use notewell_sqlite::schemas::batch_job::{BatchJob, BatchJobStatus};
use notewell_sqlite::schemas::identity::AuditLogEntry;
use notewell_sqlite::SqliteManager;
use serde_json::{json, Value};
use std::str::FromStr;
use tracing::{info, warn};
use uuid::Uuid;

fn job_attributes(job: &BatchJob) -> Value {
    json!({
        "workflow_id": job.workflow_id,
        "job_type": job.job_type,
        "status": job.status.as_str(),
        "total_tasks": job.total_tasks,
        "completed_tasks": job.completed_tasks,
        "failed_tasks": job.failed_tasks,
        "metadata": job.metadata,
        "error_summary": job.error_summary,
        "created_at": job.created_at,
        "started_at": job.started_at,
        "finished_at": job.finished_at,
    })
}

fn job_document(job: &BatchJob) -> Value {
    jsonapi::resource_document("batch-jobs", &job.id, job_attributes(job), None)
}

impl Node {
    /// Destructive admin operations leave an audit trail. The write is
    /// best-effort; a failed audit insert never fails the operation.
    fn audit(&self, user_id: &str, action: &str, resource: &str, resource_id: &str, details: String) {
        let entry = AuditLogEntry {
            id: Uuid::new_v4().to_string(),
            user_id: Some(user_id.to_string()),
            action: action.to_string(),
            resource: resource.to_string(),
            resource_id: Some(resource_id.to_string()),
            details: Some(details),
            created_at: SqliteManager::now_rfc3339(),
        };
        if let Err(err) = self.db.add_audit_log(&entry) {
            warn!(action, resource_id, %err, "failed to write audit log entry");
        }
    }

    pub(crate) async fn clear_requests(
        &self,
        auth: &AuthContext,
        community_server_id: &str,
        mode: &str,
    ) -> Result<Value, NodeError> {
        let profile = self.authorizer.verify_community_admin(auth, community_server_id)?;

        let mode = if mode == "all" {
            ClearRequestsMode::All
        } else {
            let days: i64 = mode
                .parse()
                .ok()
                .filter(|d| *d > 0)
                .ok_or_else(|| NodeError::Validation(format!("Invalid clear mode: {}", mode)))?;
            ClearRequestsMode::OlderThanDays(days)
        };

        let deleted = self.db.clear_requests(community_server_id, mode)?;
        self.audit(
            &profile.id,
            "clear_requests",
            "community_server",
            community_server_id,
            format!("deleted {} requests", deleted),
        );
        info!(community = community_server_id, deleted, "cleared requests");
        Ok(json!({
            "data": null,
            "jsonapi": {"version": jsonapi::JSONAPI_VERSION},
            "meta": {"deleted": deleted},
        }))
    }

    /// Clears unpublished notes only; published and force-published notes are
    /// always preserved.
    pub(crate) async fn clear_notes(
        &self,
        auth: &AuthContext,
        community_server_id: &str,
        _mode: &str,
    ) -> Result<Value, NodeError> {
        let profile = self.authorizer.verify_community_admin(auth, community_server_id)?;
        let deleted = self.db.clear_unpublished_notes(community_server_id)?;
        self.audit(
            &profile.id,
            "clear_notes",
            "community_server",
            community_server_id,
            format!("deleted {} unpublished notes", deleted),
        );
        info!(community = community_server_id, deleted, "cleared unpublished notes");
        Ok(json!({
            "data": null,
            "jsonapi": {"version": jsonapi::JSONAPI_VERSION},
            "meta": {"deleted": deleted},
        }))
    }

    pub(crate) async fn initiate_fact_check_rechunk(&self, auth: &AuthContext) -> Result<Value, NodeError> {
        self.authorizer.verify_platform_admin(auth)?;
        let total = self.db.get_all_fact_check_item_ids()?.len() as i64;
        let job = self
            .workflow_engine
            .dispatch(WorkflowJob::RechunkFactCheck, total, json!({}))?;
        Ok(job_document(&job))
    }

    pub(crate) async fn initiate_previously_seen_rechunk(
        &self,
        auth: &AuthContext,
        community_server_id: Option<&str>,
    ) -> Result<Value, NodeError> {
        self.authorizer.verify_platform_admin(auth)?;

        let total = match community_server_id {
            Some(community) => self.db.get_all_previously_seen_ids(community)?.len() as i64,
            None => {
                let mut total = 0i64;
                for community in self.db.get_previously_seen_communities()? {
                    total += self.db.get_all_previously_seen_ids(&community)?.len() as i64;
                }
                total
            }
        };
        let metadata = json!({"community_server_id": community_server_id});
        let job = self.workflow_engine.dispatch(
            WorkflowJob::RechunkPreviouslySeen {
                community_server_id: community_server_id.map(|s| s.to_string()),
            },
            total,
            metadata,
        )?;
        Ok(job_document(&job))
    }

    pub(crate) async fn list_chunk_tasks(&self, auth: &AuthContext, status: Option<&str>) -> Result<Value, NodeError> {
        self.authorizer.resolve_profile(auth)?;

        let status = match status {
            Some(raw) => Some(
                BatchJobStatus::from_str(&raw.to_uppercase())
                    .map_err(|_| NodeError::Validation(format!("Invalid status filter: {}", raw)))?,
            ),
            None => None,
        };

        let jobs = self.workflow_engine.list_tasks(status)?;
        let resources: Vec<Value> = jobs
            .iter()
            .filter(|job| job.job_type.starts_with("rechunk:"))
            .map(|job| json!({"type": "batch-jobs", "id": job.id, "attributes": job_attributes(job)}))
            .collect();
        let count = resources.len();
        Ok(json!({
            "data": resources,
            "jsonapi": {"version": jsonapi::JSONAPI_VERSION},
            "meta": {"count": count},
        }))
    }

    pub(crate) async fn cancel_chunk_task(&self, auth: &AuthContext, task_id: &str, force: bool) -> Result<Value, NodeError> {
        self.authorizer.verify_platform_admin(auth)?;
        let job = self.workflow_engine.cancel_task(task_id, force)?;
        Ok(job_document(&job))
    }
}
