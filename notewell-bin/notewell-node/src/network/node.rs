use crate::auth::authorizer::Authorizer;
use crate::network::node_error::NodeError;
use crate::previously_seen::cache::PreviouslySeenCache;
use crate::scanning::scan_pipeline::ScanPipeline;
use crate::scoring::scorer_factory::ScorerFactory;
use crate::services::embedding_service::EmbeddingService;
use crate::utils::environment::NodeEnvironment;
use crate::workflows::engine::WorkflowEngine;
use crate::workflows::note_writer::NoteWriter;
use async_channel::Receiver;
use notewell_http_api::error::APIError;
use notewell_http_api::node_commands::{NodeCommand, NodeResponse};
use notewell_sqlite::SqliteManager;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info};

/// The server core. Owns every manager and processes commands arriving from
/// the HTTP layer over the command channel.
pub struct Node {
    pub db: Arc<SqliteManager>,
    pub authorizer: Arc<Authorizer>,
    pub embedding_service: Arc<EmbeddingService>,
    pub previously_seen_cache: Arc<PreviouslySeenCache>,
    pub scan_pipeline: Arc<ScanPipeline>,
    pub scorer_factory: Arc<ScorerFactory>,
    pub workflow_engine: Arc<WorkflowEngine>,
    pub note_writer: Arc<NoteWriter>,
    pub settings: NodeEnvironment,
    commands_receiver: Receiver<NodeCommand>,
}

impl Node {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        settings: NodeEnvironment,
        db: Arc<SqliteManager>,
        authorizer: Arc<Authorizer>,
        embedding_service: Arc<EmbeddingService>,
        previously_seen_cache: Arc<PreviouslySeenCache>,
        scan_pipeline: Arc<ScanPipeline>,
        scorer_factory: Arc<ScorerFactory>,
        workflow_engine: Arc<WorkflowEngine>,
        note_writer: Arc<NoteWriter>,
        commands_receiver: Receiver<NodeCommand>,
    ) -> Self {
        Node {
            db,
            authorizer,
            embedding_service,
            previously_seen_cache,
            scan_pipeline,
            scorer_factory,
            workflow_engine,
            note_writer,
            settings,
            commands_receiver,
        }
    }

    /// Command processing loop. Runs until the API side drops its sender.
    pub async fn run(self: Arc<Self>) {
        info!("node command loop started");
        while let Ok(command) = self.commands_receiver.recv().await {
            let node = self.clone();
            tokio::spawn(async move {
                node.handle_command(command).await;
            });
        }
        info!("node command loop stopped");
    }

    async fn handle_command(&self, command: NodeCommand) {
        match command {
            NodeCommand::CreateRating { auth, attributes, res } => {
                let result = self.create_rating(&auth, attributes).await;
                Self::reply(res, result).await;
            }
            NodeCommand::UpdateRating {
                auth,
                rating_id,
                attributes,
                res,
            } => {
                let result = self.update_rating(&auth, &rating_id, attributes).await;
                Self::reply(res, result).await;
            }
            NodeCommand::ListNoteRatings { auth, note_id, res } => {
                let result = self.list_note_ratings(&auth, &note_id).await;
                Self::reply(res, result).await;
            }
            NodeCommand::GetNoteRatingStats { auth, note_id, res } => {
                let result = self.get_note_rating_stats(&auth, &note_id).await;
                Self::reply(res, result).await;
            }
            NodeCommand::CreateMonitoredChannel { auth, attributes, res } => {
                let result = self.create_monitored_channel(&auth, attributes).await;
                Self::reply(res, result).await;
            }
            NodeCommand::GetMonitoredChannel { auth, channel_uuid, res } => {
                let result = self.get_monitored_channel(&auth, &channel_uuid).await;
                Self::reply(res, result).await;
            }
            NodeCommand::UpdateMonitoredChannel {
                auth,
                channel_uuid,
                body_id,
                attributes,
                res,
            } => {
                let result = self
                    .update_monitored_channel(&auth, &channel_uuid, body_id.as_deref(), attributes)
                    .await;
                Self::reply(res, result).await;
            }
            NodeCommand::DeleteMonitoredChannel { auth, channel_uuid, res } => {
                let result = self.delete_monitored_channel(&auth, &channel_uuid).await;
                Self::reply(res, result).await;
            }
            NodeCommand::ListMonitoredChannels {
                auth,
                community_server_id,
                enabled,
                page_number,
                page_size,
                res,
            } => {
                let result = self
                    .list_monitored_channels(&auth, community_server_id.as_deref(), enabled, page_number, page_size)
                    .await;
                Self::reply(res, result).await;
            }
            NodeCommand::RecordPreviouslySeen { auth, attributes, res } => {
                let result = self.record_previously_seen(&auth, attributes).await;
                Self::reply(res, result).await;
            }
            NodeCommand::CheckPreviouslySeen { auth, request, res } => {
                let result = self.check_previously_seen(&auth, request).await;
                Self::reply(res, result).await;
            }
            NodeCommand::InitiateBulkScan { auth, attributes, res } => {
                let result = self.initiate_bulk_scan(&auth, attributes).await;
                Self::reply(res, result).await;
            }
            NodeCommand::GetBulkScan { auth, scan_id, res } => {
                let result = self.get_bulk_scan(&auth, &scan_id).await;
                Self::reply(res, result).await;
            }
            NodeCommand::CreateNoteRequestsFromScan { auth, scan_id, res } => {
                let result = self.create_note_requests_from_scan(&auth, &scan_id).await;
                Self::reply(res, result).await;
            }
            NodeCommand::ClearRequests {
                auth,
                community_server_id,
                mode,
                res,
            } => {
                let result = self.clear_requests(&auth, &community_server_id, &mode).await;
                Self::reply(res, result).await;
            }
            NodeCommand::ClearNotes {
                auth,
                community_server_id,
                mode,
                res,
            } => {
                let result = self.clear_notes(&auth, &community_server_id, &mode).await;
                Self::reply(res, result).await;
            }
            NodeCommand::InitiateFactCheckRechunk { auth, res } => {
                let result = self.initiate_fact_check_rechunk(&auth).await;
                Self::reply(res, result).await;
            }
            NodeCommand::InitiatePreviouslySeenRechunk {
                auth,
                community_server_id,
                res,
            } => {
                let result = self
                    .initiate_previously_seen_rechunk(&auth, community_server_id.as_deref())
                    .await;
                Self::reply(res, result).await;
            }
            NodeCommand::ListChunkTasks { auth, status, res } => {
                let result = self.list_chunk_tasks(&auth, status.as_deref()).await;
                Self::reply(res, result).await;
            }
            NodeCommand::CancelChunkTask {
                auth,
                task_id,
                force,
                res,
            } => {
                let result = self.cancel_chunk_task(&auth, &task_id, force).await;
                Self::reply(res, result).await;
            }
        }
    }

    async fn reply(res: async_channel::Sender<NodeResponse>, result: Result<Value, NodeError>) {
        let response: Result<Value, APIError> = result.map_err(|err| {
            if matches!(err, NodeError::Database(_) | NodeError::Internal(_)) {
                error!(%err, "command failed");
            }
            err.to_api_error()
        });
        let _ = res.send(response).await;
    }
}
