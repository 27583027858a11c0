use crate::network::node::Node;
use crate::network::node_error::NodeError;
use crate::scanning::scan_types::ScanType;
use notewell_http_api::jsonapi;
use notewell_http_api::schemas::{
    AuthContext, BulkScanCreateAttributes, MonitoredChannelCreateAttributes, MonitoredChannelUpdateAttributes,
    PreviouslySeenCheckRequest, PreviouslySeenRecordAttributes,
};
use notewell_sqlite::monitored_channel_manager::MonitoredChannelUpdate;
use notewell_sqlite::schemas::monitored_channel::MonitoredChannel;
use notewell_sqlite::schemas::request::{MessageArchive, NoteRequest};
use notewell_sqlite::schemas::scan::{BulkScanLog, ScanStatus};
use notewell_sqlite::SqliteManager;
use serde_json::{json, Value};
use std::str::FromStr;
use tracing::{error, info};
use uuid::Uuid;

fn channel_attributes(channel: &MonitoredChannel) -> Value {
    json!({
        "community_server_id": channel.community_server_id,
        "channel_id": channel.channel_id,
        "enabled": channel.enabled,
        "similarity_threshold": channel.similarity_threshold,
        "dataset_tags": channel.dataset_tags,
        "previously_seen_autopublish_threshold": channel.previously_seen_autopublish_threshold,
        "previously_seen_autorequest_threshold": channel.previously_seen_autorequest_threshold,
        "updated_by": channel.updated_by,
        "created_at": channel.created_at,
        "updated_at": channel.updated_at,
    })
}

fn scan_attributes(scan: &BulkScanLog, flagged: Option<Vec<Value>>) -> Value {
    let mut attributes = json!({
        "community_server_id": scan.community_server_id,
        "initiated_by": scan.initiated_by,
        "status": scan.status.as_str(),
        "messages_scanned": scan.messages_scanned,
        "messages_flagged": scan.messages_flagged,
        "initiated_at": scan.initiated_at,
        "completed_at": scan.completed_at,
    });
    if let Some(flagged) = flagged {
        attributes["flagged_messages"] = Value::Array(flagged);
    }
    attributes
}

impl Node {
    pub(crate) async fn create_monitored_channel(
        &self,
        auth: &AuthContext,
        attributes: MonitoredChannelCreateAttributes,
    ) -> Result<Value, NodeError> {
        self.authorizer
            .verify_community_admin(auth, &attributes.community_server_id)?;

        let now = SqliteManager::now_rfc3339();
        let channel = MonitoredChannel {
            id: Uuid::new_v4().to_string(),
            community_server_id: attributes.community_server_id,
            channel_id: attributes.channel_id,
            enabled: attributes.enabled,
            similarity_threshold: attributes
                .similarity_threshold
                .unwrap_or(self.settings.similarity_default_threshold),
            dataset_tags: attributes.dataset_tags.unwrap_or_else(|| vec!["snopes".to_string()]),
            previously_seen_autopublish_threshold: attributes.previously_seen_autopublish_threshold,
            previously_seen_autorequest_threshold: attributes.previously_seen_autorequest_threshold,
            updated_by: attributes.updated_by,
            created_at: now.clone(),
            updated_at: now,
        };
        match self.db.add_monitored_channel(&channel) {
            Ok(()) => {}
            Err(notewell_sqlite::SqliteManagerError::ChannelAlreadyMonitored(channel_id)) => {
                return Err(NodeError::Conflict(format!("Channel {} is already monitored", channel_id)));
            }
            Err(err) => return Err(err.into()),
        }

        info!(channel_id = %channel.channel_id, community = %channel.community_server_id, "registered monitored channel");
        Ok(jsonapi::resource_document(
            "monitored-channels",
            &channel.id,
            channel_attributes(&channel),
            None,
        ))
    }

    pub(crate) async fn get_monitored_channel(&self, auth: &AuthContext, channel_uuid: &str) -> Result<Value, NodeError> {
        let channel = self
            .db
            .get_monitored_channel(channel_uuid)?
            .ok_or_else(|| NodeError::NotFound(format!("Monitored channel {}", channel_uuid)))?;
        self.authorizer
            .verify_community_admin(auth, &channel.community_server_id)?;
        Ok(jsonapi::resource_document(
            "monitored-channels",
            &channel.id,
            channel_attributes(&channel),
            None,
        ))
    }

    pub(crate) async fn update_monitored_channel(
        &self,
        auth: &AuthContext,
        channel_uuid: &str,
        body_id: Option<&str>,
        attributes: MonitoredChannelUpdateAttributes,
    ) -> Result<Value, NodeError> {
        if let Some(body_id) = body_id {
            if body_id != channel_uuid {
                return Err(NodeError::Conflict(format!(
                    "ID in URL ({}) does not match ID in request body ({})",
                    channel_uuid, body_id
                )));
            }
        }

        let channel = self
            .db
            .get_monitored_channel(channel_uuid)?
            .ok_or_else(|| NodeError::NotFound(format!("Monitored channel {}", channel_uuid)))?;
        self.authorizer
            .verify_community_admin(auth, &channel.community_server_id)?;

        let update = MonitoredChannelUpdate {
            enabled: attributes.enabled,
            similarity_threshold: attributes.similarity_threshold,
            dataset_tags: attributes.dataset_tags,
            previously_seen_autopublish_threshold: attributes.previously_seen_autopublish_threshold,
            previously_seen_autorequest_threshold: attributes.previously_seen_autorequest_threshold,
            updated_by: attributes.updated_by,
        };
        let updated = self.db.update_monitored_channel(channel_uuid, &update)?;

        info!(channel_uuid, "updated monitored channel");
        Ok(jsonapi::resource_document(
            "monitored-channels",
            &updated.id,
            channel_attributes(&updated),
            None,
        ))
    }

    pub(crate) async fn delete_monitored_channel(&self, auth: &AuthContext, channel_uuid: &str) -> Result<Value, NodeError> {
        let channel = self
            .db
            .get_monitored_channel(channel_uuid)?
            .ok_or_else(|| NodeError::NotFound(format!("Monitored channel {}", channel_uuid)))?;
        self.authorizer
            .verify_community_admin(auth, &channel.community_server_id)?;
        self.db.remove_monitored_channel(channel_uuid)?;
        info!(channel_uuid, "removed monitored channel");
        Ok(Value::Null)
    }

    pub(crate) async fn list_monitored_channels(
        &self,
        auth: &AuthContext,
        community_server_id: Option<&str>,
        enabled: Option<bool>,
        page_number: usize,
        page_size: usize,
    ) -> Result<Value, NodeError> {
        let community_server_id = community_server_id.ok_or_else(|| {
            NodeError::BadRequest("filter[community_server_id] is required to list monitored channels".to_string())
        })?;
        self.authorizer.verify_community_admin(auth, community_server_id)?;

        let (channels, total) = self
            .db
            .list_monitored_channels(community_server_id, enabled, page_number, page_size)?;
        let resources: Vec<Value> = channels
            .iter()
            .map(|c| json!({"type": "monitored-channels", "id": c.id, "attributes": channel_attributes(c)}))
            .collect();
        Ok(jsonapi::collection_document(
            resources,
            "/v2/monitored-channels",
            page_number,
            page_size,
            total,
        ))
    }

    pub(crate) async fn record_previously_seen(
        &self,
        auth: &AuthContext,
        attributes: PreviouslySeenRecordAttributes,
    ) -> Result<Value, NodeError> {
        if attributes.content.trim().is_empty() {
            return Err(NodeError::Validation("content must not be empty".to_string()));
        }
        self.authorizer
            .verify_community_member(auth, &attributes.community_server_id)?;

        let mut extra_metadata = attributes.extra_metadata.unwrap_or_else(|| json!({}));
        if extra_metadata.get("content").is_none() {
            extra_metadata["content"] = Value::String(attributes.content.clone());
        }

        let record = self
            .previously_seen_cache
            .record(
                &attributes.community_server_id,
                &attributes.original_message_id,
                attributes.published_note_id.clone(),
                &attributes.content,
                extra_metadata,
            )
            .await?;

        Ok(jsonapi::resource_document(
            "previously-seen-messages",
            &record.id,
            json!({
                "community_server_id": record.community_server_id,
                "original_message_id": record.original_message_id,
                "published_note_id": record.published_note_id,
                "provider": record.provider,
                "model": record.model,
                "created_at": record.created_at,
            }),
            None,
        ))
    }

    pub(crate) async fn check_previously_seen(
        &self,
        auth: &AuthContext,
        request: PreviouslySeenCheckRequest,
    ) -> Result<Value, NodeError> {
        if !self.db.community_exists(&request.community_server_id)? {
            return Err(NodeError::NotFound(format!(
                "Community {}",
                request.community_server_id
            )));
        }
        self.authorizer
            .verify_community_member(auth, &request.community_server_id)?;

        let result = self
            .previously_seen_cache
            .check(
                &request.community_server_id,
                request.channel_id.as_deref(),
                &request.message_text,
            )
            .await?;

        Ok(jsonapi::resource_document(
            "previously-seen-checks",
            &Uuid::new_v4().to_string(),
            serde_json::to_value(&result).map_err(|e| NodeError::Internal(e.to_string()))?,
            None,
        ))
    }

    pub(crate) async fn initiate_bulk_scan(
        &self,
        auth: &AuthContext,
        attributes: BulkScanCreateAttributes,
    ) -> Result<Value, NodeError> {
        let profile = self
            .authorizer
            .verify_community_admin(auth, &attributes.community_server_id)?;

        let scan_types: Option<Vec<ScanType>> = match &attributes.scan_types {
            Some(types) => Some(
                types
                    .iter()
                    .map(|t| ScanType::from_str(t).map_err(NodeError::Validation))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            None => None,
        };

        // Opportunistic TTL housekeeping on the flagged lists.
        if let Err(err) = self.db.purge_expired_flagged_messages() {
            error!(%err, "failed to purge expired flagged messages");
        }

        let scan = BulkScanLog {
            id: Uuid::new_v4().to_string(),
            community_server_id: attributes.community_server_id.clone(),
            initiated_by: profile.id.clone(),
            status: ScanStatus::InProgress,
            messages_scanned: 0,
            messages_flagged: 0,
            initiated_at: SqliteManager::now_rfc3339(),
            completed_at: None,
        };
        self.db.create_scan_log(&scan)?;

        // The scan runs in the background; the caller polls the scan id.
        let pipeline = self.scan_pipeline.clone();
        let db = self.db.clone();
        let scan_id = scan.id.clone();
        let messages = attributes.messages.clone();
        tokio::spawn(async move {
            let flagged = match pipeline
                .process_messages(&scan_id, &messages, scan_types.as_deref())
                .await
            {
                Ok(flagged) => flagged,
                Err(err) => {
                    error!(scan_id = %scan_id, %err, "bulk scan failed");
                    Vec::new()
                }
            };
            if let Err(err) = db.complete_scan_log(&scan_id, messages.len() as i64, flagged.len() as i64) {
                error!(scan_id = %scan_id, %err, "failed to complete scan log");
            }
        });

        Ok(jsonapi::resource_document(
            "bulk-scans",
            &scan.id,
            scan_attributes(&scan, None),
            None,
        ))
    }

    pub(crate) async fn get_bulk_scan(&self, auth: &AuthContext, scan_id: &str) -> Result<Value, NodeError> {
        let scan = self
            .db
            .get_scan_log(scan_id)?
            .ok_or_else(|| NodeError::NotFound(format!("Scan {}", scan_id)))?;
        self.authorizer.verify_community_admin(auth, &scan.community_server_id)?;

        let flagged = self.db.get_flagged_messages(scan_id)?;
        let flagged_values: Vec<Value> = flagged
            .iter()
            .map(|f| serde_json::to_value(f).unwrap_or(Value::Null))
            .collect();

        Ok(jsonapi::resource_document(
            "bulk-scans",
            &scan.id,
            scan_attributes(&scan, Some(flagged_values)),
            None,
        ))
    }

    /// Materializes note requests from a scan's flagged messages. Repeat calls
    /// are idempotent per flagged message.
    pub(crate) async fn create_note_requests_from_scan(&self, auth: &AuthContext, scan_id: &str) -> Result<Value, NodeError> {
        let scan = self
            .db
            .get_scan_log(scan_id)?
            .ok_or_else(|| NodeError::NotFound(format!("Scan {}", scan_id)))?;
        let profile = self.authorizer.verify_community_admin(auth, &scan.community_server_id)?;

        let flagged = self.db.get_flagged_messages(scan_id)?;
        if flagged.is_empty() {
            return Err(NodeError::BadRequest(format!("Scan {} has no flagged messages", scan_id)));
        }

        let mut created: Vec<String> = Vec::new();
        for message in &flagged {
            let request_id = format!("scan:{}:{}", scan_id, message.message_id);
            if self.db.get_request_by_request_id(&request_id)?.is_some() {
                continue;
            }
            // Archive the platform message so the request survives its
            // deletion upstream.
            if self
                .db
                .get_message_archive_by_platform_id(&scan.community_server_id, &message.message_id)?
                .is_none()
            {
                self.db.add_message_archive(&MessageArchive {
                    id: Uuid::new_v4().to_string(),
                    community_server_id: scan.community_server_id.clone(),
                    platform_message_id: message.message_id.clone(),
                    channel_id: message.channel_id.clone(),
                    author_id: message.author_id.clone(),
                    content: message.content.clone(),
                    created_at: SqliteManager::now_rfc3339(),
                })?;
            }
            let now = SqliteManager::now_rfc3339();
            let request = NoteRequest {
                id: Uuid::new_v4().to_string(),
                request_id: request_id.clone(),
                community_server_id: scan.community_server_id.clone(),
                requested_by: profile.id.clone(),
                content: message.content.clone(),
                dataset_item_id: message.dataset_item_id.clone(),
                similarity_score: Some(message.match_score),
                status: "pending".to_string(),
                created_at: now.clone(),
                updated_at: now,
            };
            self.db.add_request(&request)?;
            created.push(request_id);
        }

        // Kick off note generation for the new requests; the writer is
        // idempotent per request and a failure only skips that note.
        for request_id in &created {
            let note_writer = self.note_writer.clone();
            let request_id = request_id.clone();
            tokio::spawn(async move {
                if let Err(err) = note_writer.generate_for_request(&request_id).await {
                    error!(request_id = %request_id, %err, "AI note generation failed");
                }
            });
        }

        info!(scan_id, created = created.len(), "materialized note requests from scan");
        Ok(json!({
            "data": created.iter().map(|id| json!({"type": "requests", "id": id})).collect::<Vec<_>>(),
            "jsonapi": {"version": jsonapi::JSONAPI_VERSION},
            "meta": {"created": created.len(), "flagged": flagged.len()},
        }))
    }
}
