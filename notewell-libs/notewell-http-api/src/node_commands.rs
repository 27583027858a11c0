use crate::error::APIError;
use crate::schemas::{
    AuthContext, BulkScanCreateAttributes, MonitoredChannelCreateAttributes, MonitoredChannelUpdateAttributes,
    PreviouslySeenCheckRequest, PreviouslySeenRecordAttributes, RatingCreateAttributes, RatingUpdateAttributes,
};
use async_channel::Sender;
use serde_json::Value;

pub type NodeResponse = Result<Value, APIError>;

/// Commands the API layer forwards to the node. Every variant carries the
/// caller's auth context and a bounded(1) response channel; the node does the
/// work and answers with a ready-to-serialize JSON:API document or an
/// [`APIError`] carrying the HTTP status.
#[allow(clippy::large_enum_variant)]
pub enum NodeCommand {
    CreateRating {
        auth: AuthContext,
        attributes: RatingCreateAttributes,
        res: Sender<NodeResponse>,
    },
    UpdateRating {
        auth: AuthContext,
        rating_id: String,
        attributes: RatingUpdateAttributes,
        res: Sender<NodeResponse>,
    },
    ListNoteRatings {
        auth: AuthContext,
        note_id: String,
        res: Sender<NodeResponse>,
    },
    GetNoteRatingStats {
        auth: AuthContext,
        note_id: String,
        res: Sender<NodeResponse>,
    },
    CreateMonitoredChannel {
        auth: AuthContext,
        attributes: MonitoredChannelCreateAttributes,
        res: Sender<NodeResponse>,
    },
    GetMonitoredChannel {
        auth: AuthContext,
        channel_uuid: String,
        res: Sender<NodeResponse>,
    },
    UpdateMonitoredChannel {
        auth: AuthContext,
        channel_uuid: String,
        body_id: Option<String>,
        attributes: MonitoredChannelUpdateAttributes,
        res: Sender<NodeResponse>,
    },
    DeleteMonitoredChannel {
        auth: AuthContext,
        channel_uuid: String,
        res: Sender<NodeResponse>,
    },
    ListMonitoredChannels {
        auth: AuthContext,
        community_server_id: Option<String>,
        enabled: Option<bool>,
        page_number: usize,
        page_size: usize,
        res: Sender<NodeResponse>,
    },
    RecordPreviouslySeen {
        auth: AuthContext,
        attributes: PreviouslySeenRecordAttributes,
        res: Sender<NodeResponse>,
    },
    CheckPreviouslySeen {
        auth: AuthContext,
        request: PreviouslySeenCheckRequest,
        res: Sender<NodeResponse>,
    },
    InitiateBulkScan {
        auth: AuthContext,
        attributes: BulkScanCreateAttributes,
        res: Sender<NodeResponse>,
    },
    GetBulkScan {
        auth: AuthContext,
        scan_id: String,
        res: Sender<NodeResponse>,
    },
    CreateNoteRequestsFromScan {
        auth: AuthContext,
        scan_id: String,
        res: Sender<NodeResponse>,
    },
    ClearRequests {
        auth: AuthContext,
        community_server_id: String,
        mode: String,
        res: Sender<NodeResponse>,
    },
    ClearNotes {
        auth: AuthContext,
        community_server_id: String,
        mode: String,
        res: Sender<NodeResponse>,
    },
    InitiateFactCheckRechunk {
        auth: AuthContext,
        res: Sender<NodeResponse>,
    },
    InitiatePreviouslySeenRechunk {
        auth: AuthContext,
        community_server_id: Option<String>,
        res: Sender<NodeResponse>,
    },
    ListChunkTasks {
        auth: AuthContext,
        status: Option<String>,
        res: Sender<NodeResponse>,
    },
    CancelChunkTask {
        auth: AuthContext,
        task_id: String,
        force: bool,
        res: Sender<NodeResponse>,
    },
}
