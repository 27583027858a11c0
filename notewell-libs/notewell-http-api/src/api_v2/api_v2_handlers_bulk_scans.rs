use crate::error::APIError;
use crate::jsonapi::JsonApiDocument;
use crate::node_commands::NodeCommand;
use crate::schemas::{AuthContext, BulkScanCreateAttributes};
use async_channel::Sender;
use utoipa::OpenApi;
use warp::http::StatusCode;
use warp::Filter;

use super::api_v2_router::{jsonapi_body, respond, send_command, with_auth, with_sender};

pub fn bulk_scan_routes(
    node_commands_sender: Sender<NodeCommand>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let initiate_route = warp::path!("bulk-scans")
        .and(warp::post())
        .and(with_sender(node_commands_sender.clone()))
        .and(with_auth())
        .and(jsonapi_body())
        .and_then(initiate_bulk_scan_handler);

    let get_route = warp::path!("bulk-scans" / String)
        .and(warp::get())
        .and(with_sender(node_commands_sender.clone()))
        .and(with_auth())
        .and_then(get_bulk_scan_handler);

    let note_requests_route = warp::path!("bulk-scans" / String / "note-requests")
        .and(warp::post())
        .and(with_sender(node_commands_sender))
        .and(with_auth())
        .and_then(create_note_requests_handler);

    initiate_route.or(note_requests_route).or(get_route)
}

#[utoipa::path(
    post,
    path = "/v2/bulk-scans",
    responses(
        (status = 201, description = "Scan initiated"),
        (status = 403, description = "Caller may not scan this community", body = APIError)
    )
)]
pub async fn initiate_bulk_scan_handler(
    node_commands_sender: Sender<NodeCommand>,
    auth: AuthContext,
    body: JsonApiDocument<BulkScanCreateAttributes>,
) -> Result<impl warp::Reply, warp::Rejection> {
    if body.data.resource_type != "bulk-scans" {
        return Err(warp::reject::custom(APIError::unprocessable(
            "Resource type must be 'bulk-scans'",
        )));
    }
    let (res_sender, res_receiver) = async_channel::bounded(1);
    let result = send_command(
        &node_commands_sender,
        NodeCommand::InitiateBulkScan {
            auth,
            attributes: body.data.attributes,
            res: res_sender,
        },
        res_receiver,
    )
    .await?;
    respond(result, StatusCode::CREATED)
}

#[utoipa::path(
    get,
    path = "/v2/bulk-scans/{scan_id}",
    responses(
        (status = 200, description = "Scan state including flagged messages"),
        (status = 404, description = "Scan not found", body = APIError)
    )
)]
pub async fn get_bulk_scan_handler(
    scan_id: String,
    node_commands_sender: Sender<NodeCommand>,
    auth: AuthContext,
) -> Result<impl warp::Reply, warp::Rejection> {
    let (res_sender, res_receiver) = async_channel::bounded(1);
    let result = send_command(
        &node_commands_sender,
        NodeCommand::GetBulkScan {
            auth,
            scan_id,
            res: res_sender,
        },
        res_receiver,
    )
    .await?;
    respond(result, StatusCode::OK)
}

#[utoipa::path(
    post,
    path = "/v2/bulk-scans/{scan_id}/note-requests",
    responses(
        (status = 201, description = "Requests materialized from flagged messages"),
        (status = 400, description = "Scan has no flagged messages", body = APIError)
    )
)]
pub async fn create_note_requests_handler(
    scan_id: String,
    node_commands_sender: Sender<NodeCommand>,
    auth: AuthContext,
) -> Result<impl warp::Reply, warp::Rejection> {
    let (res_sender, res_receiver) = async_channel::bounded(1);
    let result = send_command(
        &node_commands_sender,
        NodeCommand::CreateNoteRequestsFromScan {
            auth,
            scan_id,
            res: res_sender,
        },
        res_receiver,
    )
    .await?;
    respond(result, StatusCode::CREATED)
}

#[derive(OpenApi)]
#[openapi(
    paths(initiate_bulk_scan_handler, get_bulk_scan_handler, create_note_requests_handler),
    components(schemas(APIError)),
    tags((name = "bulk-scans", description = "Content scan API endpoints"))
)]
pub struct BulkScansApiDoc;
