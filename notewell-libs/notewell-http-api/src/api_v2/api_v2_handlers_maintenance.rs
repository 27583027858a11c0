use crate::error::APIError;
use crate::node_commands::NodeCommand;
use crate::schemas::AuthContext;
use async_channel::Sender;
use std::collections::HashMap;
use utoipa::OpenApi;
use warp::http::StatusCode;
use warp::Filter;

use super::api_v2_router::{respond, send_command, with_auth, with_sender};

pub fn maintenance_routes(
    node_commands_sender: Sender<NodeCommand>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let clear_requests_route = warp::path!("community-servers" / String / "clear-requests")
        .and(warp::delete())
        .and(with_sender(node_commands_sender.clone()))
        .and(with_auth())
        .and(warp::query::<HashMap<String, String>>())
        .and_then(clear_requests_handler);

    let clear_notes_route = warp::path!("community-servers" / String / "clear-notes")
        .and(warp::delete())
        .and(with_sender(node_commands_sender))
        .and(with_auth())
        .and(warp::query::<HashMap<String, String>>())
        .and_then(clear_notes_handler);

    clear_requests_route.or(clear_notes_route)
}

#[utoipa::path(
    delete,
    path = "/v2/community-servers/{community_server_id}/clear-requests",
    params(("mode" = String, Query, description = "\"all\" or a positive day count")),
    responses(
        (status = 200, description = "Requests cleared"),
        (status = 403, description = "Caller is not a community admin", body = APIError),
        (status = 422, description = "Invalid mode", body = APIError)
    )
)]
pub async fn clear_requests_handler(
    community_server_id: String,
    node_commands_sender: Sender<NodeCommand>,
    auth: AuthContext,
    query_params: HashMap<String, String>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let mode = query_params
        .get("mode")
        .cloned()
        .ok_or_else(|| warp::reject::custom(APIError::unprocessable("The 'mode' query parameter is required")))?;

    let (res_sender, res_receiver) = async_channel::bounded(1);
    let result = send_command(
        &node_commands_sender,
        NodeCommand::ClearRequests {
            auth,
            community_server_id,
            mode,
            res: res_sender,
        },
        res_receiver,
    )
    .await?;
    respond(result, StatusCode::OK)
}

#[utoipa::path(
    delete,
    path = "/v2/community-servers/{community_server_id}/clear-notes",
    params(("mode" = String, Query, description = "Clear mode; unpublished notes only are removed")),
    responses(
        (status = 200, description = "Unpublished notes cleared; published and force-published notes remain"),
        (status = 403, description = "Caller is not a community admin", body = APIError)
    )
)]
pub async fn clear_notes_handler(
    community_server_id: String,
    node_commands_sender: Sender<NodeCommand>,
    auth: AuthContext,
    query_params: HashMap<String, String>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let mode = query_params.get("mode").cloned().unwrap_or_else(|| "all".to_string());

    let (res_sender, res_receiver) = async_channel::bounded(1);
    let result = send_command(
        &node_commands_sender,
        NodeCommand::ClearNotes {
            auth,
            community_server_id,
            mode,
            res: res_sender,
        },
        res_receiver,
    )
    .await?;
    respond(result, StatusCode::OK)
}

#[derive(OpenApi)]
#[openapi(
    paths(clear_requests_handler, clear_notes_handler),
    components(schemas(APIError)),
    tags((name = "maintenance", description = "Bulk clear API endpoints"))
)]
pub struct MaintenanceApiDoc;
