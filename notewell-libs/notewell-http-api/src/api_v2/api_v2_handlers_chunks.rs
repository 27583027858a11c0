use crate::node_commands::NodeCommand;
use crate::schemas::AuthContext;
use crate::error::APIError;
use async_channel::Sender;
use std::collections::HashMap;
use utoipa::OpenApi;
use warp::http::StatusCode;
use warp::Filter;

use super::api_v2_router::{respond, send_command, with_auth, with_sender};

pub fn chunk_routes(
    node_commands_sender: Sender<NodeCommand>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let fact_check_rechunk_route = warp::path!("chunks" / "fact-check" / "rechunk")
        .and(warp::post())
        .and(with_sender(node_commands_sender.clone()))
        .and(with_auth())
        .and_then(fact_check_rechunk_handler);

    let previously_seen_rechunk_route = warp::path!("chunks" / "previously-seen" / "rechunk")
        .and(warp::post())
        .and(with_sender(node_commands_sender.clone()))
        .and(with_auth())
        .and(warp::query::<HashMap<String, String>>())
        .and_then(previously_seen_rechunk_handler);

    let list_tasks_route = warp::path!("chunks" / "tasks")
        .and(warp::get())
        .and(with_sender(node_commands_sender.clone()))
        .and(with_auth())
        .and(warp::query::<HashMap<String, String>>())
        .and_then(list_chunk_tasks_handler);

    let cancel_task_route = warp::path!("chunks" / "tasks" / String)
        .and(warp::delete())
        .and(with_sender(node_commands_sender))
        .and(with_auth())
        .and(warp::query::<HashMap<String, String>>())
        .and_then(cancel_chunk_task_handler);

    fact_check_rechunk_route
        .or(previously_seen_rechunk_route)
        .or(list_tasks_route)
        .or(cancel_task_route)
}

#[utoipa::path(
    post,
    path = "/v2/chunks/fact-check/rechunk",
    responses(
        (status = 201, description = "Rechunk job dispatched"),
        (status = 401, description = "Missing bearer token", body = APIError),
        (status = 403, description = "Caller is not a platform admin", body = APIError),
        (status = 429, description = "A rechunk job of this type is already active", body = APIError)
    )
)]
pub async fn fact_check_rechunk_handler(
    node_commands_sender: Sender<NodeCommand>,
    auth: AuthContext,
) -> Result<impl warp::Reply, warp::Rejection> {
    let (res_sender, res_receiver) = async_channel::bounded(1);
    let result = send_command(
        &node_commands_sender,
        NodeCommand::InitiateFactCheckRechunk { auth, res: res_sender },
        res_receiver,
    )
    .await?;
    respond(result, StatusCode::CREATED)
}

#[utoipa::path(
    post,
    path = "/v2/chunks/previously-seen/rechunk",
    params(("community_server_id" = Option<String>, Query, description = "Restrict the rechunk to one community")),
    responses(
        (status = 201, description = "Rechunk job dispatched"),
        (status = 429, description = "A rechunk job of this type is already active", body = APIError)
    )
)]
pub async fn previously_seen_rechunk_handler(
    node_commands_sender: Sender<NodeCommand>,
    auth: AuthContext,
    query_params: HashMap<String, String>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let community_server_id = query_params.get("community_server_id").cloned();
    let (res_sender, res_receiver) = async_channel::bounded(1);
    let result = send_command(
        &node_commands_sender,
        NodeCommand::InitiatePreviouslySeenRechunk {
            auth,
            community_server_id,
            res: res_sender,
        },
        res_receiver,
    )
    .await?;
    respond(result, StatusCode::CREATED)
}

#[utoipa::path(
    get,
    path = "/v2/chunks/tasks",
    params(("status" = Option<String>, Query, description = "Filter by job status")),
    responses(
        (status = 200, description = "Rechunk task list"),
        (status = 401, description = "Missing bearer token", body = APIError)
    )
)]
pub async fn list_chunk_tasks_handler(
    node_commands_sender: Sender<NodeCommand>,
    auth: AuthContext,
    query_params: HashMap<String, String>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let status = query_params.get("status").cloned();
    let (res_sender, res_receiver) = async_channel::bounded(1);
    let result = send_command(
        &node_commands_sender,
        NodeCommand::ListChunkTasks {
            auth,
            status,
            res: res_sender,
        },
        res_receiver,
    )
    .await?;
    respond(result, StatusCode::OK)
}

#[utoipa::path(
    delete,
    path = "/v2/chunks/tasks/{task_id}",
    params(("force" = Option<bool>, Query, description = "Required to cancel a task already in a terminal state")),
    responses(
        (status = 200, description = "Task cancelled"),
        (status = 400, description = "Task is terminal and force was not set", body = APIError),
        (status = 404, description = "Task not found", body = APIError)
    )
)]
pub async fn cancel_chunk_task_handler(
    task_id: String,
    node_commands_sender: Sender<NodeCommand>,
    auth: AuthContext,
    query_params: HashMap<String, String>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let force = query_params.get("force").map(|v| v == "true").unwrap_or(false);
    let (res_sender, res_receiver) = async_channel::bounded(1);
    let result = send_command(
        &node_commands_sender,
        NodeCommand::CancelChunkTask {
            auth,
            task_id,
            force,
            res: res_sender,
        },
        res_receiver,
    )
    .await?;
    respond(result, StatusCode::OK)
}

#[derive(OpenApi)]
#[openapi(
    paths(
        fact_check_rechunk_handler,
        previously_seen_rechunk_handler,
        list_chunk_tasks_handler,
        cancel_chunk_task_handler,
    ),
    components(schemas(APIError)),
    tags((name = "chunks", description = "Rechunk task API endpoints"))
)]
pub struct ChunksApiDoc;
