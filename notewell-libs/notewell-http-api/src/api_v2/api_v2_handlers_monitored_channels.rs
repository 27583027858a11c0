use crate::error::APIError;
use crate::jsonapi::JsonApiDocument;
use crate::node_commands::NodeCommand;
use crate::schemas::{AuthContext, MonitoredChannelCreateAttributes, MonitoredChannelUpdateAttributes};
use async_channel::Sender;
use std::collections::HashMap;
use utoipa::OpenApi;
use warp::http::StatusCode;
use warp::Filter;

use super::api_v2_router::{jsonapi_body, respond, send_command, with_auth, with_sender};

pub fn monitored_channel_routes(
    node_commands_sender: Sender<NodeCommand>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let create_route = warp::path!("monitored-channels")
        .and(warp::post())
        .and(with_sender(node_commands_sender.clone()))
        .and(with_auth())
        .and(jsonapi_body())
        .and_then(create_monitored_channel_handler);

    let list_route = warp::path!("monitored-channels")
        .and(warp::get())
        .and(with_sender(node_commands_sender.clone()))
        .and(with_auth())
        .and(warp::query::<HashMap<String, String>>())
        .and_then(list_monitored_channels_handler);

    let get_route = warp::path!("monitored-channels" / String)
        .and(warp::get())
        .and(with_sender(node_commands_sender.clone()))
        .and(with_auth())
        .and_then(get_monitored_channel_handler);

    let update_route = warp::path!("monitored-channels" / String)
        .and(warp::patch())
        .and(with_sender(node_commands_sender.clone()))
        .and(with_auth())
        .and(jsonapi_body())
        .and_then(update_monitored_channel_handler);

    let delete_route = warp::path!("monitored-channels" / String)
        .and(warp::delete())
        .and(with_sender(node_commands_sender))
        .and(with_auth())
        .and_then(delete_monitored_channel_handler);

    create_route.or(list_route).or(get_route).or(update_route).or(delete_route)
}

#[utoipa::path(
    post,
    path = "/v2/monitored-channels",
    responses(
        (status = 201, description = "Channel registered"),
        (status = 409, description = "Channel already monitored", body = APIError)
    )
)]
pub async fn create_monitored_channel_handler(
    node_commands_sender: Sender<NodeCommand>,
    auth: AuthContext,
    body: JsonApiDocument<MonitoredChannelCreateAttributes>,
) -> Result<impl warp::Reply, warp::Rejection> {
    if body.data.resource_type != "monitored-channels" {
        return Err(warp::reject::custom(APIError::unprocessable(
            "Resource type must be 'monitored-channels'",
        )));
    }
    let (res_sender, res_receiver) = async_channel::bounded(1);
    let result = send_command(
        &node_commands_sender,
        NodeCommand::CreateMonitoredChannel {
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
    path = "/v2/monitored-channels",
    params(
        ("filter[community_server_id]" = String, Query, description = "Community to list channels for (required)"),
        ("filter[enabled]" = Option<bool>, Query, description = "Filter by enabled state"),
        ("page[number]" = Option<usize>, Query, description = "Page number, 1-based"),
        ("page[size]" = Option<usize>, Query, description = "Page size, max 100")
    ),
    responses(
        (status = 200, description = "Paged channel list"),
        (status = 400, description = "Missing filter[community_server_id]", body = APIError)
    )
)]
pub async fn list_monitored_channels_handler(
    node_commands_sender: Sender<NodeCommand>,
    auth: AuthContext,
    query_params: HashMap<String, String>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let community_server_id = query_params.get("filter[community_server_id]").cloned();
    let enabled = query_params.get("filter[enabled]").map(|v| v == "true");
    let page_number: usize = query_params
        .get("page[number]")
        .and_then(|v| v.parse().ok())
        .unwrap_or(1)
        .max(1);
    let page_size: usize = query_params
        .get("page[size]")
        .and_then(|v| v.parse().ok())
        .unwrap_or(20)
        .clamp(1, 100);

    let (res_sender, res_receiver) = async_channel::bounded(1);
    let result = send_command(
        &node_commands_sender,
        NodeCommand::ListMonitoredChannels {
            auth,
            community_server_id,
            enabled,
            page_number,
            page_size,
            res: res_sender,
        },
        res_receiver,
    )
    .await?;
    respond(result, StatusCode::OK)
}

#[utoipa::path(
    get,
    path = "/v2/monitored-channels/{channel_uuid}",
    responses(
        (status = 200, description = "Channel details"),
        (status = 404, description = "Channel not found", body = APIError)
    )
)]
pub async fn get_monitored_channel_handler(
    channel_uuid: String,
    node_commands_sender: Sender<NodeCommand>,
    auth: AuthContext,
) -> Result<impl warp::Reply, warp::Rejection> {
    let (res_sender, res_receiver) = async_channel::bounded(1);
    let result = send_command(
        &node_commands_sender,
        NodeCommand::GetMonitoredChannel {
            auth,
            channel_uuid,
            res: res_sender,
        },
        res_receiver,
    )
    .await?;
    respond(result, StatusCode::OK)
}

#[utoipa::path(
    patch,
    path = "/v2/monitored-channels/{channel_uuid}",
    responses(
        (status = 200, description = "Channel updated"),
        (status = 404, description = "Channel not found", body = APIError),
        (status = 409, description = "Body id does not match URL", body = APIError)
    )
)]
pub async fn update_monitored_channel_handler(
    channel_uuid: String,
    node_commands_sender: Sender<NodeCommand>,
    auth: AuthContext,
    body: JsonApiDocument<MonitoredChannelUpdateAttributes>,
) -> Result<impl warp::Reply, warp::Rejection> {
    if body.data.resource_type != "monitored-channels" {
        return Err(warp::reject::custom(APIError::unprocessable(
            "Resource type must be 'monitored-channels'",
        )));
    }
    let (res_sender, res_receiver) = async_channel::bounded(1);
    let result = send_command(
        &node_commands_sender,
        NodeCommand::UpdateMonitoredChannel {
            auth,
            channel_uuid,
            body_id: body.data.id,
            attributes: body.data.attributes,
            res: res_sender,
        },
        res_receiver,
    )
    .await?;
    respond(result, StatusCode::OK)
}

#[utoipa::path(
    delete,
    path = "/v2/monitored-channels/{channel_uuid}",
    responses(
        (status = 204, description = "Channel removed"),
        (status = 404, description = "Channel not found", body = APIError)
    )
)]
pub async fn delete_monitored_channel_handler(
    channel_uuid: String,
    node_commands_sender: Sender<NodeCommand>,
    auth: AuthContext,
) -> Result<impl warp::Reply, warp::Rejection> {
    let (res_sender, res_receiver) = async_channel::bounded(1);
    let result = send_command(
        &node_commands_sender,
        NodeCommand::DeleteMonitoredChannel {
            auth,
            channel_uuid,
            res: res_sender,
        },
        res_receiver,
    )
    .await?;
    respond(result, StatusCode::NO_CONTENT)
}

#[derive(OpenApi)]
#[openapi(
    paths(
        create_monitored_channel_handler,
        list_monitored_channels_handler,
        get_monitored_channel_handler,
        update_monitored_channel_handler,
        delete_monitored_channel_handler,
    ),
    components(schemas(APIError)),
    tags((name = "monitored-channels", description = "Monitored channel API endpoints"))
)]
pub struct MonitoredChannelsApiDoc;
