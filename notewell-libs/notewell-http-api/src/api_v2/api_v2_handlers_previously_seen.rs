use crate::error::APIError;
use crate::jsonapi::JsonApiDocument;
use crate::node_commands::NodeCommand;
use crate::schemas::{AuthContext, PreviouslySeenCheckRequest, PreviouslySeenRecordAttributes};
use async_channel::Sender;
use utoipa::OpenApi;
use warp::http::StatusCode;
use warp::Filter;

use super::api_v2_router::{jsonapi_body, respond, send_command, with_auth, with_sender};

pub fn previously_seen_routes(
    node_commands_sender: Sender<NodeCommand>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let record_route = warp::path!("previously-seen-messages")
        .and(warp::post())
        .and(with_sender(node_commands_sender.clone()))
        .and(with_auth())
        .and(jsonapi_body())
        .and_then(record_previously_seen_handler);

    let check_route = warp::path!("previously-seen-messages" / "check")
        .and(warp::post())
        .and(with_sender(node_commands_sender))
        .and(with_auth())
        .and(jsonapi_body())
        .and_then(check_previously_seen_handler);

    check_route.or(record_route)
}

#[utoipa::path(
    post,
    path = "/v2/previously-seen-messages",
    responses(
        (status = 201, description = "Record stored (idempotent per community and message id)"),
        (status = 422, description = "Invalid payload", body = APIError)
    )
)]
pub async fn record_previously_seen_handler(
    node_commands_sender: Sender<NodeCommand>,
    auth: AuthContext,
    body: JsonApiDocument<PreviouslySeenRecordAttributes>,
) -> Result<impl warp::Reply, warp::Rejection> {
    if body.data.resource_type != "previously-seen-messages" {
        return Err(warp::reject::custom(APIError::unprocessable(
            "Resource type must be 'previously-seen-messages'",
        )));
    }
    let (res_sender, res_receiver) = async_channel::bounded(1);
    let result = send_command(
        &node_commands_sender,
        NodeCommand::RecordPreviouslySeen {
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
    post,
    path = "/v2/previously-seen-messages/check",
    responses(
        (status = 200, description = "Similarity result with auto-action decisions"),
        (status = 404, description = "Unknown community", body = APIError)
    )
)]
pub async fn check_previously_seen_handler(
    node_commands_sender: Sender<NodeCommand>,
    auth: AuthContext,
    request: PreviouslySeenCheckRequest,
) -> Result<impl warp::Reply, warp::Rejection> {
    let (res_sender, res_receiver) = async_channel::bounded(1);
    let result = send_command(
        &node_commands_sender,
        NodeCommand::CheckPreviouslySeen {
            auth,
            request,
            res: res_sender,
        },
        res_receiver,
    )
    .await?;
    respond(result, StatusCode::OK)
}

#[derive(OpenApi)]
#[openapi(
    paths(record_previously_seen_handler, check_previously_seen_handler),
    components(schemas(APIError)),
    tags((name = "previously-seen", description = "Previously-seen cache API endpoints"))
)]
pub struct PreviouslySeenApiDoc;
