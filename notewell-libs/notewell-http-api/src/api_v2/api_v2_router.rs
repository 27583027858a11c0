use crate::error::APIError;
use crate::jsonapi::{self, JSONAPI_CONTENT_TYPE};
use crate::node_commands::{NodeCommand, NodeResponse};
use crate::schemas::AuthContext;
use async_channel::Sender;
use std::convert::Infallible;
use warp::http::StatusCode;
use warp::Filter;

use super::{
    api_v2_handlers_bulk_scans::bulk_scan_routes, api_v2_handlers_chunks::chunk_routes,
    api_v2_handlers_maintenance::maintenance_routes,
    api_v2_handlers_monitored_channels::monitored_channel_routes,
    api_v2_handlers_previously_seen::previously_seen_routes, api_v2_handlers_ratings::rating_routes,
};

/// All JSON:API endpoints mounted under `/v2`.
pub fn api_v2_routes(
    node_commands_sender: Sender<NodeCommand>,
) -> impl Filter<Extract = impl warp::Reply, Error = Infallible> + Clone {
    let health_route = warp::path!("health").and(warp::get()).map(|| {
        warp::reply::json(&serde_json::json!({"status": "ok"}))
    });

    warp::path("v2")
        .and(
            health_route
                .or(rating_routes(node_commands_sender.clone()))
                .or(monitored_channel_routes(node_commands_sender.clone()))
                .or(previously_seen_routes(node_commands_sender.clone()))
                .or(bulk_scan_routes(node_commands_sender.clone()))
                .or(maintenance_routes(node_commands_sender.clone()))
                .or(chunk_routes(node_commands_sender)),
        )
        .recover(handle_rejection)
}

pub fn with_sender(
    sender: Sender<NodeCommand>,
) -> impl Filter<Extract = (Sender<NodeCommand>,), Error = Infallible> + Clone {
    warp::any().map(move || sender.clone())
}

/// Extracts the caller identity from the `Authorization` bearer header plus
/// the gateway's manage-server signal header.
pub fn with_auth() -> impl Filter<Extract = (AuthContext,), Error = warp::Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(warp::header::optional::<String>("x-gateway-manage-server"))
        .and_then(|authorization: Option<String>, manage: Option<String>| async move {
            let authorization =
                authorization.ok_or_else(|| warp::reject::custom(APIError::unauthorized("Missing bearer token")))?;
            let bearer = authorization.strip_prefix("Bearer ").unwrap_or("").to_string();
            if bearer.is_empty() {
                return Err(warp::reject::custom(APIError::unauthorized("Missing bearer token")));
            }
            let manage_server = manage.map(|v| v == "true").unwrap_or(false);
            Ok::<AuthContext, warp::Rejection>(AuthContext { bearer, manage_server })
        })
}

/// Body filter that accepts both `application/json` and the JSON:API
/// `application/vnd.api+json` content type (warp's built-in json filter
/// rejects the latter with 415).
pub fn jsonapi_body<T: serde::de::DeserializeOwned + Send>(
) -> impl Filter<Extract = (T,), Error = warp::Rejection> + Clone {
    warp::body::bytes().and_then(|body: warp::hyper::body::Bytes| async move {
        serde_json::from_slice::<T>(&body).map_err(|err| {
            warp::reject::custom(APIError::unprocessable(&format!("Invalid request body: {}", err)))
        })
    })
}

/// Serializes a JSON:API document with the vendored content type.
pub fn jsonapi_reply(status: StatusCode, document: &serde_json::Value) -> warp::http::Response<String> {
    warp::http::Response::builder()
        .status(status)
        .header("content-type", JSONAPI_CONTENT_TYPE)
        .body(document.to_string())
        .unwrap_or_else(|_| warp::http::Response::new(String::new()))
}

/// Maps a node response to an HTTP reply, using `success` for the Ok arm.
pub fn respond(result: NodeResponse, success: StatusCode) -> Result<warp::http::Response<String>, warp::Rejection> {
    match result {
        Ok(document) => {
            if success == StatusCode::NO_CONTENT {
                return Ok(warp::http::Response::builder()
                    .status(StatusCode::NO_CONTENT)
                    .body(String::new())
                    .unwrap_or_else(|_| warp::http::Response::new(String::new())));
            }
            Ok(jsonapi_reply(success, &document))
        }
        Err(error) => {
            let status = StatusCode::from_u16(error.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            Ok(jsonapi_reply(status, &jsonapi::error_document(&error)))
        }
    }
}

/// Sends a command to the node and waits for its reply. A dead channel means
/// the node is shutting down.
pub async fn send_command(
    sender: &Sender<NodeCommand>,
    command: NodeCommand,
    receiver: async_channel::Receiver<NodeResponse>,
) -> Result<NodeResponse, warp::Rejection> {
    sender
        .send(command)
        .await
        .map_err(|_| warp::reject::custom(APIError::internal("Node is unavailable")))?;
    receiver
        .recv()
        .await
        .map_err(|_| warp::reject::custom(APIError::internal("Node dropped the request")))
}

pub async fn handle_rejection(rejection: warp::Rejection) -> Result<impl warp::Reply, Infallible> {
    if let Some(api_error) = rejection.find::<APIError>() {
        let status = StatusCode::from_u16(api_error.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return Ok(jsonapi_reply(status, &jsonapi::error_document(api_error)));
    }
    if rejection.is_not_found() {
        let error = APIError::not_found("The requested resource was not found");
        return Ok(jsonapi_reply(StatusCode::NOT_FOUND, &jsonapi::error_document(&error)));
    }
    if rejection.find::<warp::filters::body::BodyDeserializeError>().is_some() {
        let error = APIError::unprocessable("Request body failed validation");
        return Ok(jsonapi_reply(
            StatusCode::UNPROCESSABLE_ENTITY,
            &jsonapi::error_document(&error),
        ));
    }
    let error = APIError::bad_request("The request could not be processed");
    Ok(jsonapi_reply(StatusCode::BAD_REQUEST, &jsonapi::error_document(&error)))
}
