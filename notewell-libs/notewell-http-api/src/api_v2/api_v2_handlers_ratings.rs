use crate::error::APIError;
use crate::jsonapi::JsonApiDocument;
use crate::node_commands::NodeCommand;
use crate::schemas::{AuthContext, RatingCreateAttributes, RatingUpdateAttributes};
use async_channel::Sender;
use utoipa::OpenApi;
use warp::http::StatusCode;
use warp::Filter;

use super::api_v2_router::{jsonapi_body, respond, send_command, with_auth, with_sender};

pub fn rating_routes(
    node_commands_sender: Sender<NodeCommand>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let create_rating_route = warp::path!("ratings")
        .and(warp::post())
        .and(with_sender(node_commands_sender.clone()))
        .and(with_auth())
        .and(jsonapi_body())
        .and_then(create_rating_handler);

    let update_rating_route = warp::path!("ratings" / String)
        .and(warp::put())
        .and(with_sender(node_commands_sender.clone()))
        .and(with_auth())
        .and(jsonapi_body())
        .and_then(update_rating_handler);

    let list_note_ratings_route = warp::path!("notes" / String / "ratings")
        .and(warp::get())
        .and(with_sender(node_commands_sender.clone()))
        .and(with_auth())
        .and_then(list_note_ratings_handler);

    let rating_stats_route = warp::path!("notes" / String / "ratings" / "stats")
        .and(warp::get())
        .and(with_sender(node_commands_sender))
        .and(with_auth())
        .and_then(rating_stats_handler);

    create_rating_route
        .or(rating_stats_route)
        .or(list_note_ratings_route)
        .or(update_rating_route)
}

#[utoipa::path(
    post,
    path = "/v2/ratings",
    responses(
        (status = 201, description = "Rating created or updated"),
        (status = 403, description = "Caller is not a community member", body = APIError),
        (status = 404, description = "Note not found", body = APIError)
    )
)]
pub async fn create_rating_handler(
    node_commands_sender: Sender<NodeCommand>,
    auth: AuthContext,
    body: JsonApiDocument<RatingCreateAttributes>,
) -> Result<impl warp::Reply, warp::Rejection> {
    if body.data.resource_type != "ratings" {
        return Err(warp::reject::custom(APIError::unprocessable(
            "Resource type must be 'ratings'",
        )));
    }
    let (res_sender, res_receiver) = async_channel::bounded(1);
    let result = send_command(
        &node_commands_sender,
        NodeCommand::CreateRating {
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
    put,
    path = "/v2/ratings/{rating_id}",
    responses(
        (status = 200, description = "Rating updated"),
        (status = 403, description = "Caller does not own the rating", body = APIError),
        (status = 404, description = "Rating not found", body = APIError)
    )
)]
pub async fn update_rating_handler(
    rating_id: String,
    node_commands_sender: Sender<NodeCommand>,
    auth: AuthContext,
    body: JsonApiDocument<RatingUpdateAttributes>,
) -> Result<impl warp::Reply, warp::Rejection> {
    if body.data.resource_type != "ratings" {
        return Err(warp::reject::custom(APIError::unprocessable(
            "Resource type must be 'ratings'",
        )));
    }
    let (res_sender, res_receiver) = async_channel::bounded(1);
    let result = send_command(
        &node_commands_sender,
        NodeCommand::UpdateRating {
            auth,
            rating_id,
            attributes: body.data.attributes,
            res: res_sender,
        },
        res_receiver,
    )
    .await?;
    respond(result, StatusCode::OK)
}

#[utoipa::path(
    get,
    path = "/v2/notes/{note_id}/ratings",
    responses(
        (status = 200, description = "Ratings for the note"),
        (status = 404, description = "Note not found", body = APIError)
    )
)]
pub async fn list_note_ratings_handler(
    note_id: String,
    node_commands_sender: Sender<NodeCommand>,
    auth: AuthContext,
) -> Result<impl warp::Reply, warp::Rejection> {
    let (res_sender, res_receiver) = async_channel::bounded(1);
    let result = send_command(
        &node_commands_sender,
        NodeCommand::ListNoteRatings {
            auth,
            note_id,
            res: res_sender,
        },
        res_receiver,
    )
    .await?;
    respond(result, StatusCode::OK)
}

#[utoipa::path(
    get,
    path = "/v2/notes/{note_id}/ratings/stats",
    responses(
        (status = 200, description = "Aggregate rating counts and average"),
        (status = 404, description = "Note not found", body = APIError)
    )
)]
pub async fn rating_stats_handler(
    note_id: String,
    node_commands_sender: Sender<NodeCommand>,
    auth: AuthContext,
) -> Result<impl warp::Reply, warp::Rejection> {
    let (res_sender, res_receiver) = async_channel::bounded(1);
    let result = send_command(
        &node_commands_sender,
        NodeCommand::GetNoteRatingStats {
            auth,
            note_id,
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
        create_rating_handler,
        update_rating_handler,
        list_note_ratings_handler,
        rating_stats_handler,
    ),
    components(schemas(APIError)),
    tags((name = "ratings", description = "Rating API endpoints"))
)]
pub struct RatingsApiDoc;
