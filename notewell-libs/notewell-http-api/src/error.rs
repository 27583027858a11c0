use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The error shape every node command resolves to on failure. `code` is the
/// HTTP status the API boundary should answer with.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct APIError {
    pub code: u16,
    pub error: String,
    pub message: String,
}

impl APIError {
    pub fn new(code: u16, error: &str, message: &str) -> Self {
        APIError {
            code,
            error: error.to_string(),
            message: message.to_string(),
        }
    }

    pub fn bad_request(message: &str) -> Self {
        Self::new(400, "Bad Request", message)
    }

    pub fn unauthorized(message: &str) -> Self {
        Self::new(401, "Unauthorized", message)
    }

    pub fn forbidden(message: &str) -> Self {
        Self::new(403, "Forbidden", message)
    }

    pub fn not_found(message: &str) -> Self {
        Self::new(404, "Not Found", message)
    }

    pub fn conflict(message: &str) -> Self {
        Self::new(409, "Conflict", message)
    }

    pub fn unprocessable(message: &str) -> Self {
        Self::new(422, "Unprocessable Entity", message)
    }

    pub fn too_many_requests(message: &str) -> Self {
        Self::new(429, "Too Many Requests", message)
    }

    pub fn internal(message: &str) -> Self {
        Self::new(500, "Internal Server Error", message)
    }

    pub fn bad_gateway(message: &str) -> Self {
        Self::new(502, "Bad Gateway", message)
    }
}

impl std::fmt::Display for APIError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.error, self.code, self.message)
    }
}

impl std::error::Error for APIError {}

impl warp::reject::Reject for APIError {}
