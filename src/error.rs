//! API error taxonomy.
//!
//! Every handler returns `Result<_, ApiError>`; the `IntoResponse` impl is
//! the single place where failures become status codes and JSON bodies.
//! Internal and upstream causes are logged here and never sent to clients.

use axum::{
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::auth::{jwt::TokenError, user_store::StoreError, validation::FieldErrors};
use crate::middleware::rate_limit::RateLimitDecision;

/// Message shared by every credential failure so usernames cannot be probed
pub const INVALID_CREDENTIALS: &str = "Invalid username or password";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation failed")]
    Validation(FieldErrors),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("{0}")]
    Conflict(String),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("authentication required")]
    Unauthorized,
    #[error("rate limit exceeded")]
    RateLimited(RateLimitDecision),
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
    #[error("upstream request failed: {0}")]
    Upstream(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(field) => ApiError::Conflict(format!("{} already exists", field)),
            StoreError::Database(e) => ApiError::Internal(anyhow::Error::new(e)),
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(_: TokenError) -> Self {
        ApiError::Unauthorized
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(details) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Validation failed", "details": details })),
            )
                .into_response(),
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Conflict(message) => {
                (StatusCode::CONFLICT, Json(json!({ "error": message }))).into_response()
            }
            ApiError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": INVALID_CREDENTIALS })),
            )
                .into_response(),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Authentication required" })),
            )
                .into_response(),
            ApiError::RateLimited(decision) => rate_limited_response(&decision),
            ApiError::NotConfigured(what) => {
                error!("{} is not configured", what);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": format!("{} not configured", what) })),
                )
                    .into_response()
            }
            ApiError::Upstream(cause) => {
                error!("Upstream request failed: {}", cause);
                (
                    StatusCode::BAD_GATEWAY,
                    Json(json!({ "error": "Upstream service unavailable" })),
                )
                    .into_response()
            }
            ApiError::Internal(cause) => {
                error!("Internal error: {:#}", cause);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal server error" })),
                )
                    .into_response()
            }
        }
    }
}

fn rate_limited_response(decision: &RateLimitDecision) -> Response {
    let retry_after = decision.retry_after_secs();
    let mut headers = HeaderMap::new();
    decision.write_headers(&mut headers);
    headers.insert("retry-after", HeaderValue::from(retry_after));

    (
        StatusCode::TOO_MANY_REQUESTS,
        headers,
        Json(json!({
            "error": "Too many attempts. Please try again later.",
            "retryAfterSeconds": retry_after,
        })),
    )
        .into_response()
}
