//! Authentication Middleware
//! Mission: Protect API endpoints with session cookie validation

use crate::auth::{cookie::SessionCookies, jwt::JwtHandler, models::Claims};
use crate::error::ApiError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

/// Auth middleware that validates the `auth_token` cookie.
///
/// API routes are not covered by the route gate, so every protected API
/// endpoint sits behind this layer instead.
pub async fn auth_middleware(
    State(jwt_handler): State<Arc<JwtHandler>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = SessionCookies::read(req.headers()).ok_or(ApiError::Unauthorized)?;

    let claims = jwt_handler.verify(&token).map_err(|e| {
        debug!(path = %req.uri().path(), "Session cookie rejected: {}", e);
        ApiError::from(e)
    })?;

    // Add claims to request extensions so handlers can access them
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// Extract claims from request (use after auth middleware)
pub fn extract_claims(req: &Request) -> Option<&Claims> {
    req.extensions().get::<Claims>()
}
