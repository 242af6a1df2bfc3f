//! Authentication API Endpoints
//! Mission: Provide login, registration, logout and session lookup endpoints

use crate::app::AppState;
use crate::auth::{
    cookie::SessionCookies,
    middleware::extract_claims,
    models::{
        LoginRequest, LoginResponse, MeResponse, MessageResponse, RegisterRequest,
        RegisterResponse, SafeUser,
    },
    user_store::StoreError,
    validation::{validate_login, validate_register},
};
use crate::error::ApiError;
use crate::middleware::client_ip::ClientIp;
use anyhow::Context;
use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::{debug, info, warn};

/// Unwrap a JSON body, turning malformed input into a 400
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

/// Login endpoint - POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    client: ClientIp,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let payload = json_body(payload)?;
    info!("🔐 Login attempt: {} from {}", payload.username, client);

    validate_login(&payload).map_err(ApiError::Validation)?;

    let Some(user) = state.store.find_by_username(&payload.username)? else {
        warn!("❌ Failed login attempt: {} from {} (unknown user)", payload.username, client);
        return Err(ApiError::InvalidCredentials);
    };

    // bcrypt is deliberately slow; keep it off the async workers
    let hasher = state.hasher;
    let stored_hash = user.password_hash.clone();
    let password = payload.password;
    let valid = tokio::task::spawn_blocking(move || hasher.verify(&password, &stored_hash))
        .await
        .context("Password verification task failed")?;

    if !valid {
        warn!("❌ Failed login attempt: {} from {}", user.username, client);
        return Err(ApiError::InvalidCredentials);
    }

    state.store.record_login(user.id, client.as_str());

    let issued = state.jwt.issue(user.id, &user.username)?;
    state.sessions.track(user.id, &issued.token);

    let mut response = (
        StatusCode::OK,
        Json(LoginResponse {
            success: true,
            message: "Login successful",
            user: SafeUser::from_user(&user),
        }),
    )
        .into_response();
    state
        .cookies
        .set(response.headers_mut(), &issued.token)
        .context("Failed to build session cookie")?;

    info!("✅ Login successful: {} (id {}) from {}", user.username, user.id, client);
    Ok(response)
}

/// Registration endpoint - POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    client: ClientIp,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let payload = json_body(payload)?;
    info!("📝 Registration attempt: {} from {}", payload.username, client);

    validate_register(&payload).map_err(ApiError::Validation)?;

    let hasher = state.hasher;
    let password = payload.password;
    let password_hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
        .await
        .context("Password hashing task failed")??;

    let user_id = match state.store.create_user(
        &payload.username,
        &payload.email,
        &password_hash,
        client.as_str(),
    ) {
        Ok(id) => id,
        Err(StoreError::Conflict(field)) => {
            warn!(
                "Registration rejected for {} from {}: {} already exists",
                payload.username, client, field
            );
            return Err(StoreError::Conflict(field).into());
        }
        Err(e) => return Err(e.into()),
    };

    info!("✅ User registered: {} (id {})", payload.username, user_id);

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            success: true,
            user_id,
            message: "User registered successfully",
        }),
    )
        .into_response())
}

/// Logout endpoint - POST /api/auth/logout
///
/// Always succeeds and clears the cookie. The token itself stays valid until
/// it expires; only the session registry entry is dropped.
pub async fn logout(
    State(state): State<AppState>,
    client: ClientIp,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    if let Some(token) = SessionCookies::read(&headers) {
        match state.jwt.verify(&token) {
            Ok(claims) => {
                state.sessions.forget(claims.user_id, &token);
                info!("👋 Logout: {} from {}", claims.username, client);
            }
            Err(e) => debug!("Logout with unusable token from {}: {}", client, e),
        }
    }

    let mut response = Json(MessageResponse {
        success: true,
        message: "Logged out successfully",
    })
    .into_response();
    state
        .cookies
        .clear(response.headers_mut())
        .context("Failed to build cookie clearing header")?;

    Ok(response)
}

/// Get current user info - GET /api/auth/me
/// Built from the token claims (no database lookup needed)
pub async fn get_current_user(req: Request) -> Result<Json<MeResponse>, ApiError> {
    let claims = extract_claims(&req).ok_or(ApiError::Unauthorized)?;

    Ok(Json(MeResponse {
        user: SafeUser::from_claims(claims),
    }))
}
