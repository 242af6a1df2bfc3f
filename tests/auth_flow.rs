//! Router-level tests for the auth flow, route gate, rate limiter and
//! search endpoint, driven through `tower::ServiceExt::oneshot`.

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{
        header::{COOKIE, LOCATION, SET_COOKIE},
        Request, StatusCode,
    },
    response::Response,
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use strm_backend::auth::{password, JwtHandler, PasswordHasher, UserStore};
use strm_backend::search::{MediaKind, MediaResult, MediaSearch, SearchError};
use strm_backend::{build_router, AppState};

const SECRET: &str = "integration-test-secret-0123456789abcdef";

fn test_state() -> AppState {
    let store = Arc::new(UserStore::in_memory().unwrap());
    let jwt = Arc::new(JwtHandler::new(SECRET));
    AppState::new(store, jwt, PasswordHasher::new(password::MIN_COST))
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

fn post_json(uri: &str, ip: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .header("x-forwarded-for", ip)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_with_cookie(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8_lossy(&bytes).to_string()
}

/// `auth_token=<value>` from the response's Set-Cookie headers
fn session_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("auth_token="))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

fn register_body(username: &str, email: &str) -> Value {
    json!({
        "username": username,
        "email": email,
        "password": "Passw0rd!",
        "confirmPassword": "Passw0rd!",
    })
}

async fn register_and_login(app: &Router, ip: &str) -> String {
    let response = send(
        app,
        post_json("/api/auth/register", ip, register_body("alice", "alice@x.com")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = send(
        app,
        post_json(
            "/api/auth/login",
            ip,
            json!({ "username": "alice", "password": "Passw0rd!" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    session_cookie(&response).unwrap()
}

#[tokio::test]
async fn test_register_login_and_gate_scenario() {
    let state = test_state();
    let store = state.store.clone();
    let sessions = state.sessions.clone();
    let app = build_router(state);

    // Register
    let response = send(
        &app,
        post_json("/api/auth/register", "10.0.0.1", register_body("alice", "alice@x.com")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    let user_id = body["userId"].as_i64().unwrap();

    // Same username, different email
    let response = send(
        &app,
        post_json("/api/auth/register", "10.0.0.1", register_body("alice", "other@x.com")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["error"], "Username already exists");

    // Same email, different username
    let response = send(
        &app,
        post_json("/api/auth/register", "10.0.0.1", register_body("bob", "alice@x.com")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["error"], "Email already exists");
    assert_eq!(store.count().unwrap(), 1);

    // Login
    let response = send(
        &app,
        post_json(
            "/api/auth/login",
            "10.0.0.2",
            json!({ "username": "alice", "password": "Passw0rd!" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-ratelimit-remaining"));
    let set_cookie = response
        .headers()
        .get(SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Strict"));
    assert!(set_cookie.contains("Max-Age=604800"));
    let cookie = session_cookie(&response).unwrap();
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["id"].as_i64(), Some(user_id));
    assert_eq!(body["user"]["username"], "alice");
    assert!(body["user"].get("password").is_none());
    assert_eq!(sessions.active_for(user_id), 1);

    let user = store.find_by_username("alice").unwrap().unwrap();
    assert_eq!(user.last_ip.as_deref(), Some("10.0.0.2"));

    // Wrong password and unknown user look the same
    let response = send(
        &app,
        post_json(
            "/api/auth/login",
            "10.0.0.3",
            json!({ "username": "alice", "password": "WrongPass1!" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(session_cookie(&response).is_none());
    assert_eq!(body_json(response).await["error"], "Invalid username or password");

    let response = send(
        &app,
        post_json(
            "/api/auth/login",
            "10.0.0.3",
            json!({ "username": "nobody", "password": "Passw0rd!" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "Invalid username or password");

    // Protected page without a cookie
    let response = send(&app, get_with_cookie("/dashboard", None)).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(response.headers()[LOCATION], "/login?callbackUrl=%2Fdashboard");

    // Protected page with the cookie
    let response = send(&app, get_with_cookie("/dashboard", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("alice"));

    // Public-only page with the cookie
    let response = send(&app, get_with_cookie("/login", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(response.headers()[LOCATION], "/dashboard");

    // Session lookup
    let response = send(&app, get_with_cookie("/api/auth/me", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({ "user": { "id": user_id, "username": "alice" } })
    );

    // Logout clears the cookie and the registry entry
    let response = send(
        &app,
        Request::post("/api/auth/logout")
            .header(COOKIE, &cookie)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let cleared = response.headers()[SET_COOKIE].to_str().unwrap().to_string();
    assert!(cleared.starts_with("auth_token=;"));
    assert!(cleared.contains("Max-Age=0"));
    assert_eq!(
        body_json(response).await,
        json!({ "success": true, "message": "Logged out successfully" })
    );
    assert_eq!(sessions.active_for(user_id), 0);
}

#[tokio::test]
async fn test_invalid_cookie_on_protected_page_is_cleared() {
    let app = build_router(test_state());

    let response = send(&app, get_with_cookie("/profile", Some("auth_token=not.a.jwt"))).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(response.headers()[LOCATION], "/login");
    let cleared = response.headers()[SET_COOKIE].to_str().unwrap();
    assert!(cleared.contains("Max-Age=0"));

    // Same bad cookie on a public-only page is just an anonymous visit
    let response = send(&app, get_with_cookie("/login", Some("auth_token=not.a.jwt"))).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_api_routes_are_not_redirected() {
    let app = build_router(test_state());

    let response = send(&app, get_with_cookie("/api/auth/me", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().get(LOCATION).is_none());

    let response = send(&app, get_with_cookie("/health", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "status": "ok" }));
}

#[tokio::test]
async fn test_login_rate_limit_blocks_sixth_attempt() {
    let app = build_router(test_state());
    let attempt = json!({ "username": "alice", "password": "Passw0rd!" });

    for expected_remaining in (0..5).rev() {
        let response = send(&app, post_json("/api/auth/login", "203.0.113.7", attempt.clone())).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers()["x-ratelimit-remaining"],
            expected_remaining.to_string().as_str()
        );
    }

    let response = send(&app, post_json("/api/auth/login", "203.0.113.7", attempt.clone())).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()["x-ratelimit-remaining"], "0");
    let retry_after: i64 = response.headers()["retry-after"]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after > 14 * 60 && retry_after <= 15 * 60);
    let body = body_json(response).await;
    assert!(body["error"].is_string());
    assert!(body["retryAfterSeconds"].as_i64().is_some());

    // Registration shares the per-address budget
    let response = send(
        &app,
        post_json("/api/auth/register", "203.0.113.7", register_body("carol", "carol@x.com")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    // A different address is unaffected
    let response = send(&app, post_json("/api/auth/login", "203.0.113.8", attempt)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_validation_errors() {
    let app = build_router(test_state());

    let response = send(
        &app,
        post_json("/api/auth/login", "10.1.0.1", json!({ "username": "al", "password": "short" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Validation failed");
    assert!(body["details"]["username"].is_array());
    assert!(body["details"]["password"].is_array());

    let response = send(
        &app,
        post_json(
            "/api/auth/register",
            "10.1.0.2",
            json!({
                "username": "bad name",
                "email": "not-an-email",
                "password": "password",
                "confirmPassword": "different",
            }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["details"]["username"].is_array());
    assert!(body["details"]["email"].is_array());
    assert!(body["details"]["password"].is_array());
    assert!(body["details"]["confirmPassword"].is_array());

    let response = send(
        &app,
        Request::post("/api/auth/login")
            .header("content-type", "application/json")
            .header("x-forwarded-for", "10.1.0.3")
            .body(Body::from("{not json"))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"].is_string());
}

struct StubSearch {
    fail: bool,
}

#[async_trait]
impl MediaSearch for StubSearch {
    async fn search(&self, query: &str, kind: MediaKind) -> Result<Vec<MediaResult>, SearchError> {
        if self.fail {
            return Err(SearchError::Status(503));
        }
        Ok(vec![MediaResult {
            id: 1,
            title: format!("{} ({})", query, kind.as_str()),
            poster_path: None,
            release_date: Some("2001-01-01".to_string()),
            overview: String::new(),
        }])
    }
}

#[tokio::test]
async fn test_search_requires_session() {
    let app = build_router(test_state().with_search(Arc::new(StubSearch { fail: false })));

    let response = send(&app, get_with_cookie("/api/tmdb/search?query=matrix&type=movie", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_search_parameters_and_results() {
    let app = build_router(test_state().with_search(Arc::new(StubSearch { fail: false })));
    let cookie = register_and_login(&app, "10.2.0.1").await;

    let response = send(&app, get_with_cookie("/api/tmdb/search?query=matrix", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(
        &app,
        get_with_cookie("/api/tmdb/search?query=matrix&type=anime", Some(&cookie)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(
        &app,
        get_with_cookie("/api/tmdb/search?query=matrix&type=tv", Some(&cookie)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["results"][0]["title"], "matrix (tv)");
    assert_eq!(body["results"][0]["release_date"], "2001-01-01");
    assert!(body["results"][0]["poster_path"].is_null());
}

#[tokio::test]
async fn test_search_without_backend_or_with_failing_upstream() {
    let app = build_router(test_state());
    let cookie = register_and_login(&app, "10.3.0.1").await;
    let response = send(
        &app,
        get_with_cookie("/api/tmdb/search?query=matrix&type=movie", Some(&cookie)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let app = build_router(test_state().with_search(Arc::new(StubSearch { fail: true })));
    let cookie = register_and_login(&app, "10.3.0.2").await;
    let response = send(
        &app,
        get_with_cookie("/api/tmdb/search?query=matrix&type=movie", Some(&cookie)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(!body_text(response).await.contains("503"));
}
