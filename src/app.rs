//! Application state and router assembly.

use anyhow::{Context, Result};
use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tracing::{info, warn};

use crate::auth::{
    api as auth_api, auth_middleware, JwtHandler, PasswordHasher, SessionCookies,
    SessionRegistry, UserStore,
};
use crate::config::Config;
use crate::middleware::{
    client_ip_middleware, rate_limit_middleware, request_logging, route_gate, ClientIpConfig,
    RateLimitConfig, RateLimiter, RouteGate,
};
use crate::pages;
use crate::search::{api as search_api, MediaSearch, TmdbClient};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<UserStore>,
    pub hasher: PasswordHasher,
    pub jwt: Arc<JwtHandler>,
    pub cookies: SessionCookies,
    pub sessions: Arc<SessionRegistry>,
    pub limiter: RateLimiter,
    pub gate: Arc<RouteGate>,
    pub search: Option<Arc<dyn MediaSearch>>,
    pub client_ip: ClientIpConfig,
}

impl AppState {
    /// State with default cookie, limiter, gate and proxy settings and no
    /// search backend.
    pub fn new(store: Arc<UserStore>, jwt: Arc<JwtHandler>, hasher: PasswordHasher) -> Self {
        Self {
            store,
            hasher,
            jwt,
            cookies: SessionCookies::default(),
            sessions: Arc::new(SessionRegistry::new()),
            limiter: RateLimiter::new(RateLimitConfig::default()),
            gate: Arc::new(RouteGate::default()),
            search: None,
            client_ip: ClientIpConfig::default(),
        }
    }

    pub fn with_search(mut self, search: Arc<dyn MediaSearch>) -> Self {
        self.search = Some(search);
        self
    }

    pub fn with_cookies(mut self, cookies: SessionCookies) -> Self {
        self.cookies = cookies;
        self
    }

    pub fn with_client_ip(mut self, client_ip: ClientIpConfig) -> Self {
        self.client_ip = client_ip;
        self
    }

    /// Open the user database and wire every component from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = Arc::new(UserStore::new(&config.db_path)?);
        let jwt = Arc::new(JwtHandler::new(&config.jwt_secret));
        let hasher = PasswordHasher::new(config.bcrypt_cost);

        let mut state = Self::new(store, jwt, hasher)
            .with_cookies(SessionCookies::new(config.cookie_domain.clone()))
            .with_client_ip(ClientIpConfig {
                trust_proxy_headers: config.trust_proxy_headers,
            });

        match config.tmdb_api_key() {
            Some(key) => {
                let client = TmdbClient::with_defaults(&config.tmdb_base_url, key)
                    .context("Failed to build TMDB client")?;
                state = state.with_search(Arc::new(client));
                info!("🎬 TMDB search enabled via {}", config.tmdb_base_url);
            }
            None => warn!("TMDB_API_KEY not set; media search will answer 500"),
        }

        let limits = state.limiter.config();
        info!(
            bcrypt_cost = state.hasher.cost(),
            token_ttl_days = state.jwt.ttl().num_days(),
            max_attempts = limits.max_attempts,
            window_secs = limits.window.num_seconds(),
            block_mins = limits.block_duration.num_minutes(),
            "🔐 Auth settings"
        );

        if !config.trust_proxy_headers {
            info!("Proxy headers ignored; client address comes from the socket peer");
        }

        Ok(state)
    }
}

/// Build the full HTTP router.
///
/// Request path through the layers: panic catcher, client address
/// resolution, request logging, route gate, then the route itself (with the
/// rate limiter or the cookie check where a route needs one).
pub fn build_router(state: AppState) -> Router {
    // Credential endpoints are rate limited per client address
    let limited_routes = Router::new()
        .route("/api/auth/login", post(auth_api::login))
        .route("/api/auth/register", post(auth_api::register))
        .route_layer(from_fn_with_state(
            state.limiter.clone(),
            rate_limit_middleware,
        ));

    // API routes that need a valid session cookie
    let protected_routes = Router::new()
        .route("/api/auth/me", get(auth_api::get_current_user))
        .route("/api/tmdb/search", get(search_api::search))
        .route_layer(from_fn_with_state(state.jwt.clone(), auth_middleware));

    let public_routes = Router::new()
        .route("/api/auth/logout", post(auth_api::logout))
        .route("/health", get(pages::health))
        .merge(pages::router());

    Router::new()
        .merge(limited_routes)
        .merge(protected_routes)
        .merge(public_routes)
        .layer(from_fn_with_state(state.clone(), route_gate))
        .layer(from_fn(request_logging))
        .layer(from_fn_with_state(state.client_ip, client_ip_middleware))
        .layer(CatchPanicLayer::new())
        .with_state(state)
}
