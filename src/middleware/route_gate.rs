//! Route gate for navigational requests.
//!
//! Every page request passes through here before it renders. The session
//! cookie is verified and the request is allowed or redirected depending on
//! whether the path is protected, public-only (login/register) or open.
//! API routes, static assets and the favicon are not gated; API handlers do
//! their own token checks.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::{debug, info};

use crate::app::AppState;
use crate::auth::{cookie::SessionCookies, jwt::JwtHandler, models::Claims};
use crate::middleware::client_ip::ClientIp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// Requires a valid session.
    Protected,
    /// Only for anonymous visitors; signed-in users are sent to the landing page.
    PublicOnly,
    Open,
}

/// What the cookie said about the visitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenState {
    Missing,
    Valid(Claims),
    /// Present but expired, tampered with or malformed.
    Invalid,
}

impl TokenState {
    pub fn from_token(jwt: &JwtHandler, token: Option<&str>) -> Self {
        match token {
            None => TokenState::Missing,
            Some(token) => match jwt.verify(token) {
                Ok(claims) => TokenState::Valid(claims),
                Err(_) => TokenState::Invalid,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow { claims: Option<Claims> },
    Redirect { location: String, clear_cookie: bool },
}

/// Path classification tables.
#[derive(Debug, Clone)]
pub struct RouteGate {
    protected: Vec<&'static str>,
    public_only: Vec<&'static str>,
    ungated: Vec<&'static str>,
    login_path: &'static str,
    landing_path: &'static str,
}

impl Default for RouteGate {
    fn default() -> Self {
        Self {
            protected: vec!["/dashboard", "/profile"],
            public_only: vec!["/login", "/register"],
            ungated: vec!["/api", "/static", "/favicon.ico", "/health"],
            login_path: "/login",
            landing_path: "/dashboard",
        }
    }
}

impl RouteGate {
    /// Whether the gate applies to `path` at all.
    pub fn is_gated(&self, path: &str) -> bool {
        !self.ungated.iter().any(|prefix| matches_prefix(path, prefix))
    }

    pub fn classify(&self, path: &str) -> RouteClass {
        if self.protected.iter().any(|prefix| matches_prefix(path, prefix)) {
            RouteClass::Protected
        } else if self.public_only.iter().any(|prefix| matches_prefix(path, prefix)) {
            RouteClass::PublicOnly
        } else {
            RouteClass::Open
        }
    }

    pub fn decide(&self, path: &str, token: TokenState) -> GateDecision {
        let class = self.classify(path);

        match token {
            TokenState::Valid(claims) => {
                if class == RouteClass::PublicOnly {
                    GateDecision::Redirect {
                        location: self.landing_path.to_string(),
                        clear_cookie: false,
                    }
                } else {
                    GateDecision::Allow {
                        claims: Some(claims),
                    }
                }
            }
            TokenState::Invalid => {
                if class == RouteClass::Protected {
                    GateDecision::Redirect {
                        location: self.login_path.to_string(),
                        clear_cookie: true,
                    }
                } else {
                    GateDecision::Allow { claims: None }
                }
            }
            TokenState::Missing => {
                if class == RouteClass::Protected {
                    GateDecision::Redirect {
                        location: self.login_redirect(path),
                        clear_cookie: false,
                    }
                } else {
                    GateDecision::Allow { claims: None }
                }
            }
        }
    }

    /// `/login?callbackUrl=<path>` with the path form-encoded.
    fn login_redirect(&self, path: &str) -> String {
        let callback: String = url::form_urlencoded::byte_serialize(path.as_bytes()).collect();
        format!("{}?callbackUrl={}", self.login_path, callback)
    }
}

/// Matches `prefix` itself or anything below it, on segment boundaries.
fn matches_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || prefix.ends_with('/'),
        None => false,
    }
}

/// Route gate middleware function.
pub async fn route_gate(
    State(state): State<AppState>,
    client: ClientIp,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if !state.gate.is_gated(&path) {
        return next.run(request).await;
    }

    let token = SessionCookies::read(request.headers());
    let token_state = TokenState::from_token(&state.jwt, token.as_deref());

    match state.gate.decide(&path, token_state) {
        GateDecision::Allow { claims } => {
            if let Some(claims) = claims {
                request.extensions_mut().insert(claims);
            }
            next.run(request).await
        }
        GateDecision::Redirect {
            location,
            clear_cookie,
        } => {
            info!(client_ip = %client, path = %path, location = %location, "Route gate redirect");
            let mut response = Redirect::temporary(&location).into_response();
            if clear_cookie {
                if let Err(e) = state.cookies.clear(response.headers_mut()) {
                    debug!("Could not build cookie clearing header: {}", e);
                }
            }
            response
        }
    }
}
