//! Client address resolution.
//!
//! The address keys the rate limiter and is stored as a user's last known
//! address. Behind a reverse proxy the socket peer is the proxy itself, so
//! forwarding headers are consulted first. Those headers are client
//! controlled unless a trusted proxy overwrites them: with
//! `trust_proxy_headers` on, a client talking to the server directly can
//! pick its own rate-limit key.

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::convert::Infallible;
use std::fmt;
use std::net::SocketAddr;

pub const UNKNOWN_CLIENT: &str = "unknown";

#[derive(Debug, Clone, Copy)]
pub struct ClientIpConfig {
    pub trust_proxy_headers: bool,
}

impl Default for ClientIpConfig {
    fn default() -> Self {
        Self {
            trust_proxy_headers: true,
        }
    }
}

/// Best-effort client address attached to every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl ClientIp {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `cf-connecting-ip`, then the first `x-forwarded-for` hop, then
    /// `x-real-ip`, then the socket peer.
    pub fn resolve(headers: &HeaderMap, peer: Option<SocketAddr>, config: ClientIpConfig) -> Self {
        if config.trust_proxy_headers {
            let from_headers = header_value(headers, "cf-connecting-ip")
                .or_else(|| {
                    header_value(headers, "x-forwarded-for")
                        .and_then(|v| v.split(',').next().map(|first| first.trim().to_string()))
                        .filter(|first| !first.is_empty())
                })
                .or_else(|| header_value(headers, "x-real-ip"));

            if let Some(addr) = from_headers {
                return Self(addr);
            }
        }

        match peer {
            Some(addr) => Self(addr.ip().to_string()),
            None => Self(UNKNOWN_CLIENT.to_string()),
        }
    }
}

impl fmt::Display for ClientIp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(ip) = parts.extensions.get::<ClientIp>() {
            return Ok(ip.clone());
        }
        // Not behind `client_ip_middleware`: resolve on the spot.
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(Self::resolve(&parts.headers, peer, ClientIpConfig::default()))
    }
}

/// Resolve the client address once and stash it in the request extensions.
pub async fn client_ip_middleware(
    State(config): State<ClientIpConfig>,
    mut request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip = ClientIp::resolve(request.headers(), peer, config);
    request.extensions_mut().insert(ip);
    next.run(request).await
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
