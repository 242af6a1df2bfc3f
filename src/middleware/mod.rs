//! Middleware for request logging, client resolution, rate limiting and
//! route gating.

pub mod client_ip;
pub mod logging;
pub mod rate_limit;
pub mod route_gate;

pub use client_ip::{client_ip_middleware, ClientIp, ClientIpConfig};
pub use logging::request_logging;
pub use rate_limit::{rate_limit_middleware, RateLimitConfig, RateLimiter};
pub use route_gate::{route_gate, RouteGate};
