//! Rate limiting middleware.
//!
//! In-memory, per-client attempt counter for the credential endpoints. Each
//! client gets a fixed counting window; going over the threshold inside a
//! window blocks the client for a longer period. State lives in one process
//! and is lost on restart, so this only suits single-instance deployments.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::middleware::client_ip::ClientIp;

pub const HEADER_REMAINING: &str = "x-ratelimit-remaining";
pub const HEADER_RESET: &str = "x-ratelimit-reset";

/// Configuration for rate limiting.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Attempts allowed per window.
    pub max_attempts: u32,
    /// Counting window.
    pub window: Duration,
    /// How long a client stays blocked after exceeding the limit.
    pub block_duration: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window: Duration::seconds(60),
            block_duration: Duration::minutes(15),
        }
    }
}

/// Outcome of a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    /// End of the current window, or of the block when denied.
    pub reset_at: DateTime<Utc>,
}

impl RateLimitDecision {
    pub fn retry_after_secs(&self) -> i64 {
        self.retry_after_secs_at(Utc::now())
    }

    /// Whole seconds until `reset_at`, rounded up.
    pub fn retry_after_secs_at(&self, now: DateTime<Utc>) -> i64 {
        let millis = (self.reset_at - now).num_milliseconds().max(0);
        (millis + 999) / 1000
    }

    /// Write `X-RateLimit-Remaining` and `X-RateLimit-Reset` (epoch millis).
    pub fn write_headers(&self, headers: &mut HeaderMap) {
        headers.insert(HEADER_REMAINING, HeaderValue::from(self.remaining));
        headers.insert(
            HEADER_RESET,
            HeaderValue::from(self.reset_at.timestamp_millis()),
        );
    }
}

#[derive(Debug, Clone)]
struct RateLimitEntry {
    count: u32,
    reset_at: DateTime<Utc>,
    blocked_until: Option<DateTime<Utc>>,
}

/// Per-client limiter; cheap to clone, all clones share one map.
#[derive(Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    state: Arc<Mutex<HashMap<String, RateLimitEntry>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Record an attempt for `key` and decide whether it may proceed.
    pub fn check(&self, key: &str) -> RateLimitDecision {
        self.check_at(key, Utc::now())
    }

    pub fn check_at(&self, key: &str, now: DateTime<Utc>) -> RateLimitDecision {
        let window = self.config.window;
        let mut state = self.state.lock();

        let entry = state.entry(key.to_string()).or_insert(RateLimitEntry {
            count: 0,
            reset_at: now + window,
            blocked_until: None,
        });

        // Window elapsed: start counting again. A running block is kept.
        if now > entry.reset_at {
            entry.count = 0;
            entry.reset_at = now + window;
        }

        if let Some(blocked_until) = entry.blocked_until {
            if now < blocked_until {
                return RateLimitDecision {
                    allowed: false,
                    remaining: 0,
                    reset_at: blocked_until,
                };
            }
            entry.blocked_until = None;
            entry.count = 0;
            entry.reset_at = now + window;
        }

        entry.count += 1;

        if entry.count > self.config.max_attempts {
            let blocked_until = now + self.config.block_duration;
            entry.blocked_until = Some(blocked_until);
            return RateLimitDecision {
                allowed: false,
                remaining: 0,
                reset_at: blocked_until,
            };
        }

        RateLimitDecision {
            allowed: true,
            remaining: self.config.max_attempts - entry.count,
            reset_at: entry.reset_at,
        }
    }

    /// Drop entries whose window and block have both run out.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Utc::now())
    }

    pub fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let mut state = self.state.lock();
        let before = state.len();
        state.retain(|_, entry| {
            let window_over = now > entry.reset_at;
            let block_over = entry.blocked_until.map_or(true, |until| now > until);
            !(window_over && block_over)
        });
        before - state.len()
    }

    pub fn tracked_clients(&self) -> usize {
        self.state.lock().len()
    }

    /// Periodic cleanup for the lifetime of the process.
    pub fn spawn_sweeper(&self, period: std::time::Duration) -> JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await; // first tick fires immediately
            loop {
                ticker.tick().await;
                let removed = limiter.sweep();
                if removed > 0 {
                    debug!(removed, remaining = limiter.tracked_clients(), "Rate limit sweep");
                }
            }
        })
    }
}

/// Rate limiting middleware function.
pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    client: ClientIp,
    request: Request,
    next: Next,
) -> Response {
    let decision = limiter.check(client.as_str());

    if !decision.allowed {
        warn!(
            client_ip = %client,
            path = %request.uri().path(),
            retry_after_secs = decision.retry_after_secs(),
            "Rate limit exceeded"
        );
        return ApiError::RateLimited(decision).into_response();
    }

    let mut response = next.run(request).await;
    decision.write_headers(response.headers_mut());
    response
}
