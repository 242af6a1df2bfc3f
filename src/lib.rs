//! STRM Backend Library
//!
//! Accounts, cookie sessions, request gating and the media search proxy.
//! The binary in `main.rs` only wires configuration to `app::build_router`.

pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod middleware;
pub mod pages;
pub mod search;

pub use app::{build_router, AppState};
pub use config::Config;
pub use error::ApiError;
