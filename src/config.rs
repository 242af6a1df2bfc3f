//! Runtime configuration.
//!
//! Every flag can also come from the environment; `.env` files are loaded
//! before parsing so both sources work the same way.

use anyhow::Result;
use clap::{builder::BoolishValueParser, Parser};
use std::fmt;
use std::net::SocketAddr;

use crate::auth::{jwt::validate_secret, password::DEFAULT_COST};
use crate::search::tmdb::DEFAULT_BASE_URL;

#[derive(Parser, Clone)]
#[command(name = "strm")]
#[command(about = "STRM backend - accounts, sessions and media search")]
pub struct Config {
    /// Listen address
    #[arg(long, env = "STRM_BIND", default_value = "0.0.0.0:3000")]
    pub bind: SocketAddr,

    /// SQLite database holding user accounts
    #[arg(long, env = "AUTH_DB_PATH", default_value = "data/users.db")]
    pub db_path: String,

    /// Token signing secret (at least 32 bytes)
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    /// Domain attribute for the session cookie
    #[arg(long, env = "COOKIE_DOMAIN")]
    pub cookie_domain: Option<String>,

    /// bcrypt work factor
    #[arg(long, env = "BCRYPT_COST", default_value_t = DEFAULT_COST)]
    pub bcrypt_cost: u32,

    /// TMDB API key; search answers 500 without it
    #[arg(long, env = "TMDB_API_KEY", hide_env_values = true)]
    pub tmdb_api_key: Option<String>,

    /// TMDB API base URL
    #[arg(long, env = "TMDB_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub tmdb_base_url: String,

    /// Take the client address from proxy headers (cf-connecting-ip, x-forwarded-for, x-real-ip)
    #[arg(
        long,
        env = "TRUST_PROXY_HEADERS",
        default_value = "true",
        value_parser = BoolishValueParser::new(),
        action = clap::ArgAction::Set
    )]
    pub trust_proxy_headers: bool,
}

impl Config {
    /// Reject configurations the server must not start with.
    pub fn validate(&self) -> Result<()> {
        validate_secret(&self.jwt_secret)
    }

    /// The TMDB key, if one was given and is not blank
    pub fn tmdb_api_key(&self) -> Option<&str> {
        self.tmdb_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind", &self.bind)
            .field("db_path", &self.db_path)
            .field("jwt_secret", &"<redacted>")
            .field("cookie_domain", &self.cookie_domain)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("tmdb_api_key", &self.tmdb_api_key().map(|_| "<redacted>"))
            .field("tmdb_base_url", &self.tmdb_base_url)
            .field("trust_proxy_headers", &self.trust_proxy_headers)
            .finish()
    }
}
