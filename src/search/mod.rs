//! Media Search
//! Mission: Proxy title searches to TMDB for signed-in users

pub mod api;
pub mod tmdb;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use tmdb::TmdbClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Tv,
}

impl MediaKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "movie" => Some(MediaKind::Movie),
            "tv" => Some(MediaKind::Tv),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Tv => "tv",
        }
    }
}

/// One search hit, normalized across movies and TV shows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaResult {
    pub id: i64,
    pub title: String,
    pub poster_path: Option<String>,
    pub release_date: Option<String>,
    pub overview: String,
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("request failed: {0}")]
    Request(reqwest::Error),
    #[error("upstream returned status {0}")]
    Status(u16),
}

// The request URL carries the API key; it never reaches an error message.
impl From<reqwest::Error> for SearchError {
    fn from(err: reqwest::Error) -> Self {
        SearchError::Request(err.without_url())
    }
}

/// Media metadata backend
#[async_trait]
pub trait MediaSearch: Send + Sync {
    async fn search(&self, query: &str, kind: MediaKind) -> Result<Vec<MediaResult>, SearchError>;
}
