//! TMDB search client.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{MediaKind, MediaResult, MediaSearch, SearchError};

pub const DEFAULT_BASE_URL: &str = "https://api.themoviedb.org/3";

pub struct TmdbClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct TmdbPage {
    #[serde(default)]
    results: Vec<TmdbItem>,
}

/// Raw TMDB hit; movies carry `title`/`release_date`, shows `name`/`first_air_date`.
#[derive(Debug, Deserialize)]
struct TmdbItem {
    id: i64,
    title: Option<String>,
    name: Option<String>,
    poster_path: Option<String>,
    release_date: Option<String>,
    first_air_date: Option<String>,
    overview: Option<String>,
}

impl TmdbItem {
    fn into_result(self) -> MediaResult {
        MediaResult {
            id: self.id,
            title: self.title.or(self.name).unwrap_or_default(),
            poster_path: self.poster_path,
            release_date: self.release_date.or(self.first_air_date),
            overview: self.overview.unwrap_or_default(),
        }
    }
}

impl TmdbClient {
    pub fn new(http: reqwest::Client, base_url: &str, api_key: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Client with its own connection pool and a 10s timeout
    pub fn with_defaults(base_url: &str, api_key: &str) -> Result<Self, SearchError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self::new(http, base_url, api_key))
    }
}

#[async_trait]
impl MediaSearch for TmdbClient {
    async fn search(&self, query: &str, kind: MediaKind) -> Result<Vec<MediaResult>, SearchError> {
        let url = format!("{}/search/{}", self.base_url, kind.as_str());
        debug!(kind = kind.as_str(), "TMDB search");

        let resp = self
            .http
            .get(&url)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("query", query),
                ("language", "en-US"),
                ("page", "1"),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(SearchError::Status(resp.status().as_u16()));
        }

        let page = resp.json::<TmdbPage>().await?;
        Ok(page.results.into_iter().map(TmdbItem::into_result).collect())
    }
}
