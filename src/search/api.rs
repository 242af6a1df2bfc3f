//! Search API Endpoint
//! Mission: Serve `GET /api/tmdb/search` behind the session cookie

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{MediaKind, MediaResult, SearchError};
use crate::app::AppState;
use crate::auth::models::Claims;
use crate::error::ApiError;

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<MediaResult>,
}

impl From<SearchError> for ApiError {
    fn from(err: SearchError) -> Self {
        ApiError::Upstream(err.to_string())
    }
}

/// Media search - GET /api/tmdb/search?query=..&type=movie|tv
pub async fn search(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let query = params
        .query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing query or type parameter".to_string()))?;

    let kind = params
        .kind
        .as_deref()
        .and_then(MediaKind::parse)
        .ok_or_else(|| ApiError::BadRequest("Type must be either 'movie' or 'tv'".to_string()))?;

    let backend = state
        .search
        .as_ref()
        .ok_or(ApiError::NotConfigured("TMDB API key"))?;

    let results = backend.search(query, kind).await.map_err(|e| {
        warn!("TMDB search failed for {}: {}", claims.username, e);
        ApiError::from(e)
    })?;

    info!(
        user = %claims.username,
        kind = kind.as_str(),
        hits = results.len(),
        "🔎 Media search"
    );

    Ok(Json(SearchResponse { results }))
}
