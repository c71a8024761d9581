use axum::{extract::Query, routing::get, Extension, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    error::{AppErr, AppResult},
    resolver::{ytdlp, SearchResult},
    state::Deps,
};

const SEARCH_LIMIT: usize = 20;

#[derive(Deserialize)]
struct SearchQuery {
    q: String,
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<SearchResult>,
    total: usize,
}

pub fn router() -> Router {
    Router::new().route("/search", get(search))
}

async fn search(
    Query(query): Query<SearchQuery>,
    Extension(deps): Extension<Deps>,
) -> AppResult<Json<SearchResponse>> {
    if !deps.youtube {
        return Err(AppErr::Unavailable(
            "YouTube search not available. Please install yt-dlp".into(),
        ));
    }
    if query.q.trim().is_empty() {
        return Err(AppErr::Bad("Search query cannot be empty".into()));
    }

    info!("searching for: {}", query.q);
    let results = ytdlp::search(&query.q, SEARCH_LIMIT)
        .await
        .map_err(|e| AppErr::Internal(format!("Search failed: {e}")))?;

    Ok(Json(SearchResponse { total: results.len(), results }))
}
