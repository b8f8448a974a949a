//! Memory Routes - Search and tier statistics

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use crate::models::{
    MemoryStatsResponse, SearchMemoriesRequest, SearchMemoriesResponse, DEFAULT_MIN_SCORE,
    DEFAULT_SEARCH_LIMIT,
};
use crate::routes::error_response;
use crate::AppState;

/// Search memories across both semantic tiers
///
/// Failures come back as an `error` field with empty results, never as an
/// HTTP error.
#[utoipa::path(
    post,
    path = "/memories/search",
    request_body = SearchMemoriesRequest,
    responses(
        (status = 200, description = "Search results", body = SearchMemoriesResponse)
    ),
    tag = "Memory"
)]
pub async fn search_memories(
    State(state): State<AppState>,
    Json(payload): Json<SearchMemoriesRequest>,
) -> Json<SearchMemoriesResponse> {
    let limit = payload.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
    let min_score = payload.min_score.unwrap_or(DEFAULT_MIN_SCORE);

    let response = state
        .agent
        .search_memories(&payload.query, limit, min_score)
        .await;

    Json(response.into())
}

/// Memory tier statistics
#[utoipa::path(
    get,
    path = "/memories/stats",
    responses(
        (status = 200, description = "Tier counts", body = MemoryStatsResponse),
        (status = 500, description = "Internal server error")
    ),
    tag = "Memory"
)]
pub async fn get_stats(
    State(state): State<AppState>,
) -> Result<Json<MemoryStatsResponse>, (StatusCode, String)> {
    let stats = state.agent.memory_stats().await.map_err(error_response)?;
    Ok(Json(stats.into()))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/memories/search", post(search_memories))
        .route("/memories/stats", get(get_stats))
}
