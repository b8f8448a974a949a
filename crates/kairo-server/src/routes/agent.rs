//! Agent Routes - Control loop steering
//!
//! Pause and resume act on the human pause flag only; a consolidation
//! hold is released by consolidation itself.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use crate::models::{DirectiveRequest, DirectiveResponse, StatusResponse};
use crate::routes::error_response;
use crate::AppState;

/// Get control loop status
#[utoipa::path(
    get,
    path = "/agent/status",
    responses(
        (status = 200, description = "Current loop status", body = StatusResponse)
    ),
    tag = "Agent"
)]
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(state.agent.status().into())
}

/// Pause the control loop
#[utoipa::path(
    post,
    path = "/agent/pause",
    responses(
        (status = 200, description = "Loop paused", body = StatusResponse)
    ),
    tag = "Agent"
)]
pub async fn pause(State(state): State<AppState>) -> Json<StatusResponse> {
    state.agent.control_loop.pause();
    Json(state.agent.status().into())
}

/// Resume the control loop
#[utoipa::path(
    post,
    path = "/agent/resume",
    responses(
        (status = 200, description = "Loop resumed", body = StatusResponse)
    ),
    tag = "Agent"
)]
pub async fn resume(State(state): State<AppState>) -> Json<StatusResponse> {
    state.agent.control_loop.resume();
    Json(state.agent.status().into())
}

/// Submit a human directive
#[utoipa::path(
    post,
    path = "/agent/directives",
    request_body = DirectiveRequest,
    responses(
        (status = 200, description = "Directive queued", body = DirectiveResponse),
        (status = 400, description = "Empty directive")
    ),
    tag = "Agent"
)]
pub async fn submit_directive(
    State(state): State<AppState>,
    Json(payload): Json<DirectiveRequest>,
) -> Result<Json<DirectiveResponse>, (StatusCode, String)> {
    let id = state
        .agent
        .submit_directive(&payload.text)
        .map_err(error_response)?;

    Ok(Json(DirectiveResponse {
        id,
        queued: state.agent.directives.len(),
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/agent/status", get(get_status))
        .route("/agent/pause", post(pause))
        .route("/agent/resume", post(resume))
        .route("/agent/directives", post(submit_directive))
}
