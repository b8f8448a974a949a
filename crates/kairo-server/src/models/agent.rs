//! Agent control DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use kairo::LoopStatus;

/// Control loop status
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StatusResponse {
    pub is_running: bool,
    pub is_paused: bool,
    pub iteration_count: u64,
    pub current_directive: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl From<LoopStatus> for StatusResponse {
    fn from(status: LoopStatus) -> Self {
        Self {
            is_running: status.is_running,
            is_paused: status.is_paused,
            iteration_count: status.iteration_count,
            current_directive: status.current_directive,
            timestamp: status.timestamp,
        }
    }
}

/// Submit directive request
#[derive(Debug, Deserialize, ToSchema)]
pub struct DirectiveRequest {
    pub text: String,
}

/// Submit directive response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DirectiveResponse {
    pub id: String,
    /// Directives waiting, including this one
    pub queued: usize,
}
