//! LoopState - Control loop bookkeeping

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// LoopState - owned by the control loop, observers only see snapshots
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoopState {
    /// Monotonic counter of completed iterations
    pub iteration_count: u64,
    /// Paused by a human request
    pub paused_by_request: bool,
    /// Held by an in-progress consolidation
    pub held_for_consolidation: bool,
    pub is_running: bool,
    /// Last accepted human instruction
    pub current_directive: Option<String>,
}

impl LoopState {
    pub fn is_paused(&self) -> bool {
        self.paused_by_request || self.held_for_consolidation
    }

    pub fn status(&self) -> LoopStatus {
        LoopStatus {
            is_running: self.is_running,
            is_paused: self.is_paused(),
            iteration_count: self.iteration_count,
            current_directive: self.current_directive.clone(),
            timestamp: Utc::now(),
        }
    }
}

/// Status snapshot exposed to the API layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopStatus {
    pub is_running: bool,
    pub is_paused: bool,
    pub iteration_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_directive: Option<String>,
    pub timestamp: DateTime<Utc>,
}
