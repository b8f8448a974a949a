//! Memory search DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use kairo::{MemorySearchHit, MemorySearchResponse, MemoryStats};

pub const DEFAULT_SEARCH_LIMIT: usize = 10;
pub const DEFAULT_MIN_SCORE: f32 = 0.3;

/// Search memories request
#[derive(Debug, Deserialize, ToSchema)]
pub struct SearchMemoriesRequest {
    pub query: String,
    pub limit: Option<usize>,
    pub min_score: Option<f32>,
}

/// One search hit
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MemoryHitResponse {
    pub id: String,
    pub kind: String,
    pub summary: String,
    pub timestamp: DateTime<Utc>,
    pub importance: f32,
    pub tags: Vec<String>,
    pub score: f32,
}

impl From<MemorySearchHit> for MemoryHitResponse {
    fn from(hit: MemorySearchHit) -> Self {
        Self {
            id: hit.id,
            kind: hit.kind.to_string(),
            summary: hit.summary,
            timestamp: hit.timestamp,
            importance: hit.importance,
            tags: hit.tags,
            score: hit.score,
        }
    }
}

/// Search results; on failure `results` is empty and `error` is set
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SearchMemoriesResponse {
    pub results: Vec<MemoryHitResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<MemorySearchResponse> for SearchMemoriesResponse {
    fn from(response: MemorySearchResponse) -> Self {
        Self {
            results: response.results.into_iter().map(Into::into).collect(),
            error: response.error,
        }
    }
}

/// Memory tier statistics
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MemoryStatsResponse {
    pub recent_count: usize,
    pub durable_count: u64,
    pub semantic_count: u64,
    pub semantic_enabled: bool,
}

impl From<MemoryStats> for MemoryStatsResponse {
    fn from(stats: MemoryStats) -> Self {
        Self {
            recent_count: stats.recent_count,
            durable_count: stats.durable_count,
            semantic_count: stats.semantic_count,
            semantic_enabled: stats.semantic_enabled,
        }
    }
}
