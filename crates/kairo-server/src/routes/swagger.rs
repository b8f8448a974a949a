//! OpenAPI Documentation
//!
//! Centralized API documentation using utoipa.

use utoipa::OpenApi;

use crate::models::{
    DirectiveRequest, DirectiveResponse, MemoryHitResponse, MemoryStatsResponse,
    SearchMemoriesRequest, SearchMemoriesResponse, StatusResponse,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        // Agent endpoints
        super::agent::get_status,
        super::agent::pause,
        super::agent::resume,
        super::agent::submit_directive,
        // Memory endpoints
        super::memory::search_memories,
        super::memory::get_stats,
    ),
    info(
        title = "Kairo API",
        version = "0.1.0",
        description = "Autonomous control loop with tiered memory.\n\nSteer the loop with pause, resume and directives; query what it remembers.",
        license(name = "MIT"),
    ),
    servers(
        (url = "/", description = "Current server"),
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Agent", description = "Agent - Control loop status and steering"),
        (name = "Memory", description = "Memory - Search and tier statistics"),
    ),
    components(
        schemas(
            // Agent
            StatusResponse,
            DirectiveRequest,
            DirectiveResponse,
            // Memory
            SearchMemoriesRequest,
            SearchMemoriesResponse,
            MemoryHitResponse,
            MemoryStatsResponse,
        )
    ),
)]
pub struct ApiDoc;
