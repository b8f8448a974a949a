//! Kairo Core Library
//!
//! An autonomous control loop backed by tiered memory.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain/`): Pure entities and rules
//!   - `entities/`: MemoryItem, ConsolidatedLearning, LoopState, Directive
//!   - `value_objects/`: MemoryKind, Collection, TagMatchMode
//!   - `services/`: importance scoring, cosine similarity
//!   - `errors/`: Domain-specific error types
//!
//! - **Ports** (`ports/`): Abstract interfaces (traits)
//!   - `repositories/`: recent store, durable store, semantic index
//!   - `services/`: embedding and reasoning capabilities
//!
//! - **Application** (`application/`): ResilientCaller, MemoryTieringService,
//!   ConsolidationService, ControlLoop, HumanDirectiveQueue, AgentContext
//!
//! - **Adapters** (`adapters/`): In-process implementations of the ports
//!
//! # Usage
//!
//! ```rust,ignore
//! use kairo::{AgentComponents, AgentConfig, AgentContext};
//!
//! let config = AgentConfig::default();
//! let components = AgentComponents::in_memory(&config, Some(embedder), reasoner);
//! let agent = AgentContext::build(config, components);
//! agent.start()?;
//! ```

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use application::{
    AgentComponents, AgentContext, ConsolidationReport, ControlLoop, HumanDirectiveQueue,
    MemorySearchHit, MemorySearchResponse, MemoryStats, ResilientCaller, RetryPolicy,
};
pub use config::AgentConfig;
pub use domain::{
    Collection, ConsolidatedLearning, Directive, DomainError, LoopState, LoopStatus, MemoryItem,
    MemoryKind, TagMatchMode,
};
pub use ports::{
    ConversationHandle, DurableMemoryStore, EmbeddingService, MemorySearchFilter,
    ReasoningProvider, RecentMemoryStore, ScoredMemory, SemanticIndex,
};
