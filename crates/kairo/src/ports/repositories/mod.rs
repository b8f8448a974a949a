//! Repository Ports
//!
//! Abstract interfaces for the memory tiers and the semantic index.

mod durable_memory_store;
mod recent_memory_store;
mod semantic_index;

pub use durable_memory_store::*;
pub use recent_memory_store::*;
pub use semantic_index::*;
