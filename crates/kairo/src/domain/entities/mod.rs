//! Domain Entities
//!
//! Pure domain models without infrastructure dependencies.
//! - MemoryItem: a recorded observation, decision, outcome or learning
//! - ConsolidatedLearning: knowledge distilled by consolidation
//! - LoopState: control loop bookkeeping
//! - Directive: human-submitted instruction

mod directive;
mod learning;
mod loop_state;
mod memory_item;

pub use directive::*;
pub use learning::*;
pub use loop_state::*;
pub use memory_item::*;
