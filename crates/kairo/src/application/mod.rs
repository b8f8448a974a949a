//! Application Layer
//!
//! Orchestration on top of the ports: retries, tiering, consolidation,
//! the control loop, and the context object that wires them together.

mod consolidation;
mod context;
mod control_loop;
mod directive_queue;
mod index_writer;
mod memory_tiering;
mod resilient_caller;

pub use consolidation::*;
pub use context::*;
pub use control_loop::*;
pub use directive_queue::*;
pub use index_writer::*;
pub use memory_tiering::*;
pub use resilient_caller::*;
