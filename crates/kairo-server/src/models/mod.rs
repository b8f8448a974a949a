//! Kairo API Data Models
//!
//! - Agent: loop status, pause/resume, directives
//! - Memory: search and tier statistics

mod agent;
mod memory;

pub use agent::*;
pub use memory::*;
