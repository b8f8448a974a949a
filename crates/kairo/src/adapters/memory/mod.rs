//! In-memory storage tiers

mod durable;
mod recent;
mod semantic;

pub use durable::*;
pub use recent::*;
pub use semantic::*;
