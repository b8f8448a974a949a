//! Domain Services
//!
//! Stateless rules shared by the application layer.

mod importance;
mod similarity;

pub use importance::*;
pub use similarity::*;
