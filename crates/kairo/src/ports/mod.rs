//! Ports (Interfaces)
//!
//! Abstract interfaces that define how the core interacts with
//! storage engines and external capabilities.
//!
//! In-process implementations live in `adapters`; networked ones
//! live in the server crate.

pub mod repositories;
pub mod services;

// Re-exports
pub use repositories::*;
pub use services::*;
