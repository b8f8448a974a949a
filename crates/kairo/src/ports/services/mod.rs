//! Service Ports
//!
//! Abstract interfaces for external capabilities.

mod embedding;
mod reasoning;

pub use embedding::*;
pub use reasoning::*;
