//! In-process adapters
//!
//! Implementations of the ports that need nothing beyond the process itself.
//! Networked implementations (Postgres, Qdrant, OpenAI, Gemini) live in the
//! server crate.

pub mod memory;

pub use memory::*;
