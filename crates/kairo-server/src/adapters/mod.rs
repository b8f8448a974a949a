//! Infrastructure Adapters
//!
//! Implementations of kairo ports for external systems.

pub mod gemini;
pub mod openai;
pub mod postgres;
pub mod qdrant;

// Re-exports
pub use gemini::GeminiReasoner;
pub use openai::OpenAiEmbedding;
pub use postgres::PgDurableMemoryStore;
pub use qdrant::QdrantSemanticIndex;
