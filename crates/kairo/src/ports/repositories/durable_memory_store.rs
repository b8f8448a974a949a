//! Durable Memory Store Port
//!
//! Append-mostly, unbounded store of consolidated knowledge and events.
//! Writes are idempotent on id. `get` must reach items of any age.

use async_trait::async_trait;

use crate::domain::{errors::DomainError, MemoryItem, MemoryKind};

/// Repository interface for the durable tier
#[async_trait]
pub trait DurableMemoryStore: Send + Sync {
    /// Store (or overwrite) an item, returning its id
    async fn store(&self, item: MemoryItem) -> Result<String, DomainError>;

    /// Fetch by id; counts as use, so the returned item has its access advanced
    async fn get(&self, id: &str) -> Result<Option<MemoryItem>, DomainError>;

    /// Substring match across content, summary and tags, most recent first
    async fn search_by_keyword(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<MemoryItem>, DomainError>;

    async fn list_by_kind(
        &self,
        kind: MemoryKind,
        limit: usize,
    ) -> Result<Vec<MemoryItem>, DomainError>;

    async fn list_recent(&self, limit: usize) -> Result<Vec<MemoryItem>, DomainError>;

    async fn count(&self) -> Result<u64, DomainError>;
}
