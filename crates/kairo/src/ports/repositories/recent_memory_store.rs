//! Recent Memory Store Port
//!
//! Bounded, time-expiring store of the most recent items.
//! No semantic ranking; reads of expired keys are misses, not errors.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{errors::DomainError, MemoryItem};

/// Repository interface for the recent tier
#[async_trait]
pub trait RecentMemoryStore: Send + Sync {
    /// Insert or overwrite. `ttl = None` uses the store default.
    /// Inserting a new key at capacity evicts the oldest item by timestamp.
    async fn put(
        &self,
        key: &str,
        item: MemoryItem,
        ttl: Option<Duration>,
    ) -> Result<(), DomainError>;

    /// Fetch a live item; counts as use
    async fn get(&self, key: &str) -> Result<Option<MemoryItem>, DomainError>;

    /// Replace a live item's value, keeping its original expiry.
    /// Returns false when the key is absent or expired.
    async fn update(&self, key: &str, item: MemoryItem) -> Result<bool, DomainError>;

    async fn delete(&self, key: &str) -> Result<bool, DomainError>;

    /// Live keys matching a glob pattern (`*`, `?`)
    async fn list_keys(&self, pattern: &str) -> Result<Vec<String>, DomainError>;

    /// Live items, newest first
    async fn list_recent(&self, limit: usize) -> Result<Vec<MemoryItem>, DomainError>;

    /// Physically drop expired entries, returning how many went
    async fn purge_expired(&self) -> Result<usize, DomainError>;

    async fn count(&self) -> Result<usize, DomainError>;
}
