//! Semantic Index Port
//!
//! Embedding-backed similarity search over named collections.
//! Implementations embed text themselves through an `EmbeddingService`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{errors::DomainError, Collection, MemoryItem, MemoryKind, TagMatchMode};

/// Search filter for semantic queries (conjunction of all set fields)
#[derive(Debug, Default, Clone)]
pub struct MemorySearchFilter {
    /// Kind must be one of these (empty = any)
    pub kinds: Vec<MemoryKind>,
    /// Filter by tags
    pub tags: Vec<String>,
    /// Tag matching mode
    pub tags_match_mode: TagMatchMode,
    /// Minimum importance score
    pub min_importance: Option<f32>,
    /// Inclusive lower bound on timestamp
    pub since: Option<DateTime<Utc>>,
    /// Inclusive upper bound on timestamp
    pub until: Option<DateTime<Utc>>,
}

impl MemorySearchFilter {
    pub fn kinds(kinds: impl IntoIterator<Item = MemoryKind>) -> Self {
        Self {
            kinds: kinds.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn matches(&self, item: &MemoryItem) -> bool {
        if !self.kinds.is_empty() && !self.kinds.contains(&item.kind) {
            return false;
        }
        if !self.tags_match_mode.matches(&self.tags, &item.tags) {
            return false;
        }
        if let Some(min) = self.min_importance {
            if item.importance < min {
                return false;
            }
        }
        if let Some(since) = self.since {
            if item.timestamp < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if item.timestamp > until {
                return false;
            }
        }
        true
    }
}

/// A search hit with its cosine similarity
#[derive(Debug, Clone, Serialize)]
pub struct ScoredMemory {
    pub item: MemoryItem,
    pub score: f32,
}

/// Repository interface for the semantic index
#[async_trait]
pub trait SemanticIndex: Send + Sync {
    /// Embed and upsert an item into a collection
    async fn index(&self, item: &MemoryItem, collection: Collection) -> Result<(), DomainError>;

    /// Similarity search, best first, keeping only `score >= min_score`
    async fn search(
        &self,
        query_text: &str,
        collection: Collection,
        max_results: usize,
        min_score: f32,
        filter: &MemorySearchFilter,
    ) -> Result<Vec<ScoredMemory>, DomainError>;

    /// Pure recency, no ranking
    async fn get_all_recent(
        &self,
        collection: Collection,
        max_results: usize,
    ) -> Result<Vec<MemoryItem>, DomainError>;

    async fn delete(&self, id: &str, collection: Collection) -> Result<bool, DomainError>;

    /// Total entries across all collections
    async fn count(&self) -> Result<u64, DomainError>;
}
