//! In-process semantic index
//!
//! Brute-force cosine ranking over per-collection maps. Suitable for tests,
//! local runs, and small deployments without a vector engine.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::domain::{cosine_similarity, Collection, DomainError, MemoryItem};
use crate::ports::{EmbeddingService, MemorySearchFilter, ScoredMemory, SemanticIndex};

/// Brute-force semantic index
pub struct InMemorySemanticIndex {
    embedding: Arc<dyn EmbeddingService>,
    collections: DashMap<Collection, DashMap<String, MemoryItem>>,
}

impl InMemorySemanticIndex {
    pub fn new(embedding: Arc<dyn EmbeddingService>) -> Self {
        let collections = DashMap::new();
        for collection in Collection::ALL {
            collections.insert(collection, DashMap::new());
        }
        Self {
            embedding,
            collections,
        }
    }

    pub fn count_in(&self, collection: Collection) -> usize {
        self.collections
            .get(&collection)
            .map(|c| c.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl SemanticIndex for InMemorySemanticIndex {
    async fn index(&self, item: &MemoryItem, collection: Collection) -> Result<(), DomainError> {
        let vector = match &item.embedding {
            Some(v) if v.len() == self.embedding.dimensions() => v.clone(),
            _ => self.embedding.embed_or_zero(&item.content).await?,
        };

        let mut stored = item.clone();
        stored.embedding = Some(vector);

        self.collections
            .entry(collection)
            .or_default()
            .insert(stored.id.clone(), stored);
        Ok(())
    }

    async fn search(
        &self,
        query_text: &str,
        collection: Collection,
        max_results: usize,
        min_score: f32,
        filter: &MemorySearchFilter,
    ) -> Result<Vec<ScoredMemory>, DomainError> {
        let query = self.embedding.embed_or_zero(query_text).await?;

        let Some(entries) = self.collections.get(&collection) else {
            return Ok(Vec::new());
        };

        let mut hits: Vec<ScoredMemory> = entries
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .filter_map(|entry| {
                let item = entry.value();
                let vector = item.embedding.as_deref()?;
                let score = cosine_similarity(&query, vector);
                (score >= min_score).then(|| ScoredMemory {
                    item: item.clone(),
                    score,
                })
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(max_results);
        Ok(hits)
    }

    async fn get_all_recent(
        &self,
        collection: Collection,
        max_results: usize,
    ) -> Result<Vec<MemoryItem>, DomainError> {
        let Some(entries) = self.collections.get(&collection) else {
            return Ok(Vec::new());
        };
        let mut items: Vec<MemoryItem> = entries.iter().map(|e| e.value().clone()).collect();
        items.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        items.truncate(max_results);
        Ok(items)
    }

    async fn delete(&self, id: &str, collection: Collection) -> Result<bool, DomainError> {
        Ok(self
            .collections
            .get(&collection)
            .map(|c| c.remove(id).is_some())
            .unwrap_or(false))
    }

    async fn count(&self) -> Result<u64, DomainError> {
        Ok(self.collections.iter().map(|c| c.value().len() as u64).sum())
    }
}
