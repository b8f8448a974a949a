//! Memory Tiering Service - routes writes to the right tier and builds context
//!
//! Every new item is scored, written to the recent tier synchronously, and
//! handed to the background index writer for the short-term collection.
//! Reads combine recent activity with semantically relevant durable
//! knowledge for the reasoning call.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::application::{IndexWriter, ResilientCaller};
use crate::config::TieringConfig;
use crate::domain::{Collection, DomainError, ImportanceScorer, MemoryItem, MemoryKind};
use crate::ports::{
    DurableMemoryStore, MemorySearchFilter, RecentMemoryStore, ScoredMemory, SemanticIndex,
};

const INDEX_DRAIN_GRACE: Duration = Duration::from_secs(10);

/// One search hit as exposed to the API layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorySearchHit {
    pub id: String,
    pub kind: MemoryKind,
    pub summary: String,
    pub timestamp: DateTime<Utc>,
    pub importance: f32,
    pub tags: Vec<String>,
    pub score: f32,
}

impl From<ScoredMemory> for MemorySearchHit {
    fn from(hit: ScoredMemory) -> Self {
        Self {
            id: hit.item.id,
            kind: hit.item.kind,
            summary: hit.item.summary,
            timestamp: hit.item.timestamp,
            importance: hit.item.importance,
            tags: hit.item.tags.into_iter().collect(),
            score: hit.score,
        }
    }
}

/// Search results; failures surface as `error` with empty results
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemorySearchResponse {
    pub results: Vec<MemorySearchHit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Tier counts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryStats {
    pub durable_count: u64,
    pub semantic_count: u64,
    pub semantic_enabled: bool,
    pub recent_count: usize,
}

/// Orchestrates the recent tier, the durable tier and the semantic index
pub struct MemoryTieringService {
    recent: Arc<dyn RecentMemoryStore>,
    durable: Arc<dyn DurableMemoryStore>,
    semantic: Option<Arc<dyn SemanticIndex>>,
    index_writer: Option<IndexWriter>,
    scorer: ImportanceScorer,
    storage: ResilientCaller,
    inference: ResilientCaller,
    config: TieringConfig,
}

impl MemoryTieringService {
    /// Spawns the index writer when a semantic index is configured,
    /// so this must run inside a tokio runtime.
    pub fn new(
        recent: Arc<dyn RecentMemoryStore>,
        durable: Arc<dyn DurableMemoryStore>,
        semantic: Option<Arc<dyn SemanticIndex>>,
        config: TieringConfig,
        storage: ResilientCaller,
        inference: ResilientCaller,
    ) -> Self {
        let index_writer = semantic.as_ref().map(|index| {
            IndexWriter::spawn(index.clone(), inference.clone(), config.index_queue_capacity)
        });

        if semantic.is_none() {
            tracing::info!("🧠 Semantic index disabled, falling back to keyword retrieval");
        }

        Self {
            recent,
            durable,
            semantic,
            index_writer,
            scorer: ImportanceScorer,
            storage,
            inference,
            config,
        }
    }

    pub fn recent(&self) -> &Arc<dyn RecentMemoryStore> {
        &self.recent
    }

    pub fn durable(&self) -> &Arc<dyn DurableMemoryStore> {
        &self.durable
    }

    pub fn semantic(&self) -> Option<&Arc<dyn SemanticIndex>> {
        self.semantic.as_ref()
    }

    pub fn is_semantic_enabled(&self) -> bool {
        self.semantic.is_some()
    }

    pub fn index_writer(&self) -> Option<&IndexWriter> {
        self.index_writer.as_ref()
    }

    pub fn scorer(&self) -> ImportanceScorer {
        self.scorer
    }

    pub fn storage_caller(&self) -> &ResilientCaller {
        &self.storage
    }

    /// Score and write a fresh item into the recent tier.
    ///
    /// The short-term index write happens in the background and never fails
    /// this call.
    pub async fn record(
        &self,
        mut item: MemoryItem,
        cancel: &CancellationToken,
    ) -> Result<MemoryItem, DomainError> {
        self.scorer.apply(&mut item);
        let key = item.id.clone();

        self.storage
            .call("recent.put", cancel, || {
                self.recent.put(&key, item.clone(), None)
            })
            .await?;

        tracing::debug!(
            "📝 Recorded {} {} (importance {:.2})",
            item.kind,
            item.id,
            item.importance
        );

        if let Some(writer) = &self.index_writer {
            writer.dispatch(item.clone(), Collection::ShortTerm);
        }
        Ok(item)
    }

    /// Score and write an item into the durable tier, then queue it for the
    /// long-term index. Scoring never lowers a value set by the caller.
    pub async fn record_durable(
        &self,
        mut item: MemoryItem,
        cancel: &CancellationToken,
    ) -> Result<String, DomainError> {
        self.scorer.apply(&mut item);
        let id = self
            .storage
            .call("durable.store", cancel, || self.durable.store(item.clone()))
            .await?;

        if let Some(writer) = &self.index_writer {
            writer.dispatch(item, Collection::LongTerm);
        }
        Ok(id)
    }

    /// Recent activity followed by relevant durable knowledge, as prompt text
    pub async fn build_combined_context(
        &self,
        task_description: &str,
        max_recent: usize,
        max_relevant: usize,
        cancel: &CancellationToken,
    ) -> Result<String, DomainError> {
        let recent = self
            .storage
            .call("recent.list_recent", cancel, || {
                self.recent.list_recent(max_recent)
            })
            .await?;
        let relevant = self
            .relevant_durable(task_description, max_relevant, cancel)
            .await?;

        let mut context = String::new();

        context.push_str("## Recent activity\n");
        if recent.is_empty() {
            context.push_str("(nothing recorded yet)\n");
        }
        for item in &recent {
            context.push_str(&format!(
                "- [{}] ({}) {}\n",
                item.timestamp.format("%Y-%m-%d %H:%M"),
                item.kind,
                item.context_text(self.config.full_content_importance)
            ));
        }

        if !relevant.is_empty() {
            context.push_str("\n## Relevant knowledge\n");
            for hit in &relevant {
                context.push_str(&format!(
                    "- ({}, similarity {:.2}) {}\n",
                    hit.item.kind,
                    hit.score,
                    hit.item.context_text(self.config.full_content_importance)
                ));
            }
        }

        Ok(context)
    }

    /// Semantic long-term hits, or keyword hits when the index is missing or failing
    async fn relevant_durable(
        &self,
        query: &str,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<ScoredMemory>, DomainError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        if let Some(index) = &self.semantic {
            let filter = MemorySearchFilter::default();
            let result = self
                .inference
                .call("semantic_index.search", cancel, || {
                    index.search(
                        query,
                        Collection::LongTerm,
                        limit,
                        self.config.long_term_min_score,
                        &filter,
                    )
                })
                .await;
            match result {
                Ok(hits) => return Ok(hits),
                Err(DomainError::Cancelled) => return Err(DomainError::Cancelled),
                Err(e) => {
                    tracing::warn!("⚠️  Semantic retrieval failed, using keywords: {}", e);
                }
            }
        }

        let items = self
            .storage
            .call("durable.search_by_keyword", cancel, || {
                self.durable.search_by_keyword(query, limit)
            })
            .await?;
        Ok(items
            .into_iter()
            .map(|item| ScoredMemory { item, score: 1.0 })
            .collect())
    }

    /// Highest-scoring durable Success item above the duplicate threshold
    pub async fn find_similar_completed_task(
        &self,
        description: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<ScoredMemory>, DomainError> {
        let Some(index) = &self.semantic else {
            return Ok(None);
        };
        if description.trim().is_empty() {
            return Ok(None);
        }

        let filter = MemorySearchFilter::kinds([MemoryKind::Success]);
        let hits = self
            .inference
            .call("semantic_index.search", cancel, || {
                index.search(
                    description,
                    Collection::LongTerm,
                    1,
                    self.config.duplicate_task_min_score,
                    &filter,
                )
            })
            .await?;

        Ok(hits.into_iter().next())
    }

    /// Search both collections (or keywords when the index is disabled).
    ///
    /// Never fails; errors come back in the response.
    pub async fn search_memories(
        &self,
        query: &str,
        max_results: usize,
        min_score: f32,
        cancel: &CancellationToken,
    ) -> MemorySearchResponse {
        match self.try_search(query, max_results, min_score, cancel).await {
            Ok(hits) => MemorySearchResponse {
                results: hits.into_iter().map(MemorySearchHit::from).collect(),
                error: None,
            },
            Err(e) => {
                tracing::warn!("⚠️  Memory search failed: {}", e);
                MemorySearchResponse {
                    results: Vec::new(),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn try_search(
        &self,
        query: &str,
        max_results: usize,
        min_score: f32,
        cancel: &CancellationToken,
    ) -> Result<Vec<ScoredMemory>, DomainError> {
        if query.trim().is_empty() {
            return Err(DomainError::Validation("query must not be empty".into()));
        }

        let Some(index) = &self.semantic else {
            let items = self
                .storage
                .call("durable.search_by_keyword", cancel, || {
                    self.durable.search_by_keyword(query, max_results)
                })
                .await?;
            return Ok(items
                .into_iter()
                .map(|item| ScoredMemory { item, score: 1.0 })
                .collect());
        };

        let filter = MemorySearchFilter::default();
        let mut hits = Vec::new();
        for collection in Collection::ALL {
            let found = self
                .inference
                .call("semantic_index.search", cancel, || {
                    index.search(query, collection, max_results, min_score, &filter)
                })
                .await?;
            hits.extend(found);
        }

        // A promoted item lives in both collections under the same id.
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        let mut seen = std::collections::HashSet::new();
        hits.retain(|hit| seen.insert(hit.item.id.clone()));
        hits.truncate(max_results);
        Ok(hits)
    }

    pub async fn stats(&self) -> Result<MemoryStats, DomainError> {
        let durable_count = self.durable.count().await?;
        let recent_count = self.recent.count().await?;
        let semantic_count = match &self.semantic {
            Some(index) => index.count().await?,
            None => 0,
        };

        Ok(MemoryStats {
            durable_count,
            semantic_count,
            semantic_enabled: self.semantic.is_some(),
            recent_count,
        })
    }

    /// Drain pending background index writes
    pub async fn shutdown(&self) {
        if let Some(writer) = &self.index_writer {
            writer.shutdown(INDEX_DRAIN_GRACE).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryDurableStore, InMemoryRecentStore, InMemorySemanticIndex};
    use crate::testing::StubEmbedding;

    fn service_with(
        embedding: Arc<StubEmbedding>,
    ) -> (MemoryTieringService, Arc<InMemorySemanticIndex>) {
        let index = Arc::new(InMemorySemanticIndex::new(embedding));
        let service = MemoryTieringService::new(
            Arc::new(InMemoryRecentStore::with_limits(100, Duration::from_secs(3600))),
            Arc::new(InMemoryDurableStore::new()),
            Some(index.clone()),
            TieringConfig::default(),
            ResilientCaller::storage(),
            ResilientCaller::storage(),
        );
        (service, index)
    }

    #[tokio::test]
    async fn test_similar_task_picks_highest_success() {
        let embedding = Arc::new(StubEmbedding::new(2));
        embedding.set("deploy the api", vec![1.0, 0.0]);
        embedding.set("deployed api v2", vec![0.9, 0.19f32.sqrt()]);
        embedding.set("deployed api v1", vec![0.86, (1.0f32 - 0.7396).sqrt()]);
        embedding.set("deploy failed", vec![1.0, 0.0]);
        let (service, index) = service_with(embedding);

        for (kind, text) in [
            (MemoryKind::Success, "deployed api v2"),
            (MemoryKind::Success, "deployed api v1"),
            (MemoryKind::Failure, "deploy failed"),
        ] {
            let item = MemoryItem::new(kind, text);
            index.index(&item, Collection::LongTerm).await.unwrap();
        }

        let cancel = CancellationToken::new();
        let hit = service
            .find_similar_completed_task("deploy the api", &cancel)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.item.content, "deployed api v2");
        assert!((hit.score - 0.9).abs() < 1e-3);
    }

    #[tokio::test]
    async fn test_similar_task_none_below_threshold() {
        let embedding = Arc::new(StubEmbedding::new(2));
        embedding.set("rotate keys", vec![1.0, 0.0]);
        embedding.set("rotated certs", vec![0.84, (1.0f32 - 0.7056).sqrt()]);
        let (service, index) = service_with(embedding);

        let item = MemoryItem::new(MemoryKind::Success, "rotated certs");
        index.index(&item, Collection::LongTerm).await.unwrap();

        let cancel = CancellationToken::new();
        let hit = service
            .find_similar_completed_task("rotate keys", &cancel)
            .await
            .unwrap();
        assert!(hit.is_none());
    }

    #[tokio::test]
    async fn test_record_scores_and_fans_out() {
        let (service, index) = service_with(Arc::new(StubEmbedding::new(2)));
        let cancel = CancellationToken::new();

        let stored = service
            .record(MemoryItem::new(MemoryKind::Reflection, "batch the writes"), &cancel)
            .await
            .unwrap();
        assert!((stored.importance - 0.8).abs() < 1e-6);
        assert!(service.recent().get(&stored.id).await.unwrap().is_some());

        service.index_writer().unwrap().wait_idle().await;
        let indexed = index.get_all_recent(Collection::ShortTerm, 10).await.unwrap();
        assert_eq!(indexed.len(), 1);

        let stats = service.stats().await.unwrap();
        assert_eq!(stats.recent_count, 1);
        assert_eq!(stats.semantic_count, 1);
        assert!(stats.semantic_enabled);
        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_context_uses_full_content_only_when_important() {
        let (service, _) = service_with(Arc::new(StubEmbedding::new(2)));
        let cancel = CancellationToken::new();

        let important = format!("IMPORTANT {}", "detail ".repeat(40));
        let routine = format!("ROUTINE {}", "noise ".repeat(40));
        service
            .record(MemoryItem::new(MemoryKind::Reflection, important.clone()), &cancel)
            .await
            .unwrap();
        service
            .record(MemoryItem::new(MemoryKind::Observation, routine.clone()), &cancel)
            .await
            .unwrap();

        let context = service
            .build_combined_context("anything", 10, 5, &cancel)
            .await
            .unwrap();

        assert!(context.contains(important.as_str()));
        assert!(!context.contains(routine.as_str()));
        assert!(context.contains("ROUTINE noise"));
        assert!(context.contains("..."));
    }

    #[tokio::test]
    async fn test_search_without_index_uses_keywords() {
        let service = MemoryTieringService::new(
            Arc::new(InMemoryRecentStore::with_limits(10, Duration::from_secs(60))),
            Arc::new(InMemoryDurableStore::new()),
            None,
            TieringConfig::default(),
            ResilientCaller::storage(),
            ResilientCaller::storage(),
        );
        let cancel = CancellationToken::new();
        service
            .record_durable(MemoryItem::new(MemoryKind::Learning, "Cache warmup halves latency"), &cancel)
            .await
            .unwrap();

        let response = service.search_memories("warmup", 5, 0.0, &cancel).await;
        assert!(response.error.is_none());
        assert_eq!(response.results.len(), 1);
        assert!((response.results[0].importance - 0.9).abs() < 1e-6);

        let empty = service.search_memories("  ", 5, 0.0, &cancel).await;
        assert!(empty.results.is_empty());
        assert!(empty.error.is_some());

        let stats = service.stats().await.unwrap();
        assert!(!stats.semantic_enabled);
        assert_eq!(stats.durable_count, 1);
    }
}
