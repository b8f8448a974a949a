//! In-process durable tier
//!
//! Items are partitioned by calendar day (UTC) so scans only touch the most
//! recent partitions. An id → day index keeps `get` independent of age.

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;

use crate::domain::{DomainError, MemoryItem, MemoryKind};
use crate::ports::DurableMemoryStore;

/// Default number of day partitions scanned by keyword and listing queries
pub const DEFAULT_SCAN_DAYS: usize = 30;

/// Day-partitioned durable store with an id index
pub struct InMemoryDurableStore {
    partitions: DashMap<NaiveDate, DashMap<String, MemoryItem>>,
    id_index: DashMap<String, NaiveDate>,
    scan_days: usize,
}

impl InMemoryDurableStore {
    pub fn new() -> Self {
        Self::with_scan_days(DEFAULT_SCAN_DAYS)
    }

    pub fn with_scan_days(scan_days: usize) -> Self {
        Self {
            partitions: DashMap::new(),
            id_index: DashMap::new(),
            scan_days: scan_days.max(1),
        }
    }

    /// Newest partitions first, bounded by `scan_days`
    fn recent_partition_keys(&self) -> Vec<NaiveDate> {
        let mut days: Vec<NaiveDate> = self.partitions.iter().map(|p| *p.key()).collect();
        days.sort_unstable_by(|a, b| b.cmp(a));
        days.truncate(self.scan_days);
        days
    }

    /// Walk recent partitions newest-first, collecting up to `limit` matches
    fn scan<F>(&self, limit: usize, predicate: F) -> Vec<MemoryItem>
    where
        F: Fn(&MemoryItem) -> bool,
    {
        let mut results = Vec::new();
        for day in self.recent_partition_keys() {
            if results.len() >= limit {
                break;
            }
            let Some(partition) = self.partitions.get(&day) else {
                continue;
            };
            let mut matches: Vec<MemoryItem> = partition
                .iter()
                .filter(|entry| predicate(entry.value()))
                .map(|entry| entry.value().clone())
                .collect();
            matches.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            results.extend(matches);
        }
        results.truncate(limit);
        results
    }
}

impl Default for InMemoryDurableStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DurableMemoryStore for InMemoryDurableStore {
    async fn store(&self, item: MemoryItem) -> Result<String, DomainError> {
        let day = item.timestamp.date_naive();
        let id = item.id.clone();

        // Overwrite semantics: a rewrite with a different day moves the item.
        if let Some(previous) = self.id_index.get(&id).map(|d| *d) {
            if previous != day {
                if let Some(partition) = self.partitions.get(&previous) {
                    partition.remove(&id);
                }
            }
        }

        self.partitions
            .entry(day)
            .or_default()
            .insert(id.clone(), item);
        self.id_index.insert(id.clone(), day);

        tracing::debug!("💾 Durable store wrote {} ({})", id, day);
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Option<MemoryItem>, DomainError> {
        let Some(day) = self.id_index.get(id).map(|d| *d) else {
            return Ok(None);
        };
        let Some(partition) = self.partitions.get(&day) else {
            return Ok(None);
        };
        let Some(mut entry) = partition.get_mut(id) else {
            return Ok(None);
        };
        entry.touch();
        Ok(Some(entry.clone()))
    }

    async fn search_by_keyword(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<MemoryItem>, DomainError> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.scan(limit, |item| item.matches_keyword(&needle)))
    }

    async fn list_by_kind(
        &self,
        kind: MemoryKind,
        limit: usize,
    ) -> Result<Vec<MemoryItem>, DomainError> {
        Ok(self.scan(limit, |item| item.kind == kind))
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<MemoryItem>, DomainError> {
        Ok(self.scan(limit, |_| true))
    }

    async fn count(&self) -> Result<u64, DomainError> {
        Ok(self.id_index.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn item_days_ago(days: i64, kind: MemoryKind, content: &str) -> MemoryItem {
        let mut item = MemoryItem::new(kind, content);
        item.timestamp = Utc::now() - Duration::days(days);
        item
    }

    #[tokio::test]
    async fn test_store_get_round_trip_advances_access() {
        let store = InMemoryDurableStore::new();
        let item = MemoryItem::new(MemoryKind::Learning, "Rotate logs nightly")
            .with_tags(["ops"])
            .with_importance(0.9);
        let id = store.store(item.clone()).await.unwrap();

        let fetched = store.get(&id).await.unwrap().unwrap();
        assert_eq!(fetched.access_count, item.access_count + 1);
        assert!(fetched.last_accessed_at.is_some());

        let mut normalized = fetched.clone();
        normalized.access_count = item.access_count;
        normalized.last_accessed_at = item.last_accessed_at;
        assert_eq!(normalized, item);

        let again = store.get(&id).await.unwrap().unwrap();
        assert_eq!(again.access_count, 2);
    }

    #[tokio::test]
    async fn test_get_reaches_beyond_scan_window() {
        let store = InMemoryDurableStore::with_scan_days(2);
        let ancient = item_days_ago(400, MemoryKind::Success, "migrated database");
        let id = ancient.id.clone();
        store.store(ancient).await.unwrap();
        for d in 0..5 {
            store
                .store(item_days_ago(d, MemoryKind::Observation, "routine"))
                .await
                .unwrap();
        }

        assert!(store.get(&id).await.unwrap().is_some());
        // Scans stay bounded to the newest partitions.
        assert!(store
            .search_by_keyword("migrated", 10)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(store.count().await.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_idempotent_overwrite() {
        let store = InMemoryDurableStore::new();
        let mut item = MemoryItem::new(MemoryKind::Decision, "scale out");
        store.store(item.clone()).await.unwrap();
        item.add_tag("capacity");
        store.store(item.clone()).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        let fetched = store.get(&item.id).await.unwrap().unwrap();
        assert!(fetched.tags.contains("capacity"));
    }

    #[tokio::test]
    async fn test_keyword_search_most_recent_first() {
        let store = InMemoryDurableStore::new();
        store
            .store(item_days_ago(3, MemoryKind::Observation, "Queue backlog growing"))
            .await
            .unwrap();
        store
            .store(item_days_ago(1, MemoryKind::Observation, "queue drained"))
            .await
            .unwrap();
        store
            .store(
                item_days_ago(0, MemoryKind::Decision, "add worker")
                    .with_tags(["queue-ops"]),
            )
            .await
            .unwrap();
        store
            .store(item_days_ago(0, MemoryKind::Observation, "cpu fine"))
            .await
            .unwrap();

        let hits = store.search_by_keyword("QUEUE", 10).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].content, "add worker");
        assert_eq!(hits[2].content, "Queue backlog growing");

        let limited = store.search_by_keyword("queue", 1).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_list_by_kind() {
        let store = InMemoryDurableStore::new();
        store
            .store(MemoryItem::new(MemoryKind::Success, "deployed v2"))
            .await
            .unwrap();
        store
            .store(MemoryItem::new(MemoryKind::Failure, "deploy v1 failed"))
            .await
            .unwrap();

        let successes = store.list_by_kind(MemoryKind::Success, 10).await.unwrap();
        assert_eq!(successes.len(), 1);
        assert_eq!(successes[0].content, "deployed v2");
        assert_eq!(store.list_recent(10).await.unwrap().len(), 2);
    }
}
