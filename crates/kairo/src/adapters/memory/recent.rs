//! In-process recent tier
//!
//! Entries live in a `DashMap`. Inserts of new keys go through a write gate
//! so that capacity checks and eviction are exact under concurrent writers;
//! reads never take the gate.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::config::RecentStoreConfig;
use crate::domain::{DomainError, MemoryItem};
use crate::ports::RecentMemoryStore;

struct RecentEntry {
    item: MemoryItem,
    expires_at: Instant,
}

impl RecentEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Bounded, TTL-expiring recent store.
///
/// Overflow evicts the oldest item by its own timestamp, not the least
/// recently read one.
pub struct InMemoryRecentStore {
    entries: DashMap<String, RecentEntry>,
    write_gate: Mutex<()>,
    capacity: usize,
    default_ttl: Duration,
}

impl InMemoryRecentStore {
    pub fn new(config: &RecentStoreConfig) -> Self {
        Self::with_limits(config.capacity, config.ttl())
    }

    pub fn with_limits(capacity: usize, default_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            write_gate: Mutex::new(()),
            capacity: capacity.max(1),
            default_ttl,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn purge_expired_now(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        before - self.entries.len()
    }

    fn evict_oldest(&self) -> Option<String> {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().item.timestamp)
            .map(|entry| entry.key().clone())?;
        self.entries.remove(&oldest);
        Some(oldest)
    }
}

#[async_trait]
impl RecentMemoryStore for InMemoryRecentStore {
    async fn put(
        &self,
        key: &str,
        item: MemoryItem,
        ttl: Option<Duration>,
    ) -> Result<(), DomainError> {
        let expires_at = Instant::now() + ttl.unwrap_or(self.default_ttl);
        let _gate = self
            .write_gate
            .lock()
            .map_err(|_| DomainError::Repository("recent store write gate poisoned".into()))?;

        if !self.entries.contains_key(key) && self.entries.len() >= self.capacity {
            // Expired entries go first; only then sacrifice live history.
            if self.purge_expired_now() == 0 {
                if let Some(evicted) = self.evict_oldest() {
                    tracing::debug!("🧹 Recent store full, evicted {}", evicted);
                }
            }
        }

        self.entries
            .insert(key.to_string(), RecentEntry { item, expires_at });
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<MemoryItem>, DomainError> {
        let now = Instant::now();
        let Some(mut entry) = self.entries.get_mut(key) else {
            return Ok(None);
        };
        if !entry.is_live(now) {
            return Ok(None);
        }
        entry.item.touch();
        Ok(Some(entry.item.clone()))
    }

    async fn update(&self, key: &str, item: MemoryItem) -> Result<bool, DomainError> {
        let now = Instant::now();
        match self.entries.get_mut(key) {
            Some(mut entry) if entry.is_live(now) => {
                entry.item = item;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn list_keys(&self, pattern: &str) -> Result<Vec<String>, DomainError> {
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.value().is_live(now) && glob_match(pattern, entry.key()))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<MemoryItem>, DomainError> {
        let now = Instant::now();
        let mut items: Vec<MemoryItem> = self
            .entries
            .iter()
            .filter(|entry| entry.value().is_live(now))
            .map(|entry| entry.value().item.clone())
            .collect();
        items.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        items.truncate(limit);
        Ok(items)
    }

    async fn purge_expired(&self) -> Result<usize, DomainError> {
        let _gate = self
            .write_gate
            .lock()
            .map_err(|_| DomainError::Repository("recent store write gate poisoned".into()))?;
        Ok(self.purge_expired_now())
    }

    async fn count(&self) -> Result<usize, DomainError> {
        let now = Instant::now();
        Ok(self
            .entries
            .iter()
            .filter(|entry| entry.value().is_live(now))
            .count())
    }
}

/// Glob match supporting `*` (any run) and `?` (one char)
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut mark = 0usize;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some(pi);
            mark = ti;
            pi += 1;
        } else if let Some(s) = star {
            pi = s + 1;
            mark += 1;
            ti = mark;
        } else {
            return false;
        }
    }

    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MemoryKind;
    use chrono::Utc;
    use std::sync::Arc;

    fn item_at(offset_secs: i64, content: &str) -> MemoryItem {
        let mut item = MemoryItem::new(MemoryKind::Observation, content);
        item.timestamp = Utc::now() - chrono::Duration::seconds(offset_secs);
        item
    }

    #[tokio::test]
    async fn test_overflow_evicts_smallest_timestamp() {
        let store = InMemoryRecentStore::with_limits(1000, Duration::from_secs(3600));

        // Insertion order deliberately differs from timestamp order.
        let mut oldest_id = String::new();
        for i in 0..1001i64 {
            let offset = if i == 500 { 100_000 } else { 1001 - i };
            let item = item_at(offset, &format!("event {}", i));
            if i == 500 {
                oldest_id = item.id.clone();
            }
            store.put(&item.id.clone(), item, None).await.unwrap();
        }

        assert_eq!(store.count().await.unwrap(), 1000);
        assert!(store.get(&oldest_id).await.unwrap().is_none());
        assert_eq!(store.list_keys("*").await.unwrap().len(), 1000);
    }

    #[tokio::test]
    async fn test_expired_key_is_a_miss() {
        let store = InMemoryRecentStore::with_limits(10, Duration::from_secs(3600));
        let item = item_at(0, "short lived");
        store
            .put("short", item, Some(Duration::from_millis(20)))
            .await
            .unwrap();

        assert!(store.get("short").await.unwrap().is_some());
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(store.get("short").await.unwrap().is_none());
        assert_eq!(store.count().await.unwrap(), 0);
        assert_eq!(store.purge_expired().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_full_store_drops_expired_before_live() {
        let store = InMemoryRecentStore::with_limits(2, Duration::from_secs(3600));
        store
            .put("old-but-live", item_at(1000, "a"), None)
            .await
            .unwrap();
        store
            .put("expiring", item_at(0, "b"), Some(Duration::from_millis(10)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(25)).await;

        store.put("new", item_at(0, "c"), None).await.unwrap();

        assert!(store.get("old-but-live").await.unwrap().is_some());
        assert!(store.get("new").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_get_counts_as_use_and_update_keeps_expiry() {
        let store = InMemoryRecentStore::with_limits(10, Duration::from_secs(3600));
        let item = item_at(0, "read me");
        let id = item.id.clone();
        store.put(&id, item, Some(Duration::from_millis(60))).await.unwrap();

        let read = store.get(&id).await.unwrap().unwrap();
        assert_eq!(read.access_count, 1);

        let mut marked = read.clone();
        marked.promoted_at = Some(Utc::now());
        assert!(store.update(&id, marked).await.unwrap());

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(store.get(&id).await.unwrap().is_none());
        assert!(!store.update(&id, read).await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_writers_respect_capacity() {
        let store = Arc::new(InMemoryRecentStore::with_limits(50, Duration::from_secs(3600)));
        let mut handles = Vec::new();
        for w in 0..4 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..100 {
                    let item = item_at(0, &format!("writer {} item {}", w, i));
                    store.put(&item.id.clone(), item, None).await.unwrap();
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(store.count().await.unwrap(), 50);
    }

    #[tokio::test]
    async fn test_list_recent_is_newest_first() {
        let store = InMemoryRecentStore::with_limits(10, Duration::from_secs(3600));
        for offset in [30, 10, 20] {
            let item = item_at(offset, &format!("t-{}", offset));
            store.put(&item.id.clone(), item, None).await.unwrap();
        }
        let items = store.list_recent(2).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].content, "t-10");
        assert_eq!(items[1].content, "t-20");
    }

    #[test]
    fn test_glob_match() {
        assert!(glob_match("obs:*", "obs:123"));
        assert!(glob_match("obs:?", "obs:1"));
        assert!(!glob_match("obs:?", "obs:12"));
        assert!(glob_match("*:12*", "obs:123"));
        assert!(!glob_match("dec:*", "obs:123"));
        assert!(glob_match("*", ""));
    }
}
