//! Index Writer - background fan-out into the semantic index
//!
//! Jobs travel through a bounded channel to a single worker task. A full
//! queue drops the job with a warning instead of blocking the writer, and
//! `shutdown` closes the channel and waits for the backlog to drain.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::application::ResilientCaller;
use crate::domain::{Collection, MemoryItem};
use crate::ports::SemanticIndex;

struct IndexJob {
    item: MemoryItem,
    collection: Collection,
}

/// Handle to the background index worker
pub struct IndexWriter {
    sender: Mutex<Option<mpsc::Sender<IndexJob>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    pending: Arc<AtomicUsize>,
    dropped: AtomicUsize,
    cancel: CancellationToken,
}

impl IndexWriter {
    /// Spawn the worker. Must be called from within a tokio runtime.
    pub fn spawn(index: Arc<dyn SemanticIndex>, caller: ResilientCaller, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let pending = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();

        let worker = tokio::spawn(run_worker(
            receiver,
            index,
            caller,
            pending.clone(),
            cancel.clone(),
        ));

        Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
            pending,
            dropped: AtomicUsize::new(0),
            cancel,
        }
    }

    /// Queue an item for indexing. Never blocks; returns false if dropped.
    pub fn dispatch(&self, item: MemoryItem, collection: Collection) -> bool {
        let sender = match self.sender.lock() {
            Ok(guard) => guard.clone(),
            Err(_) => None,
        };
        let Some(sender) = sender else {
            tracing::warn!("⚠️  Index writer closed, skipping {}", item.id);
            return false;
        };

        let id = item.id.clone();
        self.pending.fetch_add(1, Ordering::SeqCst);
        match sender.try_send(IndexJob { item, collection }) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.pending.fetch_sub(1, Ordering::SeqCst);
                self.dropped.fetch_add(1, Ordering::SeqCst);
                tracing::warn!("⚠️  Index queue full, dropped {} ({})", id, collection);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.pending.fetch_sub(1, Ordering::SeqCst);
                tracing::warn!("⚠️  Index writer closed, skipping {}", id);
                false
            }
        }
    }

    /// Jobs queued or in flight
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Jobs dropped because the queue was full
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::SeqCst)
    }

    /// Wait until every queued job has been processed
    pub async fn wait_idle(&self) {
        while self.pending() > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Close the queue and wait up to `grace` for the backlog to drain.
    /// Anything still running after that is cancelled.
    pub async fn shutdown(&self, grace: Duration) {
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }
        let worker = match self.worker.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        let Some(mut worker) = worker else {
            return;
        };

        tokio::select! {
            _ = &mut worker => {
                tracing::info!("🗂️  Index writer drained");
            }
            _ = tokio::time::sleep(grace) => {
                tracing::warn!(
                    "⚠️  Index writer still busy after {:?}, abandoning {} job(s)",
                    grace,
                    self.pending()
                );
                self.cancel.cancel();
                worker.abort();
            }
        }
    }
}

async fn run_worker(
    mut receiver: mpsc::Receiver<IndexJob>,
    index: Arc<dyn SemanticIndex>,
    caller: ResilientCaller,
    pending: Arc<AtomicUsize>,
    cancel: CancellationToken,
) {
    while let Some(job) = receiver.recv().await {
        let result = caller
            .call("semantic_index.index", &cancel, || {
                let index = index.clone();
                let item = job.item.clone();
                let collection = job.collection;
                async move { index.index(&item, collection).await }
            })
            .await;

        if let Err(e) = result {
            tracing::warn!(
                "⚠️  Failed to index {} into {}: {}",
                job.item.id,
                job.collection,
                e
            );
        }
        pending.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemorySemanticIndex;
    use crate::application::RetryPolicy;
    use crate::domain::{DomainError, MemoryKind};
    use crate::ports::{MemorySearchFilter, ScoredMemory};
    use crate::testing::StubEmbedding;
    use async_trait::async_trait;

    fn quick_caller() -> ResilientCaller {
        ResilientCaller::new(RetryPolicy {
            max_attempts: 2,
            base_delay_ms: 1,
            max_delay_ms: 2,
            total_budget_ms: 500,
        })
    }

    struct BrokenIndex;

    #[async_trait]
    impl SemanticIndex for BrokenIndex {
        async fn index(&self, _: &MemoryItem, _: Collection) -> Result<(), DomainError> {
            Err(DomainError::Transient("vector engine unavailable".into()))
        }
        async fn search(
            &self,
            _: &str,
            _: Collection,
            _: usize,
            _: f32,
            _: &MemorySearchFilter,
        ) -> Result<Vec<ScoredMemory>, DomainError> {
            Ok(Vec::new())
        }
        async fn get_all_recent(
            &self,
            _: Collection,
            _: usize,
        ) -> Result<Vec<MemoryItem>, DomainError> {
            Ok(Vec::new())
        }
        async fn delete(&self, _: &str, _: Collection) -> Result<bool, DomainError> {
            Ok(false)
        }
        async fn count(&self) -> Result<u64, DomainError> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_dispatched_items_become_searchable() {
        let index = Arc::new(InMemorySemanticIndex::new(Arc::new(StubEmbedding::new(3))));
        let writer = IndexWriter::spawn(index.clone(), quick_caller(), 16);

        for i in 0..5 {
            let item = MemoryItem::new(MemoryKind::Observation, format!("event {}", i));
            assert!(writer.dispatch(item, Collection::ShortTerm));
        }
        writer.wait_idle().await;

        assert_eq!(index.count().await.unwrap(), 5);
        writer.shutdown(Duration::from_secs(1)).await;
        assert!(!writer.dispatch(
            MemoryItem::new(MemoryKind::Observation, "late"),
            Collection::ShortTerm
        ));
    }

    #[tokio::test]
    async fn test_index_failures_are_absorbed() {
        let writer = IndexWriter::spawn(Arc::new(BrokenIndex), quick_caller(), 4);
        writer.dispatch(
            MemoryItem::new(MemoryKind::Observation, "doomed"),
            Collection::ShortTerm,
        );
        writer.wait_idle().await;
        assert_eq!(writer.pending(), 0);
        writer.shutdown(Duration::from_secs(1)).await;
    }
}
