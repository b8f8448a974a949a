//! Human Directive Queue - FIFO inbox drained by the control loop

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{mpsc, Mutex};

use crate::domain::{Directive, DomainError};

/// Thread-safe directive inbox; submitters never wait on the loop
pub struct HumanDirectiveQueue {
    sender: mpsc::UnboundedSender<Directive>,
    receiver: Mutex<mpsc::UnboundedReceiver<Directive>>,
    depth: AtomicUsize,
}

impl HumanDirectiveQueue {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Mutex::new(receiver),
            depth: AtomicUsize::new(0),
        }
    }

    /// Enqueue a directive, returning its id
    pub fn submit(&self, text: &str) -> Result<String, DomainError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(DomainError::Validation("directive text must not be empty".into()));
        }

        let directive = Directive::new(text);
        let id = directive.id.clone();
        self.depth.fetch_add(1, Ordering::SeqCst);
        self.sender.send(directive).map_err(|_| {
            self.depth.fetch_sub(1, Ordering::SeqCst);
            DomainError::Conflict("directive queue is closed".into())
        })?;

        tracing::info!("📨 Directive {} queued: {}", id, text);
        Ok(id)
    }

    /// Take the oldest directive, if any, without waiting
    pub async fn try_next(&self) -> Option<Directive> {
        let directive = self.receiver.lock().await.try_recv().ok()?;
        self.depth.fetch_sub(1, Ordering::SeqCst);
        Some(directive)
    }

    pub fn len(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for HumanDirectiveQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = HumanDirectiveQueue::new();
        let first = queue.submit("check disks").unwrap();
        queue.submit("check network").unwrap();
        assert_eq!(queue.len(), 2);

        let next = queue.try_next().await.unwrap();
        assert_eq!(next.id, first);
        assert_eq!(next.text, "check disks");
        assert_eq!(queue.try_next().await.unwrap().text, "check network");
        assert!(queue.try_next().await.is_none());
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_blank_directive_rejected() {
        let queue = HumanDirectiveQueue::new();
        assert!(matches!(
            queue.submit("   "),
            Err(DomainError::Validation(_))
        ));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_submitters() {
        let queue = Arc::new(HumanDirectiveQueue::new());
        let mut handles = Vec::new();
        for i in 0..8 {
            let queue = queue.clone();
            handles.push(tokio::spawn(async move {
                queue.submit(&format!("directive {}", i)).unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let mut drained = 0;
        while queue.try_next().await.is_some() {
            drained += 1;
        }
        assert_eq!(drained, 8);
    }
}
