//! Shared work queue: primary worklist plus a bounded retry queue.

use std::collections::VecDeque;

use tokio::sync::Mutex;

use crate::models::Document;

/// A document handed to a worker.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub document: Document,
    /// Whole-document attempts that ended without a usable result.
    pub failures: u32,
}

impl WorkItem {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            failures: 0,
        }
    }
}

#[derive(Debug, Default)]
struct QueueState {
    primary: VecDeque<WorkItem>,
    retry: VecDeque<WorkItem>,
    in_flight: usize,
}

/// Mutually exclusive work distribution; no two workers get the same item.
#[derive(Debug)]
pub struct WorkQueue {
    state: Mutex<QueueState>,
    retry_capacity: usize,
}

impl WorkQueue {
    pub fn new(documents: Vec<Document>, retry_capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                primary: documents.into_iter().map(WorkItem::new).collect(),
                ..Default::default()
            }),
            retry_capacity,
        }
    }

    /// Claim the next primary item.
    pub async fn next_primary(&self) -> Option<WorkItem> {
        let mut state = self.state.lock().await;
        let item = state.primary.pop_front()?;
        state.in_flight += 1;
        Some(item)
    }

    /// Claim every item currently waiting for retry.
    pub async fn drain_retries(&self) -> Vec<WorkItem> {
        let mut state = self.state.lock().await;
        let items: Vec<WorkItem> = state.retry.drain(..).collect();
        state.in_flight += items.len();
        items
    }

    /// Finish a claimed item.
    pub async fn complete(&self) {
        let mut state = self.state.lock().await;
        state.in_flight = state.in_flight.saturating_sub(1);
    }

    /// Finish a claimed item by queueing it for retry.
    ///
    /// Returns the item back when the retry queue is full.
    pub async fn complete_with_retry(&self, item: WorkItem) -> Result<(), WorkItem> {
        let mut state = self.state.lock().await;
        state.in_flight = state.in_flight.saturating_sub(1);
        if state.retry.len() >= self.retry_capacity {
            return Err(item);
        }
        state.retry.push_back(item);
        Ok(())
    }

    /// Put a claimed item back at the head of the primary queue.
    pub async fn release(&self, item: WorkItem) {
        let mut state = self.state.lock().await;
        state.in_flight = state.in_flight.saturating_sub(1);
        state.primary.push_front(item);
    }

    pub async fn has_primary(&self) -> bool {
        !self.state.lock().await.primary.is_empty()
    }

    pub async fn has_retries(&self) -> bool {
        !self.state.lock().await.retry.is_empty()
    }

    /// Nothing queued and nothing being worked on.
    pub async fn is_exhausted(&self) -> bool {
        let state = self.state.lock().await;
        state.primary.is_empty() && state.retry.is_empty() && state.in_flight == 0
    }

    /// Items not yet finished (queued or in flight).
    pub async fn remaining(&self) -> usize {
        let state = self.state.lock().await;
        state.primary.len() + state.retry.len() + state.in_flight
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs(n: usize) -> Vec<Document> {
        (0..n)
            .map(|i| Document::new("c", "g", format!("m{}", i), format!("https://e.com/{}", i)))
            .collect()
    }

    #[tokio::test]
    async fn test_items_are_claimed_once() {
        let queue = WorkQueue::new(docs(3), 10);
        let a = queue.next_primary().await.unwrap();
        let b = queue.next_primary().await.unwrap();
        assert_ne!(a.document.id, b.document.id);
        assert_eq!(queue.remaining().await, 3);
        assert!(!queue.is_exhausted().await);
    }

    #[tokio::test]
    async fn test_retry_capacity() {
        let queue = WorkQueue::new(docs(2), 1);
        let a = queue.next_primary().await.unwrap();
        let b = queue.next_primary().await.unwrap();

        assert!(queue.complete_with_retry(a).await.is_ok());
        assert!(queue.complete_with_retry(b).await.is_err());
        assert!(queue.has_retries().await);

        let drained = queue.drain_retries().await;
        assert_eq!(drained.len(), 1);
        assert!(!queue.has_retries().await);
        queue.complete().await;
        assert!(queue.is_exhausted().await);
    }

    #[tokio::test]
    async fn test_release_returns_item_to_front() {
        let queue = WorkQueue::new(docs(2), 1);
        let first = queue.next_primary().await.unwrap();
        let id = first.document.id.clone();
        queue.release(first).await;
        assert_eq!(queue.next_primary().await.unwrap().document.id, id);
    }
}
