//! Pending change events.

use crate::models::ChangeEvent;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

/// FIFO of change events waiting to be reconciled.
///
/// The watch transport holds one clone and pushes into it, the backend holds
/// another and hands the accumulated batch out on
/// [`changes()`](crate::StorageBackend::changes).
#[derive(Debug, Clone, Default)]
pub struct ChangeQueue {
    inner: Arc<Mutex<VecDeque<ChangeEvent>>>,
}
impl ChangeQueue {
    pub async fn push(&self, event: ChangeEvent) {
        self.inner.lock().await.push_back(event);
    }

    pub async fn extend(&self, events: impl IntoIterator<Item = ChangeEvent>) {
        self.inner.lock().await.extend(events);
    }

    /// Take every queued event, oldest first.
    pub async fn drain(&self) -> Vec<ChangeEvent> {
        self.inner.lock().await.drain(..).collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_drain_preserves_order_and_empties() {
        let queue = ChangeQueue::default();
        let transport = queue.clone();
        transport.push(ChangeEvent::created("a/info.json")).await;
        transport.extend([ChangeEvent::modified("a/b.mp3"), ChangeEvent::deleted("c")]).await;
        assert_eq!(queue.len().await, 3);
        let batch = queue.drain().await;
        assert_eq!(batch[0], ChangeEvent::created("a/info.json"));
        assert_eq!(batch[2], ChangeEvent::deleted("c"));
        assert!(queue.drain().await.is_empty());
    }
}
