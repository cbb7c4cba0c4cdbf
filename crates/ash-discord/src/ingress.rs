use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{Mutex, Notify};
use tracing::warn;

/// A bounded FIFO queue with drop-oldest-on-overflow semantics (spec §5
/// "Backpressure"): `push` never blocks the caller, and when the queue is
/// full it drops the oldest *unprocessed* entry to make room rather than
/// rejecting the newest one. An item already popped for processing can
/// never be dropped this way, matching the spec's "cannot drop a message
/// already in classification" guarantee.
pub struct IngressQueue<T> {
    entries: Mutex<VecDeque<T>>,
    notify: Notify,
    capacity: usize,
}

impl<T: Send> IngressQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            notify: Notify::new(),
            capacity,
        }
    }

    /// Enqueue `item`, dropping the oldest entry if the queue is already at
    /// capacity. Returns `true` iff an item was dropped to make room.
    pub async fn push(&self, item: T) -> bool {
        let mut guard = self.entries.lock().await;
        let dropped = if guard.len() >= self.capacity {
            guard.pop_front();
            true
        } else {
            false
        };
        guard.push_back(item);
        drop(guard);
        self.notify.notify_one();
        if dropped {
            warn!(capacity = self.capacity, "per-user ingress queue overflowed, dropped oldest message");
        }
        dropped
    }

    /// Wait for and remove the oldest item.
    pub async fn pop(&self) -> T {
        loop {
            {
                let mut guard = self.entries.lock().await;
                if let Some(item) = guard.pop_front() {
                    return item;
                }
            }
            self.notify.notified().await;
        }
    }
}

/// Per-user queue registry: lazily creates a bounded [`IngressQueue`] and
/// spawns its worker the first time a user is seen, then reuses both for
/// every later message from that user (spec §5: "serialised per user,
/// parallel across users").
pub struct UserIngress<T> {
    queues: dashmap::DashMap<ash_core::UserId, Arc<IngressQueue<T>>>,
    capacity: usize,
}

impl<T: Send + 'static> UserIngress<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            queues: dashmap::DashMap::new(),
            capacity,
        }
    }

    /// Enqueue `item` for `user_id`, spawning a worker for this user via
    /// `spawn_worker` the first time they're seen.
    pub async fn push(
        &self,
        user_id: ash_core::UserId,
        item: T,
        spawn_worker: impl FnOnce(Arc<IngressQueue<T>>),
    ) {
        let queue = match self.queues.entry(user_id) {
            dashmap::mapref::entry::Entry::Occupied(e) => e.get().clone(),
            dashmap::mapref::entry::Entry::Vacant(e) => {
                let queue = Arc::new(IngressQueue::new(self.capacity));
                e.insert(queue.clone());
                spawn_worker(queue.clone());
                queue
            }
        };
        queue.push(item).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn push_beyond_capacity_drops_oldest() {
        let q: IngressQueue<u32> = IngressQueue::new(2);
        assert!(!q.push(1).await);
        assert!(!q.push(2).await);
        assert!(q.push(3).await);
        assert_eq!(q.pop().await, 2);
        assert_eq!(q.pop().await, 3);
    }

    #[tokio::test]
    async fn pop_returns_fifo_order() {
        let q: IngressQueue<u32> = IngressQueue::new(16);
        q.push(1).await;
        q.push(2).await;
        assert_eq!(q.pop().await, 1);
        assert_eq!(q.pop().await, 2);
    }
}
