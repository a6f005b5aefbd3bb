// Shakewatch - Drop-Oldest Queue
//
// Bounded hand-off between a producer that must never block (sensor callback,
// classifier loop) and a slower consumer. When the queue is full the oldest
// pending item is evicted to make room.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

/// Log the first drop and every n-th after that.
const DROP_LOG_EVERY: u64 = 100;

pub struct DropOldestSender<T> {
    tx: Sender<T>,
    // Receiver clone used only to evict from the producer side.
    evict: Receiver<T>,
    dropped: Arc<AtomicU64>,
    name: &'static str,
}

impl<T> Clone for DropOldestSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            evict: self.evict.clone(),
            dropped: Arc::clone(&self.dropped),
            name: self.name,
        }
    }
}

/// Create a queue holding at most `capacity` pending items.
///
/// # Panics
/// Panics if `capacity` is zero.
pub fn drop_oldest<T>(capacity: usize, name: &'static str) -> (DropOldestSender<T>, Receiver<T>) {
    assert!(capacity > 0, "queue capacity must be greater than 0");
    let (tx, rx) = bounded(capacity);
    let sender = DropOldestSender {
        tx,
        evict: rx.clone(),
        dropped: Arc::new(AtomicU64::new(0)),
        name,
    };
    (sender, rx)
}

impl<T> DropOldestSender<T> {
    /// Enqueue without blocking. Returns `true` if an older item had to be
    /// evicted to make room.
    pub fn push(&self, item: T) -> bool {
        let mut item = item;
        let mut evicted = false;
        loop {
            match self.tx.try_send(item) {
                Ok(()) => return evicted,
                Err(TrySendError::Full(back)) => {
                    item = back;
                    // The consumer may have drained the slot in the meantime,
                    // in which case there is nothing to evict and we retry.
                    if self.evict.try_recv().is_ok() {
                        evicted = true;
                        let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                        if total == 1 || total % DROP_LOG_EVERY == 0 {
                            log::warn!("{} queue full, dropped oldest item ({} so far)", self.name, total);
                        }
                    }
                }
                // Unreachable while `evict` is alive; treat as a drop.
                Err(TrySendError::Disconnected(_)) => return true,
            }
        }
    }

    /// Items evicted since the queue was created.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Shared handle on the eviction count, readable after the sender is gone.
    pub fn drop_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.dropped)
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }
}
