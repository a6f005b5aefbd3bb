// Shakewatch - Host Sinks
//
// Shake notifications leave the library through sinks. A host either pulls
// them from a `ShakeSubscription` (an iterator over a channel) or registers
// its own `ShakeSink`. A sink that errors or panics is logged and skipped;
// it never takes the pipeline down with it.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;

use crate::events::ShakeNotification;

pub trait ShakeSink: Send + Sync {
    fn deliver(&self, notification: &ShakeNotification) -> anyhow::Result<()>;
}

impl<F> ShakeSink for F
where
    F: Fn(&ShakeNotification) -> anyhow::Result<()> + Send + Sync,
{
    fn deliver(&self, notification: &ShakeNotification) -> anyhow::Result<()> {
        self(notification)
    }
}

/// Returned by a sink that can never accept another notification. The
/// registry removes such sinks instead of reporting an error.
#[derive(Debug, Error)]
#[error("sink closed")]
pub struct SinkClosed;

// ---------------------------------------------------------------------------
// Channel-backed subscriptions
// ---------------------------------------------------------------------------

/// Lazy, unbounded sequence of notifications. Iteration blocks until the
/// next shake; it ends once the owning `EventSource` is dropped.
pub struct ShakeSubscription {
    rx: Receiver<ShakeNotification>,
}

impl ShakeSubscription {
    pub fn try_next(&self) -> Option<ShakeNotification> {
        match self.rx.try_recv() {
            Ok(notification) => Some(notification),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    pub fn next_timeout(&self, timeout: Duration) -> Option<ShakeNotification> {
        match self.rx.recv_timeout(timeout) {
            Ok(notification) => Some(notification),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

impl Iterator for ShakeSubscription {
    type Item = ShakeNotification;

    fn next(&mut self) -> Option<Self::Item> {
        self.rx.recv().ok()
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

type SinkEntry = (u64, Arc<dyn ShakeSink>);

/// Every sink registered with an `EventSource`. Outlives individual sessions.
#[derive(Clone, Default)]
pub struct SinkRegistry {
    sinks: Arc<Mutex<Vec<SinkEntry>>>,
    next_id: Arc<AtomicU64>,
}

impl SinkRegistry {
    pub fn add(&self, sink: impl ShakeSink + 'static) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.sinks.lock().push((id, Arc::new(sink)));
    }

    pub fn subscribe(&self) -> ShakeSubscription {
        let (tx, rx) = mpsc::channel::<ShakeNotification>();
        self.add(move |notification: &ShakeNotification| -> anyhow::Result<()> {
            tx.send(notification.clone()).map_err(|_| SinkClosed.into())
        });
        ShakeSubscription { rx }
    }

    pub fn len(&self) -> usize {
        self.sinks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.lock().is_empty()
    }

    /// Hand `notification` to every sink. Returns how many accepted it.
    /// Sinks run outside the registry lock, so they may register or
    /// subscribe from inside `deliver`.
    pub fn deliver(&self, notification: &ShakeNotification) -> usize {
        let sinks: Vec<SinkEntry> = self.sinks.lock().clone();

        let mut delivered = 0;
        let mut closed = Vec::new();
        for (id, sink) in &sinks {
            match panic::catch_unwind(AssertUnwindSafe(|| sink.deliver(notification))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) if e.is::<SinkClosed>() => closed.push(*id),
                Ok(Err(e)) => log::error!("Shake sink failed: {:#}", e),
                Err(_) => log::error!("Shake sink panicked"),
            }
        }

        if !closed.is_empty() {
            log::debug!("Removing {} closed shake sink(s)", closed.len());
            self.sinks.lock().retain(|(id, _)| !closed.contains(id));
        }
        delivered
    }
}
