// Shakewatch - Session Statistics

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

/// Live counters, bumped by the session's worker threads.
#[derive(Debug, Default)]
pub struct SessionCounters {
    pub samples_admitted: AtomicU64,
    pub samples_rejected: AtomicU64,
    pub shakes_detected: AtomicU64,
    pub events_emitted: AtomicU64,
    pub sensor_dropped: Arc<AtomicU64>,
    pub classifications_dropped: Arc<AtomicU64>,
}

impl SessionCounters {
    #[inline]
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SessionStats {
        SessionStats {
            samples_admitted: self.samples_admitted.load(Ordering::Relaxed),
            samples_rejected: self.samples_rejected.load(Ordering::Relaxed),
            shakes_detected: self.shakes_detected.load(Ordering::Relaxed),
            events_emitted: self.events_emitted.load(Ordering::Relaxed),
            sensor_dropped: self.sensor_dropped.load(Ordering::Relaxed),
            classifications_dropped: self.classifications_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of a session's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    /// Samples written to the ring buffer.
    pub samples_admitted: u64,
    /// Raw events dropped for accuracy, repetition, or spacing.
    pub samples_rejected: u64,
    /// Window evaluations that crossed the shake threshold.
    pub shakes_detected: u64,
    /// Debounced events handed to the host.
    pub events_emitted: u64,
    pub sensor_dropped: u64,
    pub classifications_dropped: u64,
}
