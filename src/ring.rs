// Shakewatch - Sample Ring Buffer
//
// Fixed-capacity circular store of (timestamp, magnitude) pairs. Nothing is
// ever deleted: samples age out of the decision window purely because the
// scan predicate stops matching them.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::WindowBoundary;
use crate::events::Sample;

/// Timestamp stored in slots that have never been written.
pub const EMPTY_TIMESTAMP: i64 = -1;

/// Ring shared between the sample writer and window readers.
pub type SharedRing = Arc<RwLock<SampleRingBuffer>>;

#[derive(Debug, Clone)]
pub struct SampleRingBuffer {
    timestamps: Vec<i64>,
    magnitudes: Vec<f64>,
    /// Slot that the next `write` overwrites.
    write_index: usize,
    /// Slots written at least once. Reaches capacity after one revolution.
    filled: usize,
}

impl SampleRingBuffer {
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be greater than 0");
        Self {
            timestamps: vec![EMPTY_TIMESTAMP; capacity],
            magnitudes: vec![0.0; capacity],
            write_index: 0,
            filled: 0,
        }
    }

    pub fn shared(capacity: usize) -> SharedRing {
        Arc::new(RwLock::new(Self::new(capacity)))
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.timestamps.len()
    }

    /// Number of slots holding a real sample.
    #[inline]
    pub fn len(&self) -> usize {
        self.filled
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.filled == self.capacity()
    }

    #[inline]
    pub fn write_index(&self) -> usize {
        self.write_index
    }

    /// Store a sample at the write index and advance it.
    pub fn write(&mut self, timestamp_ms: i64, magnitude: f64) {
        let n = self.capacity();
        self.timestamps[self.write_index] = timestamp_ms;
        self.magnitudes[self.write_index] = magnitude;
        self.write_index = (self.write_index + 1) % n;
        if self.filled < n {
            self.filled += 1;
        }
    }

    /// Back to the freshly allocated state.
    pub fn reset(&mut self) {
        self.timestamps.fill(EMPTY_TIMESTAMP);
        self.magnitudes.fill(0.0);
        self.write_index = 0;
        self.filled = 0;
    }

    /// Every stored sample whose age relative to `now_ms` is inside
    /// `range_ms`. Scans all slots once; order is slot order.
    pub fn in_window(
        &self,
        now_ms: i64,
        range_ms: i64,
        boundary: WindowBoundary,
    ) -> impl Iterator<Item = Sample> + '_ {
        // Slots are written 0, 1, 2, ... so the first `filled` are the live ones.
        self.timestamps[..self.filled]
            .iter()
            .zip(&self.magnitudes[..self.filled])
            .filter(move |(&t, _)| boundary.contains(now_ms.saturating_sub(t), range_ms))
            .map(|(&timestamp_ms, &magnitude)| Sample {
                timestamp_ms,
                magnitude,
            })
    }

    pub fn snapshot_window(
        &self,
        now_ms: i64,
        range_ms: i64,
        boundary: WindowBoundary,
    ) -> Vec<Sample> {
        self.in_window(now_ms, range_ms, boundary).collect()
    }
}
