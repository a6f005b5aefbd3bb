// Shakewatch - Shake Decision Engine
//
// Turns the ring buffer's recent window into a yes/no shake decision, and
// debounces the resulting event stream so a burst of positive decisions
// reaches the host as a single event.

use crate::config::{DetectorConfig, WindowBoundary};
use crate::events::ShakeEvent;
use crate::ring::SampleRingBuffer;

/// Window population counted during one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowTally {
    pub total: usize,
    pub over_threshold: usize,
}

impl WindowTally {
    /// `None` while the window holds fewer than two samples.
    pub fn fraction(&self) -> Option<f64> {
        if self.total <= 1 {
            return None;
        }
        Some(self.over_threshold as f64 / self.total as f64)
    }
}

#[derive(Debug, Clone)]
pub struct ShakeDecisionEngine {
    visible_time_range_ms: i64,
    magnitude_threshold_g: f64,
    shake_fraction: f64,
    boundary: WindowBoundary,
}

impl ShakeDecisionEngine {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            visible_time_range_ms: config.visible_time_range_ms,
            magnitude_threshold_g: config.magnitude_threshold_g,
            shake_fraction: config.shake_fraction(),
            boundary: config.window_boundary,
        }
    }

    pub fn tally(&self, ring: &SampleRingBuffer, now_ms: i64) -> WindowTally {
        ring.in_window(now_ms, self.visible_time_range_ms, self.boundary)
            .fold(WindowTally::default(), |mut tally, sample| {
                tally.total += 1;
                if sample.magnitude >= self.magnitude_threshold_g {
                    tally.over_threshold += 1;
                }
                tally
            })
    }

    /// A shake fires when strictly more than the configured share of the
    /// window is at or above the magnitude threshold.
    pub fn evaluate(&self, ring: &SampleRingBuffer, now_ms: i64) -> Option<ShakeEvent> {
        let fraction = self.tally(ring, now_ms).fraction()?;
        (fraction > self.shake_fraction).then_some(ShakeEvent {
            fraction_over_threshold: fraction,
        })
    }
}

// ---------------------------------------------------------------------------
// Output debounce
// ---------------------------------------------------------------------------

/// Trailing-edge debounce: an event is released only once `quiet_ms` has
/// passed without a newer one, and the newest event is the one released.
#[derive(Debug)]
pub struct TrailingDebouncer {
    quiet_ms: u64,
    pending: Option<(ShakeEvent, u64)>,
}

impl TrailingDebouncer {
    pub fn new(quiet_ms: u64) -> Self {
        Self {
            quiet_ms,
            pending: None,
        }
    }

    /// Replace any pending event and restart the quiet period.
    pub fn offer(&mut self, event: ShakeEvent, now_ms: u64) {
        self.pending = Some((event, now_ms.saturating_add(self.quiet_ms)));
    }

    /// When the pending event becomes due, if there is one.
    pub fn deadline(&self) -> Option<u64> {
        self.pending.map(|(_, due)| due)
    }

    pub fn poll(&mut self, now_ms: u64) -> Option<ShakeEvent> {
        match self.pending {
            Some((event, due)) if now_ms >= due => {
                self.pending = None;
                Some(event)
            }
            _ => None,
        }
    }

    /// Discard whatever is pending.
    pub fn clear(&mut self) {
        self.pending = None;
    }
}
