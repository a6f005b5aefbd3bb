// Shakewatch - Sample Filter
//
// Shapes the raw accelerometer stream before it reaches the ring buffer:
//   1. `SensorGate` drops low-accuracy readings and exact repeats.
//   2. `SampleFilter` rate-limits what is left and reduces each admitted
//      reading to its magnitude.

use crate::events::{RawSensorEvent, Sample, SensorAccuracy};

const NANOS_PER_MS: i64 = 1_000_000;

/// Euclidean norm of the first three axis values.
///
/// # Panics
/// Panics if fewer than three values are given.
pub fn magnitude(values: &[f32]) -> f64 {
    assert!(
        values.len() >= 3,
        "accelerometer event needs 3 axis values, got {}",
        values.len()
    );
    let (x, y, z) = (
        f64::from(values[0]),
        f64::from(values[1]),
        f64::from(values[2]),
    );
    (x * x + y * y + z * z).sqrt()
}

// ---------------------------------------------------------------------------
// Accuracy / duplicate gate
// ---------------------------------------------------------------------------

pub struct SensorGate {
    min_accuracy: SensorAccuracy,
    last_values: Option<Vec<f32>>,
}

impl SensorGate {
    pub fn new(min_accuracy: SensorAccuracy) -> Self {
        Self {
            min_accuracy,
            last_values: None,
        }
    }

    /// `true` if the event should continue down the pipeline.
    pub fn pass(&mut self, event: &RawSensorEvent) -> bool {
        if event.accuracy < self.min_accuracy {
            return false;
        }
        if self.last_values.as_deref() == Some(event.values.as_slice()) {
            return false;
        }
        self.last_values = Some(event.values.clone());
        true
    }
}

// ---------------------------------------------------------------------------
// Rate limiter
// ---------------------------------------------------------------------------

pub struct SampleFilter {
    min_time_between_samples_ms: i64,
    last_admitted_ms: Option<i64>,
}

impl SampleFilter {
    pub fn new(min_time_between_samples_ms: i64) -> Self {
        Self {
            min_time_between_samples_ms,
            last_admitted_ms: None,
        }
    }

    /// Timestamp of the last admitted sample, if any.
    pub fn last_admitted_ms(&self) -> Option<i64> {
        self.last_admitted_ms
    }

    /// Admit or silently drop `event`. The first event of a session is always
    /// admitted; after that, events closer than the minimum spacing to the
    /// last admitted one are dropped.
    ///
    /// # Panics
    /// Panics if the event carries fewer than three axis values.
    pub fn admit(&mut self, event: &RawSensorEvent) -> Option<Sample> {
        let timestamp_ms = event.timestamp_ns / NANOS_PER_MS;

        if let Some(last) = self.last_admitted_ms {
            if timestamp_ms.saturating_sub(last) < self.min_time_between_samples_ms {
                return None;
            }
        }

        let magnitude = magnitude(&event.values);
        self.last_admitted_ms = Some(timestamp_ms);
        Some(Sample {
            timestamp_ms,
            magnitude,
        })
    }

    pub fn reset(&mut self) {
        self.last_admitted_ms = None;
    }
}
