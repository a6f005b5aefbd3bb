// Shakewatch - Events & Data Types

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Raw sensor data (as delivered by the platform accelerometer)
// ---------------------------------------------------------------------------

/// Platform-reported confidence in a sensor reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorAccuracy {
    Unreliable,
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawSensorEvent {
    /// Device-monotonic timestamp in nanoseconds.
    pub timestamp_ns: i64,
    /// Acceleration per axis. At least `[x, y, z]`.
    pub values: Vec<f32>,
    pub accuracy: SensorAccuracy,
}

impl RawSensorEvent {
    pub fn new(timestamp_ns: i64, x: f32, y: f32, z: f32) -> Self {
        Self {
            timestamp_ns,
            values: vec![x, y, z],
            accuracy: SensorAccuracy::High,
        }
    }

    pub fn with_accuracy(mut self, accuracy: SensorAccuracy) -> Self {
        self.accuracy = accuracy;
        self
    }
}

// ---------------------------------------------------------------------------
// Admitted samples
// ---------------------------------------------------------------------------

/// One admitted accelerometer reading, reduced to its magnitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub timestamp_ms: i64,
    pub magnitude: f64,
}

// ---------------------------------------------------------------------------
// Shake events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShakeEvent {
    /// Share of the recent window at or above the magnitude threshold, in [0, 1].
    pub fraction_over_threshold: f64,
}

// ---------------------------------------------------------------------------
// Audio classification
// ---------------------------------------------------------------------------

/// A single classifier output: one label and its confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    pub label: String,
    pub score: f32,
}

impl Category {
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// Best confidence per label over an aggregation window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassificationSnapshot(BTreeMap<String, f32>);

impl ClassificationSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `score` for `label`, keeping whichever is higher.
    pub fn keep_max(&mut self, label: &str, score: f32) {
        match self.0.get_mut(label) {
            Some(best) => {
                if score > *best {
                    *best = score;
                }
            }
            None => {
                self.0.insert(label.to_owned(), score);
            }
        }
    }

    pub fn get(&self, label: &str) -> Option<f32> {
        self.0.get(label).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.0.iter().map(|(label, score)| (label.as_str(), *score))
    }
}

impl<S: Into<String>> FromIterator<(S, f32)> for ClassificationSnapshot {
    fn from_iter<I: IntoIterator<Item = (S, f32)>>(iter: I) -> Self {
        let mut snapshot = Self::new();
        for (label, score) in iter {
            let label = label.into();
            snapshot.keep_max(&label, score);
        }
        snapshot
    }
}

// ---------------------------------------------------------------------------
// Host notifications
// ---------------------------------------------------------------------------

/// What the host receives per detected shake.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShakeNotification {
    pub fraction_over_threshold: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classifications: Option<ClassificationSnapshot>,
}

impl ShakeNotification {
    pub fn new(event: ShakeEvent, classifications: Option<ClassificationSnapshot>) -> Self {
        Self {
            fraction_over_threshold: event.fraction_over_threshold,
            classifications,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
