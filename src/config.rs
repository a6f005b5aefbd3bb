// Shakewatch - Detector Configuration
//
// Named defaults plus the per-session `DetectorConfig`. A config is fixed for
// the lifetime of a session; changing it means stopping and starting again.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ShakeError};
use crate::events::SensorAccuracy;

// ---------------------------------------------------------------------------
// Shake detection defaults
// ---------------------------------------------------------------------------
pub const DEFAULT_MAX_SAMPLES: usize = 25;
pub const DEFAULT_MIN_TIME_BETWEEN_SAMPLES_MS: i64 = 20;
pub const DEFAULT_VISIBLE_TIME_RANGE_MS: i64 = 500;
pub const DEFAULT_MAGNITUDE_THRESHOLD_G: f64 = 25.0;
pub const DEFAULT_PERCENT_OVER_THRESHOLD_FOR_SHAKE: u32 = 66;
pub const DEFAULT_EVENT_COOLDOWN_MS: u64 = 1000; // max one event per second

// ---------------------------------------------------------------------------
// Audio classification defaults
// ---------------------------------------------------------------------------
pub const DEFAULT_CLASSIFICATION_INTERVAL_MS: u64 = 30;
pub const DEFAULT_AGGREGATION_WINDOW_MS: u64 = 4000;
pub const DEFAULT_CLASSIFICATION_QUEUE_CAPACITY: usize = 256;
pub const DEFAULT_MIN_CLASSIFICATION_SCORE: f32 = 0.3;

// ---------------------------------------------------------------------------
// Worker timing
// ---------------------------------------------------------------------------
/// Longest time the sensor worker blocks on an empty feed before it re-checks
/// for shutdown.
pub const SENSOR_IDLE_POLL_MS: u64 = 50;

/// Stack size for every worker thread a session spawns (bytes).
pub const WORKER_STACK_SIZE: usize = 256 * 1024;

// ---------------------------------------------------------------------------
// Window boundary
// ---------------------------------------------------------------------------

/// How a sample sitting exactly `visibleTimeRangeMs` in the past is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowBoundary {
    /// `now - t <= range` counts as recent.
    #[default]
    Inclusive,
    /// `now - t < range` counts as recent.
    Exclusive,
}

impl WindowBoundary {
    #[inline]
    pub fn contains(self, age_ms: i64, range_ms: i64) -> bool {
        match self {
            Self::Inclusive => age_ms <= range_ms,
            Self::Exclusive => age_ms < range_ms,
        }
    }
}

// ---------------------------------------------------------------------------
// Session configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DetectorConfig {
    /// Ring buffer capacity.
    pub max_samples: usize,
    pub min_time_between_samples_ms: i64,
    pub visible_time_range_ms: i64,
    #[serde(alias = "magnitudeThreshold")]
    pub magnitude_threshold_g: f64,
    /// 0-100. A shake fires when strictly more than this share of the window
    /// is over the magnitude threshold.
    pub percent_over_threshold_for_shake: u32,
    pub use_audio_classifier: bool,

    pub window_boundary: WindowBoundary,
    pub event_cooldown_ms: u64,
    pub min_accuracy: SensorAccuracy,

    pub classification_interval_ms: u64,
    pub aggregation_window_ms: u64,
    pub classification_queue_capacity: usize,
    pub min_classification_score: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            max_samples: DEFAULT_MAX_SAMPLES,
            min_time_between_samples_ms: DEFAULT_MIN_TIME_BETWEEN_SAMPLES_MS,
            visible_time_range_ms: DEFAULT_VISIBLE_TIME_RANGE_MS,
            magnitude_threshold_g: DEFAULT_MAGNITUDE_THRESHOLD_G,
            percent_over_threshold_for_shake: DEFAULT_PERCENT_OVER_THRESHOLD_FOR_SHAKE,
            use_audio_classifier: true,
            window_boundary: WindowBoundary::default(),
            event_cooldown_ms: DEFAULT_EVENT_COOLDOWN_MS,
            min_accuracy: SensorAccuracy::Medium,
            classification_interval_ms: DEFAULT_CLASSIFICATION_INTERVAL_MS,
            aggregation_window_ms: DEFAULT_AGGREGATION_WINDOW_MS,
            classification_queue_capacity: DEFAULT_CLASSIFICATION_QUEUE_CAPACITY,
            min_classification_score: DEFAULT_MIN_CLASSIFICATION_SCORE,
        }
    }
}

impl DetectorConfig {
    /// Parse a host-supplied JSON object. Missing fields take their defaults;
    /// the result is validated before it is returned.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_samples == 0 {
            return Err(invalid("maxSamples must be greater than 0"));
        }
        if self.min_time_between_samples_ms < 0 {
            return Err(invalid("minTimeBetweenSamplesMs must not be negative"));
        }
        if self.visible_time_range_ms < 0 {
            return Err(invalid("visibleTimeRangeMs must not be negative"));
        }
        if !self.magnitude_threshold_g.is_finite() || self.magnitude_threshold_g < 0.0 {
            return Err(invalid(format!(
                "magnitudeThreshold must be a non-negative number, got {}",
                self.magnitude_threshold_g
            )));
        }
        if self.percent_over_threshold_for_shake > 100 {
            return Err(invalid(format!(
                "percentOverThresholdForShake must be within 0..=100, got {}",
                self.percent_over_threshold_for_shake
            )));
        }
        if self.event_cooldown_ms == 0 {
            return Err(invalid("eventCooldownMs must be greater than 0"));
        }

        if self.use_audio_classifier {
            if self.classification_interval_ms == 0 {
                return Err(invalid("classificationIntervalMs must be greater than 0"));
            }
            if self.aggregation_window_ms == 0 {
                return Err(invalid("aggregationWindowMs must be greater than 0"));
            }
            if self.classification_queue_capacity == 0 {
                return Err(invalid("classificationQueueCapacity must be greater than 0"));
            }
            if !(0.0..=1.0).contains(&self.min_classification_score) {
                return Err(invalid(format!(
                    "minClassificationScore must be within 0.0..=1.0, got {}",
                    self.min_classification_score
                )));
            }
        }

        Ok(())
    }

    /// Decision ratio as a fraction in [0, 1].
    #[inline]
    pub fn shake_fraction(&self) -> f64 {
        f64::from(self.percent_over_threshold_for_shake) / 100.0
    }
}

fn invalid(msg: impl Into<String>) -> ShakeError {
    ShakeError::InvalidConfig(msg.into())
}
