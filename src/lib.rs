// Shakewatch - Shake Detection Library
//
// Turns a noisy accelerometer stream into discrete, debounced shake events,
// optionally tagged with what the microphone heard around the same time.
//
// Sample path (sensor task):
//   raw reading -> SensorGate -> SampleFilter -> SampleRingBuffer
//               -> ShakeDecisionEngine -> TrailingDebouncer -> sinks
//
// Audio path (optional, classifier tasks):
//   AudioClassifier -> drop-oldest queue -> ClassificationAggregator
//
// Hosts drive everything through `EventSource`.

pub mod aggregate;
pub mod cli;
pub mod config;
pub mod decision;
pub mod drivers;
pub mod error;
pub mod events;
pub mod filter;
pub mod queue;
pub mod ring;
pub mod sink;
pub mod source;
pub mod stats;
pub mod tasks;
pub mod timer;

pub use config::{DetectorConfig, WindowBoundary};
pub use drivers::audio::{AudioClassifier, ScriptedClassifier};
pub use drivers::imu::{synthetic_shake_trace, ScriptedAccelerometer, SensorFeed, SensorSource};
pub use error::{Result, ShakeError};
pub use events::{
    Category, ClassificationSnapshot, RawSensorEvent, Sample, SensorAccuracy, ShakeEvent,
    ShakeNotification,
};
pub use sink::{ShakeSink, ShakeSubscription};
pub use source::EventSource;
pub use stats::SessionStats;
