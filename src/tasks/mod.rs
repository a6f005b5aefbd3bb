// Shakewatch - Session Tasks
//
// Each running session is a handful of worker threads:
//   sensor     - shapes the raw feed, fills the ring, decides, debounces
//   dispatch   - merges the latest classification and hands events to sinks
//   classifier - periodic inference plus periodic aggregation (optional)

pub mod classifier;
pub mod dispatch;
pub mod sensor;
