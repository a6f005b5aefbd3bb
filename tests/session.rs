use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use shakewatch::{
    synthetic_shake_trace, AudioClassifier, Category, DetectorConfig, EventSource,
    RawSensorEvent, ScriptedAccelerometer, ScriptedClassifier, SensorFeed, SensorSource,
    SessionStats, ShakeError, ShakeNotification,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Detection-only config tuned for the synthetic traces below.
fn sensor_only() -> DetectorConfig {
    DetectorConfig {
        max_samples: 64,
        use_audio_classifier: false,
        event_cooldown_ms: 500,
        ..Default::default()
    }
}

fn shaking_sensor(amplitude: f32) -> ScriptedAccelerometer {
    ScriptedAccelerometer::new(synthetic_shake_trace(300, 600, 10, amplitude))
        .paced(Duration::from_millis(2))
}

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct SensorTracker {
    subscribes: Arc<AtomicUsize>,
    unsubscribes: Arc<AtomicUsize>,
    active: Arc<AtomicBool>,
}

/// Accepts subscriptions and never delivers anything.
struct SilentSensor {
    tracker: SensorTracker,
    feed: Option<SensorFeed>,
}

impl SilentSensor {
    fn new() -> (Self, SensorTracker) {
        let tracker = SensorTracker::default();
        (
            Self {
                tracker: tracker.clone(),
                feed: None,
            },
            tracker,
        )
    }
}

impl SensorSource for SilentSensor {
    fn subscribe(&mut self, feed: SensorFeed) -> shakewatch::Result<()> {
        self.tracker.subscribes.fetch_add(1, Ordering::SeqCst);
        self.tracker.active.store(true, Ordering::SeqCst);
        self.feed = Some(feed);
        Ok(())
    }

    fn unsubscribe(&mut self) -> shakewatch::Result<()> {
        self.tracker.unsubscribes.fetch_add(1, Ordering::SeqCst);
        self.tracker.active.store(false, Ordering::SeqCst);
        self.feed = None;
        Ok(())
    }
}

/// Pushes its whole trace into the feed from inside `subscribe`, far faster
/// than any consumer drains it.
struct BurstSensor {
    trace: Vec<RawSensorEvent>,
    feed: Option<SensorFeed>,
}

impl SensorSource for BurstSensor {
    fn subscribe(&mut self, feed: SensorFeed) -> shakewatch::Result<()> {
        for event in &self.trace {
            feed.push(event.clone());
        }
        self.feed = Some(feed);
        Ok(())
    }

    fn unsubscribe(&mut self) -> shakewatch::Result<()> {
        self.feed = None;
        Ok(())
    }
}

/// Tracks whether the microphone is open.
struct TrackingClassifier {
    recording: Arc<AtomicBool>,
}

impl AudioClassifier for TrackingClassifier {
    fn start_recording(&mut self) -> shakewatch::Result<()> {
        self.recording.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn classify(&mut self) -> shakewatch::Result<Vec<Category>> {
        Ok(vec![Category::new("Speech", 0.5)])
    }

    fn stop_recording(&mut self) -> shakewatch::Result<()> {
        self.recording.store(false, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[test]
fn stop_before_start_is_a_no_op() {
    let (sensor, tracker) = SilentSensor::new();
    let mut source = EventSource::new(sensor);
    assert!(source.stop().is_ok());
    assert!(source.stop().is_ok());
    assert!(!source.is_running());
    assert_eq!(tracker.unsubscribes.load(Ordering::SeqCst), 0);
}

#[test]
fn invalid_config_is_rejected_before_anything_starts() {
    let (sensor, tracker) = SilentSensor::new();
    let mut source = EventSource::new(sensor);
    let config = DetectorConfig {
        max_samples: 0,
        ..sensor_only()
    };
    assert!(matches!(source.start(config), Err(ShakeError::InvalidConfig(_))));
    assert!(!source.is_running());
    assert_eq!(tracker.subscribes.load(Ordering::SeqCst), 0);
}

#[test]
fn start_stop_cycles_release_everything() {
    init_logging();
    let (sensor, tracker) = SilentSensor::new();
    let recording = Arc::new(AtomicBool::new(false));
    let mut source = EventSource::new(sensor).with_classifier(TrackingClassifier {
        recording: Arc::clone(&recording),
    });
    let config = DetectorConfig {
        classification_interval_ms: 5,
        aggregation_window_ms: 20,
        ..sensor_only()
    };
    let config = DetectorConfig {
        use_audio_classifier: true,
        ..config
    };

    for _ in 0..10 {
        source.start(config.clone()).unwrap();
        assert!(source.is_running());
        assert!(tracker.active.load(Ordering::SeqCst));
        assert!(recording.load(Ordering::SeqCst));

        source.stop().unwrap();
        assert!(!source.is_running());
        assert!(!tracker.active.load(Ordering::SeqCst));
        assert!(!recording.load(Ordering::SeqCst));
    }
    assert_eq!(tracker.subscribes.load(Ordering::SeqCst), 10);
    assert_eq!(tracker.unsubscribes.load(Ordering::SeqCst), 10);
}

#[test]
fn starting_again_replaces_the_running_session() {
    let (sensor, tracker) = SilentSensor::new();
    let mut source = EventSource::new(sensor);
    source.start(sensor_only()).unwrap();
    source
        .start(DetectorConfig {
            max_samples: 10,
            ..sensor_only()
        })
        .unwrap();

    assert_eq!(tracker.subscribes.load(Ordering::SeqCst), 2);
    assert_eq!(tracker.unsubscribes.load(Ordering::SeqCst), 1);
    assert_eq!(source.config().map(|c| c.max_samples), Some(10));
    source.stop().unwrap();
}

#[test]
fn missing_sensor_fails_start_and_releases_the_microphone() {
    let recording = Arc::new(AtomicBool::new(false));
    let mut source = EventSource::new(ScriptedAccelerometer::absent()).with_classifier(
        TrackingClassifier {
            recording: Arc::clone(&recording),
        },
    );
    let config = DetectorConfig {
        use_audio_classifier: true,
        ..sensor_only()
    };

    assert!(matches!(source.start(config), Err(ShakeError::SensorUnavailable(_))));
    assert!(!source.is_running());
    assert!(!recording.load(Ordering::SeqCst));
}

#[test]
fn missing_audio_permission_fails_start() {
    let (sensor, tracker) = SilentSensor::new();
    let mut source = EventSource::new(sensor)
        .with_classifier(ScriptedClassifier::constant(vec![]).without_permission());
    let config = DetectorConfig {
        use_audio_classifier: true,
        ..sensor_only()
    };

    assert!(matches!(source.start(config), Err(ShakeError::PermissionDenied(_))));
    assert!(!source.is_running());
    assert_eq!(tracker.subscribes.load(Ordering::SeqCst), 0);
}

#[test]
fn classifier_requested_but_not_installed_fails_start() {
    let (sensor, _tracker) = SilentSensor::new();
    let mut source = EventSource::new(sensor);
    let config = DetectorConfig {
        use_audio_classifier: true,
        ..sensor_only()
    };
    assert!(matches!(source.start(config), Err(ShakeError::Classifier(_))));
}

#[test]
fn release_failure_does_not_fail_stop() {
    let (sensor, _tracker) = SilentSensor::new();
    let mut source = EventSource::new(sensor)
        .with_classifier(ScriptedClassifier::constant(vec![]).failing_release());
    source
        .start(DetectorConfig {
            use_audio_classifier: true,
            ..sensor_only()
        })
        .unwrap();
    assert!(source.stop().is_ok());
    assert!(!source.is_running());
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

#[test]
fn a_shake_burst_yields_one_debounced_event() {
    init_logging();
    let mut source = EventSource::new(shaking_sensor(35.0));
    let subscription = source.subscribe();
    source.start(sensor_only()).unwrap();

    let notification = subscription
        .next_timeout(Duration::from_secs(5))
        .expect("no shake detected");
    assert!(notification.fraction_over_threshold > 0.66);
    assert!(notification.fraction_over_threshold <= 1.0);
    assert!(notification.classifications.is_none());

    assert!(subscription.next_timeout(Duration::from_millis(800)).is_none());
    let stats = source.stats();
    assert_eq!(stats.events_emitted, 1);
    assert!(stats.shakes_detected >= 1);
    assert!(stats.samples_admitted > 0);
    source.stop().unwrap();
}

#[test]
fn gentle_motion_never_fires() {
    let mut source = EventSource::new(shaking_sensor(5.0));
    let subscription = source.subscribe();
    source.start(sensor_only()).unwrap();

    assert!(subscription.next_timeout(Duration::from_millis(1500)).is_none());
    assert_eq!(source.stats().events_emitted, 0);
    source.stop().unwrap();
}

#[test]
fn notifications_carry_the_latest_classification() {
    init_logging();
    let classifier = ScriptedClassifier::new(vec![
        vec![Category::new("Glass", 0.7), Category::new("Hum", 0.05)],
        vec![Category::new("Speech", 0.4)],
    ]);
    let sensor = ScriptedAccelerometer::new(synthetic_shake_trace(300, 600, 10, 35.0))
        .paced(Duration::from_millis(3));
    let mut source = EventSource::new(sensor).with_classifier(classifier);
    let subscription = source.subscribe();
    source
        .start(DetectorConfig {
            use_audio_classifier: true,
            classification_interval_ms: 5,
            aggregation_window_ms: 50,
            ..sensor_only()
        })
        .unwrap();

    let notification = subscription
        .next_timeout(Duration::from_secs(5))
        .expect("no shake detected");
    let classifications = notification.classifications.expect("classifier output missing");
    assert_eq!(classifications.get("Glass"), Some(0.7));
    assert_eq!(classifications.get("Hum"), None);

    let pulled = source.classify().unwrap();
    assert!(pulled.get("Glass").is_some() || pulled.get("Speech").is_some());
    source.stop().unwrap();
}

#[test]
fn classify_requires_a_classifier_session() {
    let (sensor, _tracker) = SilentSensor::new();
    let mut source = EventSource::new(sensor);
    assert!(matches!(source.classify(), Err(ShakeError::ClassifierDisabled)));

    source.start(sensor_only()).unwrap();
    assert!(matches!(source.classify(), Err(ShakeError::ClassifierDisabled)));
    source.stop().unwrap();
}

#[test]
fn failing_host_sinks_do_not_block_other_consumers() {
    let mut source = EventSource::new(shaking_sensor(35.0));
    source.add_sink(|_: &ShakeNotification| -> anyhow::Result<()> {
        anyhow::bail!("host callback threw")
    });
    source.add_sink(|_: &ShakeNotification| -> anyhow::Result<()> {
        panic!("host callback panicked")
    });
    let subscription = source.subscribe();
    source.start(sensor_only()).unwrap();

    assert!(subscription.next_timeout(Duration::from_secs(5)).is_some());
    source.stop().unwrap();
}

#[test]
fn subscriptions_survive_a_restart() {
    let trace = synthetic_shake_trace(300, 600, 10, 35.0);
    let mut source = EventSource::new(
        ScriptedAccelerometer::new(trace).paced(Duration::from_millis(2)),
    );
    let subscription = source.subscribe();

    for _ in 0..2 {
        source.start(sensor_only()).unwrap();
        assert!(subscription.next_timeout(Duration::from_secs(5)).is_some());
        source.stop().unwrap();
    }
}

#[test]
fn recent_samples_reflect_the_live_ring() {
    let mut source = EventSource::new(shaking_sensor(35.0));
    let subscription = source.subscribe();
    source.start(sensor_only()).unwrap();
    // The event is flushed once the whole trace has been consumed.
    subscription.next_timeout(Duration::from_secs(5)).unwrap();

    // The trace ends at t = 1200 ms; window is 500 ms, admitted every 20 ms.
    let recent = source.recent_samples(1200);
    assert_eq!(recent.len(), 26);
    assert!(recent.iter().all(|s| 1200 - s.timestamp_ms <= 500));
    source.stop().unwrap();
    assert!(source.recent_samples(1200).is_empty());
}

// ---------------------------------------------------------------------------
// Backpressure
// ---------------------------------------------------------------------------

fn wait_for_stats(source: &EventSource, done: impl Fn(&SessionStats) -> bool) -> SessionStats {
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    loop {
        let stats = source.stats();
        if done(&stats) || std::time::Instant::now() >= deadline {
            return stats;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn sensor_feed_overflow_is_reported_in_stats() {
    init_logging();
    let trace = synthetic_shake_trace(0, 20_000, 1, 35.0);
    let pushed = trace.len() as u64;
    let mut source = EventSource::new(BurstSensor { trace, feed: None });
    source
        .start(DetectorConfig {
            max_samples: 2,
            ..sensor_only()
        })
        .unwrap();

    // Every pushed reading is either evicted or seen by the sensor task.
    let stats = wait_for_stats(&source, |s| {
        s.sensor_dropped + s.samples_admitted + s.samples_rejected == pushed
    });
    assert!(stats.sensor_dropped > 0, "{:?}", stats);
    assert_eq!(
        stats.sensor_dropped + stats.samples_admitted + stats.samples_rejected,
        pushed
    );
    assert_eq!(stats.classifications_dropped, 0);
    source.stop().unwrap();
}

#[test]
fn classification_queue_overflow_is_reported_in_stats() {
    let (sensor, _tracker) = SilentSensor::new();
    let mut source = EventSource::new(sensor)
        .with_classifier(ScriptedClassifier::constant(vec![Category::new("Speech", 0.9)]));
    source
        .start(DetectorConfig {
            use_audio_classifier: true,
            classification_interval_ms: 1,
            classification_queue_capacity: 1,
            // Drained once at start, then not again for the rest of the test.
            aggregation_window_ms: 60_000,
            ..sensor_only()
        })
        .unwrap();

    let stats = wait_for_stats(&source, |s| s.classifications_dropped >= 5);
    assert!(stats.classifications_dropped >= 5, "{:?}", stats);
    assert_eq!(stats.sensor_dropped, 0);

    source.stop().unwrap();
    assert_eq!(source.stats(), SessionStats::default());
}
