// Shakewatch - Event Source
//
// The host-facing entry point. An `EventSource` owns the sensor and the
// (optional) audio classifier for its whole life, and runs at most one
// detection session at a time:
//
//   sensor --feed--> sensor task --shakes--> dispatch task --> sinks
//                       |  ring buffer (shared, RwLock)
//   classifier --> inference task --queue--> aggregation task --> snapshot
//
// `stop` is idempotent and tears every thread of the session down before it
// returns, so start/stop cycles never accumulate workers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::aggregate::LatestSnapshot;
use crate::config::{DetectorConfig, WORKER_STACK_SIZE};
use crate::decision::TrailingDebouncer;
use crate::drivers::audio::{self, AudioClassifier, SharedClassifier};
use crate::drivers::imu::{SensorFeed, SensorSource};
use crate::error::{Result, ShakeError};
use crate::events::{ClassificationSnapshot, Sample};
use crate::queue::drop_oldest;
use crate::ring::{SampleRingBuffer, SharedRing};
use crate::sink::{ShakeSink, ShakeSubscription, SinkRegistry};
use crate::stats::{SessionCounters, SessionStats};
use crate::tasks::classifier::ClassifierPipeline;
use crate::tasks::dispatch::dispatch_task;
use crate::tasks::sensor::{sensor_task, SensorPipeline};
use crate::timer::SessionClock;

pub struct EventSource {
    sensor: Box<dyn SensorSource>,
    classifier: Option<SharedClassifier>,
    sinks: SinkRegistry,
    session: Option<Session>,
}

impl EventSource {
    pub fn new(sensor: impl SensorSource + 'static) -> Self {
        Self {
            sensor: Box::new(sensor),
            classifier: None,
            sinks: SinkRegistry::default(),
            session: None,
        }
    }

    /// Install the audio classifier used by sessions that ask for one.
    pub fn with_classifier(mut self, classifier: impl AudioClassifier + 'static) -> Self {
        self.classifier = Some(audio::shared(classifier));
        self
    }

    pub fn is_running(&self) -> bool {
        self.session.is_some()
    }

    /// Configuration of the running session.
    pub fn config(&self) -> Option<&DetectorConfig> {
        self.session.as_ref().map(|s| &s.config)
    }

    /// Start a fresh session. A running session is stopped first. If any
    /// part fails to come up, everything already started is torn down again
    /// and the error is returned.
    pub fn start(&mut self, config: DetectorConfig) -> Result<()> {
        config.validate()?;
        self.stop()?;

        log::info!("Starting shake detector: {:?}", config);
        let mut session = Session::new(config);

        if session.config.use_audio_classifier {
            let classifier = self.classifier.clone().ok_or_else(|| {
                ShakeError::Classifier("no audio classifier installed".into())
            })?;
            session.start_classifier(classifier)?;
        }

        let feed = session.spawn_workers(self.sinks.clone())?;
        // On error `session` drops here and joins its workers.
        self.sensor.subscribe(feed)?;

        self.session = Some(session);
        Ok(())
    }

    /// Stop the running session, if any. Release failures are logged, not
    /// returned.
    pub fn stop(&mut self) -> Result<()> {
        let Some(mut session) = self.session.take() else {
            return Ok(());
        };

        if let Err(e) = self.sensor.unsubscribe() {
            log::warn!("Sensor unsubscribe failed: {}", e);
        }
        session.shutdown();
        log::info!("Shake detector stopped ({:?})", session.counters.snapshot());
        Ok(())
    }

    /// Latest merged classification of the running session. Empty until the
    /// first aggregation tick.
    pub fn classify(&self) -> Result<ClassificationSnapshot> {
        let latest = self
            .session
            .as_ref()
            .and_then(|s| s.latest.as_ref())
            .ok_or(ShakeError::ClassifierDisabled)?;
        let snapshot = latest.read().clone().unwrap_or_default();
        Ok(snapshot)
    }

    /// Pull-style access to shake notifications. Survives across sessions.
    pub fn subscribe(&self) -> ShakeSubscription {
        self.sinks.subscribe()
    }

    /// Push-style access to shake notifications. Survives across sessions.
    pub fn add_sink(&self, sink: impl ShakeSink + 'static) {
        self.sinks.add(sink);
    }

    /// Samples of the running session inside its decision window, as seen
    /// from `now_ms` on the sensor's clock.
    pub fn recent_samples(&self, now_ms: i64) -> Vec<Sample> {
        match &self.session {
            Some(session) => session.ring.read().snapshot_window(
                now_ms,
                session.config.visible_time_range_ms,
                session.config.window_boundary,
            ),
            None => Vec::new(),
        }
    }

    /// Counters of the running session; zeroes when idle.
    pub fn stats(&self) -> SessionStats {
        self.session
            .as_ref()
            .map(|s| s.counters.snapshot())
            .unwrap_or_default()
    }
}

impl Drop for EventSource {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

struct Session {
    config: DetectorConfig,
    clock: SessionClock,
    ring: SharedRing,
    counters: Arc<SessionCounters>,
    shutdown: Arc<AtomicBool>,
    classifier: Option<ClassifierPipeline>,
    latest: Option<LatestSnapshot>,
    sensor_worker: Option<JoinHandle<()>>,
    dispatcher: Option<JoinHandle<()>>,
}

impl Session {
    fn new(config: DetectorConfig) -> Self {
        let ring = SampleRingBuffer::shared(config.max_samples);
        Self {
            config,
            clock: SessionClock::start(),
            ring,
            counters: Arc::new(SessionCounters::default()),
            shutdown: Arc::new(AtomicBool::new(false)),
            classifier: None,
            latest: None,
            sensor_worker: None,
            dispatcher: None,
        }
    }

    fn start_classifier(&mut self, classifier: SharedClassifier) -> Result<()> {
        let pipeline = ClassifierPipeline::start(classifier, &self.config, self.clock)?;
        self.latest = Some(pipeline.latest());
        self.classifier = Some(pipeline);
        Ok(())
    }

    /// Spawn the sensor and dispatch tasks and return the feed the sensor
    /// should deliver into.
    fn spawn_workers(&mut self, sinks: SinkRegistry) -> Result<SensorFeed> {
        let (feed, feed_rx) = drop_oldest(self.config.max_samples, "sensor");
        let (shake_tx, shake_rx) = mpsc::channel();

        // Share the queues' eviction counts with the session counters.
        self.counters = Arc::new(SessionCounters {
            sensor_dropped: feed.drop_counter(),
            classifications_dropped: self
                .classifier
                .as_ref()
                .map(|c| c.drop_counter())
                .unwrap_or_default(),
            ..Default::default()
        });

        let latest = self.latest.clone();
        self.dispatcher = Some(
            thread::Builder::new()
                .name("shake-dispatch".into())
                .stack_size(WORKER_STACK_SIZE)
                .spawn(move || dispatch_task(shake_rx, sinks, latest))?,
        );

        let pipeline = SensorPipeline::new(
            &self.config,
            Arc::clone(&self.ring),
            Arc::clone(&self.counters),
        );
        let debouncer = TrailingDebouncer::new(self.config.event_cooldown_ms);
        let shutdown = Arc::clone(&self.shutdown);
        let clock = self.clock;
        self.sensor_worker = Some(
            thread::Builder::new()
                .name("shake-sensor".into())
                .stack_size(WORKER_STACK_SIZE)
                .spawn(move || sensor_task(feed_rx, pipeline, debouncer, shake_tx, shutdown, clock))?,
        );

        Ok(feed)
    }

    /// Join every worker. Safe to call twice.
    fn shutdown(&mut self) {
        self.shutdown.store(true, Ordering::Release);

        // The sensor task owns the shake sender; once it exits the dispatch
        // task drains and exits too.
        if let Some(worker) = self.sensor_worker.take() {
            if worker.join().is_err() {
                log::error!("Sensor task panicked");
            }
        }
        if let Some(worker) = self.dispatcher.take() {
            if worker.join().is_err() {
                log::error!("Dispatch task panicked");
            }
        }
        if let Some(mut pipeline) = self.classifier.take() {
            pipeline.stop();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}
