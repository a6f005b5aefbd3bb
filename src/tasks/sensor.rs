// Shakewatch - Sensor Task
//
// Drains the raw accelerometer feed, runs every reading through the gate,
// the rate limiter and the ring buffer, evaluates the window inline, and
// forwards debounced shake events to the dispatch task.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use parking_lot::RwLockWriteGuard;

use crate::config::{DetectorConfig, SENSOR_IDLE_POLL_MS};
use crate::decision::{ShakeDecisionEngine, TrailingDebouncer};
use crate::events::{RawSensorEvent, ShakeEvent};
use crate::filter::{SampleFilter, SensorGate};
use crate::ring::SharedRing;
use crate::stats::SessionCounters;
use crate::timer::SessionClock;

/// Everything between a raw reading and a (not yet debounced) shake decision.
pub struct SensorPipeline {
    gate: SensorGate,
    filter: SampleFilter,
    engine: ShakeDecisionEngine,
    ring: SharedRing,
    counters: Arc<SessionCounters>,
}

impl SensorPipeline {
    pub fn new(config: &DetectorConfig, ring: SharedRing, counters: Arc<SessionCounters>) -> Self {
        Self {
            gate: SensorGate::new(config.min_accuracy),
            filter: SampleFilter::new(config.min_time_between_samples_ms),
            engine: ShakeDecisionEngine::new(config),
            ring,
            counters,
        }
    }

    pub fn process(&mut self, event: &RawSensorEvent) -> Option<ShakeEvent> {
        let admitted = if self.gate.pass(event) {
            self.filter.admit(event)
        } else {
            None
        };
        let Some(sample) = admitted else {
            SessionCounters::bump(&self.counters.samples_rejected);
            return None;
        };
        SessionCounters::bump(&self.counters.samples_admitted);

        // Write and scan under one lock acquisition so the evaluation sees
        // exactly the ring state this sample produced.
        let mut ring = self.ring.write();
        ring.write(sample.timestamp_ms, sample.magnitude);
        let ring = RwLockWriteGuard::downgrade(ring);
        let decision = self.engine.evaluate(&ring, sample.timestamp_ms);
        drop(ring);

        if decision.is_some() {
            SessionCounters::bump(&self.counters.shakes_detected);
        }
        decision
    }
}

pub fn sensor_task(
    feed_rx: Receiver<RawSensorEvent>,
    mut pipeline: SensorPipeline,
    mut debouncer: TrailingDebouncer,
    shake_tx: Sender<ShakeEvent>,
    shutdown: Arc<AtomicBool>,
    clock: SessionClock,
) {
    log::info!("Sensor task started");

    let idle = Duration::from_millis(SENSOR_IDLE_POLL_MS);

    loop {
        if shutdown.load(Ordering::Acquire) {
            // A pending event dies with the session.
            debouncer.clear();
            break;
        }

        // Wake up no later than the debounce deadline.
        let wait = debouncer
            .deadline()
            .map(|due| Duration::from_millis(due.saturating_sub(clock.now_ms())).min(idle))
            .unwrap_or(idle);

        match feed_rx.recv_timeout(wait) {
            Ok(event) => {
                if let Some(shake) = pipeline.process(&event) {
                    debouncer.offer(shake, clock.now_ms());
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                log::warn!("Sensor feed closed, exiting sensor task");
                if let Some(shake) = wait_out_pending(&mut debouncer, &shutdown, clock) {
                    emit(&pipeline.counters, &shake_tx, shake);
                }
                break;
            }
        }

        if let Some(shake) = debouncer.poll(clock.now_ms()) {
            if !emit(&pipeline.counters, &shake_tx, shake) {
                log::warn!("Dispatch channel closed, exiting sensor task");
                break;
            }
        }
    }

    log::info!("Sensor task stopped");
}

/// After the feed has ended, hold the pending event until its quiet period
/// is over. Gives up, discarding it, if the session shuts down first.
fn wait_out_pending(
    debouncer: &mut TrailingDebouncer,
    shutdown: &AtomicBool,
    clock: SessionClock,
) -> Option<ShakeEvent> {
    let idle = Duration::from_millis(SENSOR_IDLE_POLL_MS);
    loop {
        let due = debouncer.deadline()?;
        if shutdown.load(Ordering::Acquire) {
            debouncer.clear();
            return None;
        }
        let now = clock.now_ms();
        if let Some(shake) = debouncer.poll(now) {
            return Some(shake);
        }
        thread::sleep(Duration::from_millis(due.saturating_sub(now)).min(idle));
    }
}

/// Returns `false` if the dispatch task is gone.
fn emit(counters: &SessionCounters, shake_tx: &Sender<ShakeEvent>, shake: ShakeEvent) -> bool {
    log::info!(
        "Shake detected ({:.0}% of window over threshold)",
        shake.fraction_over_threshold * 100.0
    );
    SessionCounters::bump(&counters.events_emitted);
    shake_tx.send(shake).is_ok()
}
