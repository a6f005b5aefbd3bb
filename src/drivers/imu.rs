// Shakewatch - Accelerometer Source
//
// `SensorSource` is the contract the platform accelerometer fulfils: push raw
// readings into the session's feed between `subscribe` and `unsubscribe`.
// `ScriptedAccelerometer` replays a prepared trace on its own thread; the demo
// binary and the tests drive sessions with it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::config::WORKER_STACK_SIZE;
use crate::error::{Result, ShakeError};
use crate::events::RawSensorEvent;
use crate::queue::DropOldestSender;

/// Where a subscribed sensor delivers its readings. Never blocks.
pub type SensorFeed = DropOldestSender<RawSensorEvent>;

pub trait SensorSource: Send {
    /// Start delivering readings into `feed`. Fails if the sensor is absent.
    fn subscribe(&mut self, feed: SensorFeed) -> Result<()>;

    /// Stop delivering readings. Must not return until delivery has stopped.
    fn unsubscribe(&mut self) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Scripted accelerometer
// ---------------------------------------------------------------------------

pub struct ScriptedAccelerometer {
    trace: Arc<Vec<RawSensorEvent>>,
    pacing: Option<Duration>,
    present: bool,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl ScriptedAccelerometer {
    /// Replay `trace` as fast as the feed accepts it.
    pub fn new(trace: Vec<RawSensorEvent>) -> Self {
        Self {
            trace: Arc::new(trace),
            pacing: None,
            present: true,
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    /// A device without an accelerometer; every subscribe fails.
    pub fn absent() -> Self {
        let mut sensor = Self::new(Vec::new());
        sensor.present = false;
        sensor
    }

    /// Sleep `interval` between readings.
    pub fn paced(mut self, interval: Duration) -> Self {
        self.pacing = Some(interval);
        self
    }

    /// Whether a replay thread is currently attached.
    pub fn is_streaming(&self) -> bool {
        self.worker.is_some()
    }
}

impl SensorSource for ScriptedAccelerometer {
    fn subscribe(&mut self, feed: SensorFeed) -> Result<()> {
        if !self.present {
            return Err(ShakeError::SensorUnavailable(
                "no accelerometer on this device".into(),
            ));
        }
        if self.worker.is_some() {
            return Err(ShakeError::Sensor("accelerometer already subscribed".into()));
        }

        self.running.store(true, Ordering::Release);
        let running = Arc::clone(&self.running);
        let trace = Arc::clone(&self.trace);
        let pacing = self.pacing;

        let worker = thread::Builder::new()
            .name("accel-replay".into())
            .stack_size(WORKER_STACK_SIZE)
            .spawn(move || {
                log::debug!("Replaying {} accelerometer readings", trace.len());
                for event in trace.iter() {
                    if !running.load(Ordering::Acquire) {
                        return;
                    }
                    feed.push(event.clone());
                    if let Some(interval) = pacing {
                        thread::sleep(interval);
                    }
                }
                log::debug!("Accelerometer replay finished");
            })?;

        self.worker = Some(worker);
        Ok(())
    }

    fn unsubscribe(&mut self) -> Result<()> {
        self.running.store(false, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            worker
                .join()
                .map_err(|_| ShakeError::Sensor("accelerometer replay thread panicked".into()))?;
        }
        Ok(())
    }
}

impl Drop for ScriptedAccelerometer {
    fn drop(&mut self) {
        let _ = self.unsubscribe();
    }
}

// ---------------------------------------------------------------------------
// Synthetic traces
// ---------------------------------------------------------------------------

const GRAVITY: f32 = 9.81;

/// A device at rest, then shaken hard along x, then at rest again. Readings
/// are `period_ms` apart. Rest readings alternate by a hair so consecutive
/// values are never identical.
pub fn synthetic_shake_trace(
    rest_ms: i64,
    shake_ms: i64,
    period_ms: i64,
    shake_amplitude: f32,
) -> Vec<RawSensorEvent> {
    assert!(period_ms > 0, "period must be positive");
    let total_ms = rest_ms * 2 + shake_ms;
    let mut trace = Vec::with_capacity((total_ms / period_ms + 1) as usize);

    let mut t = 0;
    let mut i = 0u32;
    while t <= total_ms {
        let shaking = t >= rest_ms && t < rest_ms + shake_ms;
        let flip = if i % 2 == 0 { 1.0 } else { -1.0 };
        let (x, z) = if shaking {
            (shake_amplitude * flip, GRAVITY)
        } else {
            (0.0, GRAVITY + 0.01 * flip)
        };
        trace.push(RawSensorEvent::new(t * 1_000_000, x, 0.0, z));
        t += period_ms;
        i += 1;
    }
    trace
}
