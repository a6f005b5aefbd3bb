// Shakewatch - Timers
//
// `SessionClock` gives every task of a session the same millisecond time
// base. `PeriodicTask` runs a closure on its own named thread at a fixed
// interval until it is cancelled.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::config::WORKER_STACK_SIZE;
use crate::error::Result;

// ---------------------------------------------------------------------------
// Session clock
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct SessionClock {
    origin: Instant,
}

impl SessionClock {
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Milliseconds since the session started.
    pub fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

// ---------------------------------------------------------------------------
// Periodic task
// ---------------------------------------------------------------------------

pub struct PeriodicTask {
    name: String,
    stop_tx: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    /// Run `tick` immediately and then once per `interval`. Time spent inside
    /// `tick` counts against the interval.
    pub fn spawn<F>(name: &str, interval: Duration, mut tick: F) -> Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let task_name = name.to_owned();

        let handle = thread::Builder::new()
            .name(name.into())
            .stack_size(WORKER_STACK_SIZE)
            .spawn(move || {
                log::debug!("{} task started ({:?} interval)", task_name, interval);
                loop {
                    let tick_start = Instant::now();
                    tick();

                    let wait = interval.saturating_sub(tick_start.elapsed());
                    match stop_rx.recv_timeout(wait) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        // Explicit stop or the handle was dropped.
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                log::debug!("{} task stopped", task_name);
            })?;

        Ok(Self {
            name: name.to_owned(),
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Stop the task and wait for its thread to finish. Safe to call twice.
    pub fn cancel(&mut self) {
        drop(self.stop_tx.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("{} task panicked", self.name);
            }
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.cancel();
    }
}
