//! Fixed-cadence cycle scheduler
//!
//! A scheduler runs its cycle function on one worker thread, once per tick.
//! Ticks never overlap: when a cycle overruns, the next tick fires as soon as it
//! returns and the cadence realigns from there. Stopping is cooperative and never
//! interrupts a cycle in flight.

use crate::error::PipelineError;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Cloneable handle that requests a stop from any thread.
///
/// Safe to use from inside a cycle; the worker exits once that cycle returns.
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Sender<()>,
}

impl StopHandle {
    /// Request a stop. Idempotent; does nothing once the worker has exited.
    pub fn stop(&self) {
        let _ = self.tx.send(());
    }
}

struct Worker {
    stop: StopHandle,
    handle: JoinHandle<()>,
}

/// Drives a cycle function at a fixed interval
#[derive(Default)]
pub struct Scheduler {
    worker: Option<Worker>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start ticking every `interval`.
    ///
    /// The first tick is due one interval from now. `cycle` receives the 1-based
    /// tick number.
    pub fn start<F>(&mut self, interval: Duration, mut cycle: F) -> Result<(), PipelineError>
    where
        F: FnMut(u64) + Send + 'static,
    {
        if interval.is_zero() {
            return Err(PipelineError::InvalidConfig(
                "tick interval must be positive".to_string(),
            ));
        }
        if self.is_running() {
            return Err(PipelineError::AlreadyRunning);
        }
        // Reap a worker that exited on its own (stopped from inside a cycle)
        self.stop();

        let (tx, rx) = mpsc::channel::<()>();

        let handle = thread::Builder::new()
            .name("drive-scheduler".to_string())
            .spawn(move || {
                let mut next_due = Instant::now() + interval;
                let mut tick: u64 = 0;

                loop {
                    let wait = next_due.saturating_duration_since(Instant::now());
                    match rx.recv_timeout(wait) {
                        Err(RecvTimeoutError::Timeout) => {}
                        // Stop requested, or every handle dropped
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }

                    tick += 1;
                    cycle(tick);

                    next_due += interval;
                    let now = Instant::now();
                    if next_due < now {
                        warn!(
                            tick,
                            overrun_ms = (now - next_due).as_millis() as u64,
                            "cycle overran its tick; deferring next tick"
                        );
                        next_due = now;
                    }
                }

                debug!(ticks = tick, "scheduler worker exiting");
            })
            .map_err(|e| PipelineError::SchedulerError(e.to_string()))?;

        self.worker = Some(Worker {
            stop: StopHandle { tx },
            handle,
        });
        Ok(())
    }

    /// Stop ticking. No cycle starts after this returns.
    ///
    /// Waits for an in-flight cycle to finish, unless called from the worker
    /// thread itself. Idempotent.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        worker.stop.stop();
        if worker.handle.thread().id() == thread::current().id() {
            // Called from inside a cycle; the loop exits when it returns
            return;
        }
        if worker.handle.join().is_err() {
            warn!("scheduler worker panicked");
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .map_or(false, |w| !w.handle.is_finished())
    }

    /// Handle for stopping from another thread or from inside a cycle
    pub fn stop_handle(&self) -> Option<StopHandle> {
        self.worker.as_ref().map(|w| w.stop.clone())
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("running", &self.is_running())
            .finish()
    }
}
