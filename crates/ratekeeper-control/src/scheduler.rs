//! Fixed-interval cycle scheduler.
//!
//! A single task owns the controller and runs cycles back to back on a
//! `tokio::time::interval`. Cycles never overlap: a tick that comes due
//! while a cycle is still in flight is deferred until it finishes
//! (`MissedTickBehavior::Delay`). Shutdown is observed only between
//! cycles, so an in-flight cycle always completes its persistence write.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::controller::{CycleOutcome, SamplingController};

/// Drives a [`SamplingController`] once per window.
#[derive(Debug, Clone, Copy)]
pub struct CycleScheduler {
    window: Duration,
}

/// Handle to a running scheduler task.
pub struct ScheduleHandle {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<SamplingController>,
}

impl CycleScheduler {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    /// Move the controller onto a background task and start ticking.
    ///
    /// The first cycle runs one full window after spawning.
    pub fn spawn(self, controller: SamplingController) -> ScheduleHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_cycles(controller, self.window, shutdown_rx));
        ScheduleHandle {
            shutdown_tx,
            handle,
        }
    }
}

impl ScheduleHandle {
    /// Ask the scheduler to stop firing ticks.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Wait for the scheduler task to exit and take the controller back.
    pub async fn join(self) -> anyhow::Result<SamplingController> {
        Ok(self.handle.await?)
    }

    /// Stop, then wait for any in-flight cycle to finish.
    pub async fn shutdown(self) -> anyhow::Result<SamplingController> {
        self.stop();
        self.join().await
    }
}

async fn run_cycles(
    mut controller: SamplingController,
    window: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> SamplingController {
    let mut interval = tokio::time::interval_at(Instant::now() + window, window);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(window_ms = window.as_millis() as u64, "cycle scheduler started");

    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = interval.tick() => {
                let started = Instant::now();
                match controller.run_cycle().await {
                    CycleOutcome::Corrected(report) => {
                        debug!(target = %report.target, percent = report.percent(), "cycle complete");
                    }
                    CycleOutcome::MeasurementFailed { consecutive_failures, .. } => {
                        debug!(consecutive_failures, "cycle skipped");
                    }
                }
                let elapsed = started.elapsed();
                if elapsed > window {
                    warn!(
                        elapsed_ms = elapsed.as_millis() as u64,
                        window_ms = window.as_millis() as u64,
                        "cycle outlasted its window, next tick deferred"
                    );
                }
            }
        }
    }

    info!("cycle scheduler stopped");
    controller
}
