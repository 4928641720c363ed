//! Service lifecycle: validate, seed, schedule, stop.
//!
//! Decoupled from any host runtime; the caller supplies the config and
//! the collaborators and keeps the returned handle until shutdown.

use tracing::info;

use ratekeeper_core::ControllerConfig;

use crate::collaborator::Collaborators;
use crate::controller::SamplingController;
use crate::scheduler::{CycleScheduler, ScheduleHandle};
use crate::state::CycleState;

/// Entry point for running the control loop.
pub struct Service;

/// A running control loop.
pub struct ServiceHandle {
    schedule: ScheduleHandle,
}

impl Service {
    /// Validate the config, run the seeding measurement, and start ticking.
    ///
    /// Fails only on configuration errors; collaborator problems during
    /// startup are logged and retried by the regular cycles.
    pub async fn start(
        config: ControllerConfig,
        collaborators: Collaborators,
    ) -> anyhow::Result<ServiceHandle> {
        let mut controller = SamplingController::new(&config, collaborators)?;
        controller.initialize().await;

        let schedule = CycleScheduler::new(config.window()).spawn(controller);
        info!(window_ms = config.window_ms, "sampling service started");
        Ok(ServiceHandle { schedule })
    }

    /// Stop the loop and wait for an in-flight cycle to finish.
    pub async fn stop(handle: ServiceHandle) -> anyhow::Result<CycleState> {
        handle.stop().await
    }
}

impl ServiceHandle {
    /// Stop and return the final cycle state.
    pub async fn stop(self) -> anyhow::Result<CycleState> {
        let controller = self.schedule.shutdown().await?;
        info!(
            percent = controller.current_fraction() * 100.0,
            "sampling service stopped"
        );
        Ok(controller.into_state())
    }
}
