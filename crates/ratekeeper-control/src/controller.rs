//! Sampling controller: one measurement-and-correct cycle per window.
//!
//! Each cycle resolves the active target, measures its size, turns the
//! growth since the last successful measurement into a normalized error
//! against the target bytes per window, and corrects the kept fraction
//! with the PID output:
//!
//! ```text
//! windows     = consecutive_failures + 1
//! averaged    = raw_delta / windows
//! smoothed    = ema(averaged)
//! error       = (smoothed - target_per_window) / target_per_window
//! fraction    = clamp(fraction - pid(error), minimum, 1.0)
//! ```
//!
//! Growth faster than the target gives a positive error and therefore a
//! lower kept fraction.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use ratekeeper_core::{BYTES_PER_MB, ConfigError, ControllerConfig, CycleReport, PercentDocument};

use crate::collaborator::{CollaboratorError, Collaborators};
use crate::pid::PidController;
use crate::rotation::TargetRotation;
use crate::state::CycleState;

/// Result of a single cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Measurement succeeded and a new fraction was computed.
    Corrected(CycleReport),
    /// Measurement failed; nothing was corrected this window.
    MeasurementFailed {
        target: String,
        consecutive_failures: u32,
    },
}

/// Owns the PID controller, the cycle state, and the collaborators.
pub struct SamplingController {
    config: ControllerConfig,
    target_bytes_per_window: f64,
    minimum_fraction: f64,
    request_timeout: Duration,
    pid: PidController,
    rotation: TargetRotation,
    state: CycleState,
    collaborators: Collaborators,
}

impl SamplingController {
    /// Build a controller from a validated config.
    pub fn new(config: &ControllerConfig, collaborators: Collaborators) -> Result<Self, ConfigError> {
        config.validate()?;
        let sample = &config.connections.sample;
        Ok(Self {
            target_bytes_per_window: config.target_bytes_per_window(),
            minimum_fraction: config.minimum_fraction(),
            request_timeout: config.request_timeout(),
            pid: PidController::from_constants(&config.pid_constants),
            rotation: TargetRotation::new(&sample.daily_index_prefix, &sample.date_delimiter),
            state: CycleState::new(config.initial_fraction()),
            config: config.clone(),
            collaborators,
        })
    }

    pub async fn initialize(&mut self) {
        self.initialize_at(Utc::now()).await;
    }

    /// Seed the byte baseline and write the initial percent.
    ///
    /// A failed seeding measurement leaves the baseline at zero; the
    /// first scheduled cycle then sees the whole target as growth.
    pub async fn initialize_at(&mut self, now: DateTime<Utc>) {
        let target = self.rotation.current_target_id(now);
        info!(
            target_rate_mb = self.config.target_rate,
            window_ms = self.config.window_ms,
            target_bytes_per_window = self.target_bytes_per_window,
            initial_percent = self.config.initial_percent_kept,
            minimum_percent = self.config.minimum_percent,
            pid_constants = %self.config.pid_constants,
            %target,
            "sampling controller starting"
        );

        if let Some(metrics) = &self.collaborators.metrics {
            metrics.publish_info(&self.config.info_labels());
            metrics.set_target(&target);
        }

        self.state.reset_for_rotation(target.clone());
        match self.measure(&target).await {
            Ok(bytes) => {
                self.state.previous_measured_bytes = bytes;
                debug!(%target, bytes, "seeded index size");
            }
            Err(e) => warn!(%target, error = %e, "error retrieving initial index size"),
        }

        let percent = self.config.initial_percent_kept;
        self.persist(&target, percent, now).await;
    }

    pub async fn run_cycle(&mut self) -> CycleOutcome {
        self.run_cycle_at(Utc::now()).await
    }

    /// Run one measurement-and-correct cycle as of `now`.
    pub async fn run_cycle_at(&mut self, now: DateTime<Utc>) -> CycleOutcome {
        let target = self.rotation.current_target_id(now);
        if self.rotation.has_rotated(&self.state.previous_target_id, now) {
            info!(
                from = %self.state.previous_target_id,
                to = %target,
                "sample index rotated, resetting counters"
            );
            self.state.reset_for_rotation(target.clone());
        }
        self.state.cycles_since_rotation += 1;
        if let Some(metrics) = &self.collaborators.metrics {
            metrics.set_target(&target);
        }

        debug!(
            %target,
            previous_bytes = self.state.previous_measured_bytes,
            cycle = self.state.cycles_since_rotation,
            "cycle started"
        );

        let bytes = match self.measure(&target).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.state.consecutive_measurement_failures += 1;
                let consecutive_failures = self.state.consecutive_measurement_failures;
                warn!(
                    %target,
                    error = %e,
                    consecutive_failures,
                    "unable to retrieve index size, skipping percentage update this window"
                );
                if let Some(metrics) = &self.collaborators.metrics {
                    metrics.record_measurement_failure(consecutive_failures);
                }
                return CycleOutcome::MeasurementFailed {
                    target,
                    consecutive_failures,
                };
            }
        };

        let previous_bytes = self.state.previous_measured_bytes;
        let raw_delta_bytes = bytes as i64 - previous_bytes as i64;
        self.state.previous_measured_bytes = bytes;
        debug!(%target, previous_bytes, bytes, raw_delta_bytes, "index size measured");

        let windows = self.state.windows();
        let averaged_delta_bytes = raw_delta_bytes as f64 / f64::from(windows);
        let smoothed_delta_bytes = self.state.smoother.apply(averaged_delta_bytes);

        let error = (smoothed_delta_bytes - self.target_bytes_per_window) / self.target_bytes_per_window;
        let terms = self.pid.step(error);

        let previous_fraction = self.state.current_fraction;
        let new_fraction = (previous_fraction - terms.output).clamp(self.minimum_fraction, 1.0);

        let report = CycleReport {
            target: target.clone(),
            epoch_ms: epoch_ms(now),
            index_bytes: bytes,
            raw_delta_bytes,
            windows,
            averaged_delta_bytes,
            smoothed_delta_bytes,
            target_bytes_per_window: self.target_bytes_per_window,
            error,
            terms,
            previous_fraction,
            new_fraction,
            average_rate_mb_per_sec: self.average_rate_mb_per_sec(bytes),
        };

        self.persist(&target, report.percent(), now).await;

        if let Some(metrics) = &self.collaborators.metrics {
            metrics.record_cycle(&report, self.state.consecutive_measurement_failures);
        }
        for audit in &self.collaborators.audit {
            audit.record(&report);
        }

        info!(
            %target,
            target_bytes = self.target_bytes_per_window.round(),
            actual_bytes = raw_delta_bytes,
            delta_bytes = smoothed_delta_bytes,
            windows,
            error,
            adjustment = terms.output,
            percent = format_args!("{:.3}", report.percent()),
            "sample rate updated"
        );

        self.state.consecutive_measurement_failures = 0;
        self.state.current_fraction = new_fraction;
        CycleOutcome::Corrected(report)
    }

    /// Mean growth of the current target since rotation, in MB/s.
    fn average_rate_mb_per_sec(&self, bytes: u64) -> f64 {
        let elapsed_secs =
            f64::from(self.state.cycles_since_rotation) * self.config.window_ms as f64 / 1000.0;
        if elapsed_secs <= 0.0 {
            return 0.0;
        }
        (bytes as f64 / BYTES_PER_MB) / elapsed_secs
    }

    async fn measure(&self, target: &str) -> Result<u64, CollaboratorError> {
        bounded(
            "measurement",
            self.request_timeout,
            self.collaborators.measurement.size(target),
        )
        .await
    }

    /// Upsert the percent document. Failures are logged and dropped;
    /// the in-memory fraction stays authoritative.
    async fn persist(&self, target: &str, percent: f64, now: DateTime<Utc>) {
        let document_id = &self.config.connections.store.document_id;
        let document = PercentDocument {
            percent,
            target: target.to_string(),
            updated_at_epoch_ms: epoch_ms(now),
        };
        let result = bounded(
            "persistence",
            self.request_timeout,
            self.collaborators.store.upsert(document_id, &document),
        )
        .await;
        match result {
            Ok(()) => debug!(%document_id, percent, "percent document stored"),
            Err(e) => warn!(%document_id, error = %e, "error updating percent document"),
        }
    }

    pub fn state(&self) -> &CycleState {
        &self.state
    }

    pub fn pid(&self) -> &PidController {
        &self.pid
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Current fraction of records kept.
    pub fn current_fraction(&self) -> f64 {
        self.state.current_fraction
    }

    pub fn into_state(self) -> CycleState {
        self.state
    }
}

async fn bounded<T, F>(
    operation: &'static str,
    timeout: Duration,
    call: F,
) -> Result<T, CollaboratorError>
where
    F: Future<Output = Result<T, CollaboratorError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(CollaboratorError::Timeout { operation, timeout }),
    }
}

fn epoch_ms(now: DateTime<Utc>) -> u64 {
    now.timestamp_millis().max(0) as u64
}
