//! Record types shared between the controller and its collaborators.

use serde::{Deserialize, Serialize};

use crate::config::BYTES_PER_MB;

/// The externally persisted sampling decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercentDocument {
    /// Percent of records to keep (0-100).
    pub percent: f64,
    /// Index the percent was computed against.
    pub target: String,
    /// Unix timestamp (milliseconds) of the write.
    pub updated_at_epoch_ms: u64,
}

/// Breakdown of a single PID update.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PidTerms {
    /// `kp * error`
    pub proportional: f64,
    /// `ki * candidate_integral`
    pub integral: f64,
    /// `kd * (error - last_error)`
    pub derivative: f64,
    pub unclamped_output: f64,
    /// Output after clamping to the controller bounds.
    pub output: f64,
    /// Whether the integral was frozen by the anti-windup rule.
    pub saturated: bool,
}

/// Everything computed during one successful measurement-and-correct cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    pub target: String,
    /// Unix timestamp (milliseconds) at which the cycle ran.
    pub epoch_ms: u64,
    /// Size of the target after this cycle's measurement.
    pub index_bytes: u64,
    /// Growth since the last successful measurement.
    pub raw_delta_bytes: i64,
    /// Windows covered by `raw_delta_bytes` (missed windows + 1).
    pub windows: u32,
    pub averaged_delta_bytes: f64,
    pub smoothed_delta_bytes: f64,
    pub target_bytes_per_window: f64,
    /// Normalized error fed to the PID controller.
    pub error: f64,
    pub terms: PidTerms,
    pub previous_fraction: f64,
    pub new_fraction: f64,
    /// Mean growth of the current target since rotation (MB/s).
    pub average_rate_mb_per_sec: f64,
}

impl CycleReport {
    /// Correction subtracted from the previous fraction.
    pub fn adjustment(&self) -> f64 {
        self.terms.output
    }

    /// New fraction expressed as a percent (0-100).
    pub fn percent(&self) -> f64 {
        self.new_fraction * 100.0
    }

    pub fn index_mb(&self) -> f64 {
        self.index_bytes as f64 / BYTES_PER_MB
    }
}
