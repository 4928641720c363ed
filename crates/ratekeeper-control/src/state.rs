//! Cross-cycle state owned by the sampling controller.

use crate::smoother::DeltaSmoother;

/// Mutable state carried from one measurement window to the next.
///
/// Only the orchestrator mutates this, and only inside a cycle. Nothing
/// here is persisted; after a restart the loop starts again from the
/// configured initial percent.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleState {
    /// Target the last cycle measured.
    pub previous_target_id: String,
    /// Size of the target at the last successful measurement.
    pub previous_measured_bytes: u64,
    /// Cycles run against the current target.
    pub cycles_since_rotation: u32,
    /// Failed measurements since the last correction.
    pub consecutive_measurement_failures: u32,
    /// EMA of the per-window delta.
    pub smoother: DeltaSmoother,
    /// Fraction of records kept, in `[minimum, 1.0]`.
    pub current_fraction: f64,
}

impl CycleState {
    pub fn new(initial_fraction: f64) -> Self {
        Self {
            previous_target_id: String::new(),
            previous_measured_bytes: 0,
            cycles_since_rotation: 0,
            consecutive_measurement_failures: 0,
            smoother: DeltaSmoother::default(),
            current_fraction: initial_fraction,
        }
    }

    /// Switch to a new target. A delta against the old target's size is
    /// meaningless, so the byte baseline and cycle count start over.
    pub fn reset_for_rotation(&mut self, target_id: String) {
        self.previous_target_id = target_id;
        self.previous_measured_bytes = 0;
        self.cycles_since_rotation = 0;
    }

    /// Windows covered by the next successful measurement.
    pub fn windows(&self) -> u32 {
        self.consecutive_measurement_failures + 1
    }

    pub fn smoothed_delta_bytes(&self) -> Option<f64> {
        self.smoother.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_starts_from_initial_fraction() {
        let state = CycleState::new(0.5);
        assert_eq!(state.current_fraction, 0.5);
        assert_eq!(state.previous_measured_bytes, 0);
        assert_eq!(state.windows(), 1);
        assert_eq!(state.smoothed_delta_bytes(), None);
    }

    #[test]
    fn rotation_resets_baseline_and_cycle_count() {
        let mut state = CycleState::new(0.5);
        state.previous_target_id = "logs-2024.06.01".to_string();
        state.previous_measured_bytes = 9_000_000;
        state.cycles_since_rotation = 288;
        state.consecutive_measurement_failures = 2;
        state.smoother.apply(1000.0);

        state.reset_for_rotation("logs-2024.06.02".to_string());

        assert_eq!(state.previous_target_id, "logs-2024.06.02");
        assert_eq!(state.previous_measured_bytes, 0);
        assert_eq!(state.cycles_since_rotation, 0);
        // Failure accounting and smoothing carry across the rotation.
        assert_eq!(state.consecutive_measurement_failures, 2);
        assert_eq!(state.smoothed_delta_bytes(), Some(1000.0));
    }

    #[test]
    fn windows_counts_missed_cycles() {
        let mut state = CycleState::new(1.0);
        state.consecutive_measurement_failures = 2;
        assert_eq!(state.windows(), 3);
    }
}
