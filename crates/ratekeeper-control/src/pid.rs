//! PID controller with clamped output and conditional-integration anti-windup.
//!
//! ```text
//! derivative   = error - last_error
//! candidate    = integral + error
//! unclamped    = kp*error + ki*candidate + kd*derivative
//! output       = clamp(unclamped, min, max)
//!
//! if !(output == max && error > 0) && !(output == min && error < 0):
//!     integral = candidate
//! last_error = error
//! ```
//!
//! The integral is frozen while the output is pinned at a bound in the
//! direction the error is pushing, so it cannot wind up and overshoot
//! once the bound is released.

use ratekeeper_core::{PidConstants, PidTerms};
use tracing::debug;

/// Lower bound on a single correction to the kept fraction.
pub const ADJUSTMENT_MIN: f64 = -0.25;

/// Upper bound on a single correction to the kept fraction.
pub const ADJUSTMENT_MAX: f64 = 0.25;

/// Discrete PID controller. One `update` per measurement window.
#[derive(Debug, Clone, PartialEq)]
pub struct PidController {
    kp: f64,
    ki: f64,
    kd: f64,
    output_min: f64,
    output_max: f64,
    integral: f64,
    last_error: f64,
}

impl PidController {
    /// Create a controller with zeroed integral and last error.
    pub fn new(output_min: f64, output_max: f64, kp: f64, ki: f64, kd: f64) -> Self {
        Self {
            kp,
            ki,
            kd,
            output_min,
            output_max,
            integral: 0.0,
            last_error: 0.0,
        }
    }

    /// Controller bounded to `[ADJUSTMENT_MIN, ADJUSTMENT_MAX]` with the configured gains.
    pub fn from_constants(constants: &PidConstants) -> Self {
        Self::new(
            ADJUSTMENT_MIN,
            ADJUSTMENT_MAX,
            constants.proportional,
            constants.integral,
            constants.derivative,
        )
    }

    /// Feed one error sample and return the clamped output.
    pub fn update(&mut self, error: f64) -> f64 {
        self.step(error).output
    }

    /// Same as [`update`](Self::update), but also returns the individual terms.
    pub fn step(&mut self, error: f64) -> PidTerms {
        let derivative = error - self.last_error;
        let candidate_integral = self.integral + error;

        let proportional = self.kp * error;
        let integral = self.ki * candidate_integral;
        let derivative = self.kd * derivative;
        let unclamped_output = proportional + integral + derivative;

        let output = unclamped_output.clamp(self.output_min, self.output_max);

        let saturated_high = output == self.output_max && error > 0.0;
        let saturated_low = output == self.output_min && error < 0.0;
        let saturated = saturated_high || saturated_low;

        if !saturated {
            self.integral = candidate_integral;
        }
        self.last_error = error;

        debug!(
            error,
            proportional,
            integral,
            derivative,
            unclamped_output,
            output,
            saturated,
            accumulated = self.integral,
            "pid update"
        );

        PidTerms {
            proportional,
            integral,
            derivative,
            unclamped_output,
            output,
            saturated,
        }
    }

    /// Accumulated (unweighted) error.
    pub fn integral(&self) -> f64 {
        self.integral
    }

    pub fn last_error(&self) -> f64 {
        self.last_error
    }

    pub fn bounds(&self) -> (f64, f64) {
        (self.output_min, self.output_max)
    }
}
