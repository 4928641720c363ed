//! Exponential moving average over the per-window byte delta.

/// Default weight of the newest sample.
pub const DEFAULT_ALPHA: f64 = 0.2;

/// EMA filter that suppresses single-window measurement noise.
///
/// Smoothed values are rounded to whole bytes (half-up).
#[derive(Debug, Clone, PartialEq)]
pub struct DeltaSmoother {
    alpha: f64,
    smoothed: Option<f64>,
}

impl Default for DeltaSmoother {
    fn default() -> Self {
        Self::new(DEFAULT_ALPHA)
    }
}

impl DeltaSmoother {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            smoothed: None,
        }
    }

    /// Fold a new delta into the average and return the smoothed value.
    ///
    /// The first sample is returned unchanged.
    pub fn apply(&mut self, new_delta: f64) -> f64 {
        let next = match self.smoothed {
            None => new_delta,
            Some(prev) => round_half_up(self.alpha * new_delta + (1.0 - self.alpha) * prev),
        };
        self.smoothed = Some(next);
        next
    }

    pub fn current(&self) -> Option<f64> {
        self.smoothed
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}

fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}
