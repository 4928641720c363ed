//! ratekeeper-core — shared configuration and record types.
//!
//! The controller config is parsed from TOML and validated once at
//! startup; every bound the control loop depends on (positive rate and
//! window, ordered percent limits, a non-zero target per window) is
//! rejected here rather than discovered mid-cycle.

pub mod config;
pub mod error;
pub mod types;

pub use config::{ControllerConfig, PidConstants, BYTES_PER_MB};
pub use error::{ConfigError, ConfigResult};
pub use types::*;
