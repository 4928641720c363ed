//! Controller configuration parser.
//!
//! The config file is TOML. Parsing and validation are separate steps so
//! callers can report every startup problem with a descriptive message
//! before the scheduler is started.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Bytes in one megabyte, as used by `target_rate` (MB/s).
pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Default measurement window (five minutes).
pub const DEFAULT_WINDOW_MS: u64 = 300_000;

/// Upper bound for the default collaborator request timeout.
pub const MAX_DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Optional cluster label attached to exported metrics.
    #[serde(default)]
    pub cluster: Option<String>,
    /// Target growth rate of the sampled index, in MB/s.
    pub target_rate: f64,
    /// Time between recalculations of the percent kept.
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
    /// Percent kept at controller creation (1-100).
    pub initial_percent_kept: f64,
    /// Lowest value the percent can be set to (0-100).
    pub minimum_percent: f64,
    /// Bound on each measurement/persistence call. Must be shorter than the window.
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
    #[serde(default)]
    pub pid_constants: PidConstants,
    pub connections: ConnectionsConfig,
    #[serde(default)]
    pub audit: Option<AuditConfig>,
    #[serde(default)]
    pub metrics: Option<MetricsConfig>,
}

/// PID gains.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidConstants {
    /// Reaction to the current error.
    #[serde(default = "default_proportional")]
    pub proportional: f64,
    /// Correction of accumulated past error (removes steady-state error).
    #[serde(default = "default_integral")]
    pub integral: f64,
    /// Damping from the rate of change of the error.
    #[serde(default = "default_derivative")]
    pub derivative: f64,
}

impl Default for PidConstants {
    fn default() -> Self {
        Self {
            proportional: default_proportional(),
            integral: default_integral(),
            derivative: default_derivative(),
        }
    }
}

impl std::fmt::Display for PidConstants {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{},{}", self.proportional, self.integral, self.derivative)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionsConfig {
    pub sample: SampleConnection,
    pub store: StoreConnection,
}

/// Where the growing, date-rotated index lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleConnection {
    /// Base URL of the document store holding the sampled index.
    pub endpoint: String,
    /// Prefix of the daily index, e.g. `logs` for `logs-2024.06.01`.
    pub daily_index_prefix: String,
    /// Delimiter between the date fields of the daily index.
    #[serde(default = "default_date_delimiter")]
    pub date_delimiter: String,
}

/// Where the percent document is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConnection {
    /// Base URL of the remote document store. `None` selects the embedded store.
    #[serde(default)]
    pub endpoint: Option<String>,
    pub index: String,
    pub document_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Socket address for the `/metrics` endpoint, e.g. `0.0.0.0:9464`.
    pub listen: String,
}

fn default_window_ms() -> u64 {
    DEFAULT_WINDOW_MS
}

fn default_proportional() -> f64 {
    0.1
}

fn default_integral() -> f64 {
    0.01
}

fn default_derivative() -> f64 {
    0.1
}

fn default_date_delimiter() -> String {
    ".".to_string()
}

impl ControllerConfig {
    /// Read, parse and validate a config file.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a config document.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: ControllerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check every bound the control loop relies on.
    pub fn validate(&self) -> ConfigResult<()> {
        if !self.target_rate.is_finite() || self.target_rate <= 0.0 {
            return Err(invalid("target_rate", "must be a positive number"));
        }
        if self.window_ms == 0 {
            return Err(invalid("window_ms", "must be a positive number"));
        }
        if !self.minimum_percent.is_finite() || !(0.0..=100.0).contains(&self.minimum_percent) {
            return Err(invalid(
                "minimum_percent",
                "must be a number between 0 and 100 (inclusive)",
            ));
        }
        if !self.initial_percent_kept.is_finite()
            || !(1.0..=100.0).contains(&self.initial_percent_kept)
        {
            return Err(invalid(
                "initial_percent_kept",
                "must be a number between 1 and 100 (inclusive)",
            ));
        }
        if self.initial_percent_kept < self.minimum_percent {
            return Err(invalid(
                "initial_percent_kept",
                "must be greater than or equal to minimum_percent",
            ));
        }

        let gains = [
            ("pid_constants.proportional", self.pid_constants.proportional),
            ("pid_constants.integral", self.pid_constants.integral),
            ("pid_constants.derivative", self.pid_constants.derivative),
        ];
        for (field, value) in gains {
            if !value.is_finite() {
                return Err(invalid(field, "must be a finite number"));
            }
        }

        let sample = &self.connections.sample;
        if sample.endpoint.trim().is_empty() {
            return Err(invalid("connections.sample.endpoint", "is required"));
        }
        if sample.daily_index_prefix.trim().is_empty() {
            return Err(invalid("connections.sample.daily_index_prefix", "is required"));
        }
        let store = &self.connections.store;
        if store.index.trim().is_empty() {
            return Err(invalid("connections.store.index", "is required"));
        }
        if store.document_id.trim().is_empty() {
            return Err(invalid("connections.store.document_id", "is required"));
        }
        if let Some(endpoint) = &store.endpoint
            && endpoint.trim().is_empty()
        {
            return Err(invalid("connections.store.endpoint", "must not be empty when set"));
        }

        if let Some(timeout) = self.request_timeout_ms
            && (timeout == 0 || timeout >= self.window_ms)
        {
            return Err(invalid(
                "request_timeout_ms",
                "must be positive and shorter than window_ms",
            ));
        }

        // Guards the division in the error term.
        let per_window = self.target_bytes_per_window();
        if !per_window.is_finite() || per_window <= 0.0 {
            return Err(invalid(
                "target_rate",
                "target bytes per window must be a positive, finite number",
            ));
        }

        Ok(())
    }

    pub fn target_rate_bytes_per_sec(&self) -> f64 {
        self.target_rate * BYTES_PER_MB
    }

    /// Desired index growth for one window, in bytes.
    pub fn target_bytes_per_window(&self) -> f64 {
        self.target_rate_bytes_per_sec() * (self.window_ms as f64 / 1000.0)
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// Timeout applied to each collaborator call.
    ///
    /// Defaults to half the window, capped at 30 seconds.
    pub fn request_timeout(&self) -> Duration {
        let ms = self
            .request_timeout_ms
            .unwrap_or_else(|| (self.window_ms / 2).clamp(1, MAX_DEFAULT_REQUEST_TIMEOUT_MS));
        Duration::from_millis(ms)
    }

    pub fn minimum_fraction(&self) -> f64 {
        self.minimum_percent / 100.0
    }

    pub fn initial_fraction(&self) -> f64 {
        self.initial_percent_kept / 100.0
    }

    /// Label set describing the active configuration, for the info gauge.
    pub fn info_labels(&self) -> Vec<(&'static str, String)> {
        vec![
            ("target_rate", self.target_rate.to_string()),
            ("window_ms", self.window_ms.to_string()),
            (
                "target_bytes_per_window",
                self.target_bytes_per_window().to_string(),
            ),
            ("pid_constants", self.pid_constants.to_string()),
            (
                "daily_index_prefix",
                self.connections.sample.daily_index_prefix.clone(),
            ),
            (
                "date_delimiter",
                self.connections.sample.date_delimiter.clone(),
            ),
        ]
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}
