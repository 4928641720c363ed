//! Daily target naming and rotation detection.
//!
//! The sampled index rotates once per UTC day. Its name is built as
//! `{prefix}-{YYYY}{delim}{MM}{delim}{DD}`, e.g. `logs-2024.06.01`.

use chrono::{DateTime, Datelike, Utc};

/// Builds the identifier of the currently active measurement target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetRotation {
    prefix: String,
    delimiter: String,
}

impl TargetRotation {
    pub fn new(prefix: impl Into<String>, delimiter: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            delimiter: delimiter.into(),
        }
    }

    /// Identifier of the target active at `now`.
    pub fn current_target_id(&self, now: DateTime<Utc>) -> String {
        let del = &self.delimiter;
        format!(
            "{}-{:04}{del}{:02}{del}{:02}",
            self.prefix,
            now.year(),
            now.month(),
            now.day()
        )
    }

    /// Whether the active target at `now` differs from `previous_id`.
    pub fn has_rotated(&self, previous_id: &str, now: DateTime<Utc>) -> bool {
        self.current_target_id(now) != previous_id
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }
}
