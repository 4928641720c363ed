//! Interfaces to the controller's external collaborators.
//!
//! The controller only needs four effects: read the size of a target,
//! upsert the percent document, publish gauges, and append an audit row.
//! Transport details live in the adapter crates.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use ratekeeper_core::{CycleReport, PercentDocument};

/// Failure reported by a collaborator. Always recoverable per cycle.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("measurement failed: {0}")]
    Measurement(String),

    #[error("persistence failed: {0}")]
    Persistence(String),

    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },
}

/// Reports the current size of a measurement target.
#[async_trait]
pub trait MeasurementSource: Send + Sync {
    /// Size of `target_id` in bytes.
    async fn size(&self, target_id: &str) -> Result<u64, CollaboratorError>;
}

/// Durable home of the percent document.
///
/// Writes are idempotent by `document_id`.
#[async_trait]
pub trait PercentageStore: Send + Sync {
    async fn upsert(
        &self,
        document_id: &str,
        document: &PercentDocument,
    ) -> Result<(), CollaboratorError>;
}

/// Gauge sink for the control loop's internals.
pub trait MetricsSink: Send + Sync {
    /// Static description of the active configuration.
    fn publish_info(&self, labels: &[(&'static str, String)]);

    /// The target currently being measured.
    fn set_target(&self, target_id: &str);

    /// Values from a completed correction.
    fn record_cycle(&self, report: &CycleReport, retrieval_errors: u32);

    /// A window was skipped because measurement failed.
    fn record_measurement_failure(&self, consecutive_failures: u32);
}

/// Append-only per-cycle record.
pub trait AuditLog: Send + Sync {
    fn record(&self, report: &CycleReport);
}

/// Everything the controller talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub measurement: Arc<dyn MeasurementSource>,
    pub store: Arc<dyn PercentageStore>,
    pub metrics: Option<Arc<dyn MetricsSink>>,
    pub audit: Vec<Arc<dyn AuditLog>>,
}

impl Collaborators {
    pub fn new(
        measurement: Arc<dyn MeasurementSource>,
        store: Arc<dyn PercentageStore>,
    ) -> Self {
        Self {
            measurement,
            store,
            metrics: None,
            audit: Vec::new(),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditLog>) -> Self {
        self.audit.push(audit);
        self
    }
}
