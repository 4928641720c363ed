//! Latest value of every control-loop gauge.

use std::sync::{Arc, RwLock};

use tracing::debug;

use ratekeeper_control::MetricsSink;
use ratekeeper_core::CycleReport;

/// Point-in-time copy of all gauges.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GaugeSnapshot {
    /// Cluster label applied to every series.
    pub cluster: Option<String>,
    /// Static description of the active configuration.
    pub info: Vec<(String, String)>,
    /// Index currently being measured.
    pub sample_index: Option<String>,
    pub proportional: f64,
    pub integral: f64,
    pub derivative: f64,
    pub unclamped_output: f64,
    pub index_size_mb: f64,
    /// Raw growth of the index over the last corrected window(s).
    pub bytes_per_window: f64,
    pub retrieval_error_count: u32,
    /// Percent of records kept (0-100).
    pub percent: f64,
    /// Mean index growth since rotation (MB/s).
    pub average_rate: f64,
    /// EMA of the per-window delta.
    pub delta_bytes: f64,
    pub pid_adjustment: f64,
    pub cycles_total: u64,
    pub measurement_failures_total: u64,
}

/// Cloneable, thread-safe gauge store implementing [`MetricsSink`].
#[derive(Clone, Default)]
pub struct GaugeRegistry {
    inner: Arc<RwLock<GaugeSnapshot>>,
}

impl GaugeRegistry {
    pub fn new(cluster: Option<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(GaugeSnapshot {
                cluster,
                ..GaugeSnapshot::default()
            })),
        }
    }

    /// Copy of the current gauge values.
    pub fn snapshot(&self) -> GaugeSnapshot {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn update(&self, f: impl FnOnce(&mut GaugeSnapshot)) {
        let mut gauges = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut gauges);
    }
}

impl MetricsSink for GaugeRegistry {
    fn publish_info(&self, labels: &[(&'static str, String)]) {
        self.update(|g| {
            g.info = labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect();
        });
    }

    fn set_target(&self, target_id: &str) {
        self.update(|g| g.sample_index = Some(target_id.to_string()));
    }

    fn record_cycle(&self, report: &CycleReport, retrieval_errors: u32) {
        self.update(|g| {
            g.proportional = report.terms.proportional;
            g.integral = report.terms.integral;
            g.derivative = report.terms.derivative;
            g.unclamped_output = report.terms.unclamped_output;
            g.index_size_mb = report.index_mb();
            g.bytes_per_window = report.raw_delta_bytes as f64;
            g.retrieval_error_count = retrieval_errors;
            g.percent = report.percent();
            g.average_rate = report.average_rate_mb_per_sec;
            g.delta_bytes = report.smoothed_delta_bytes;
            g.pid_adjustment = report.adjustment();
            g.cycles_total += 1;
        });
        debug!(percent = report.percent(), "gauges updated");
    }

    fn record_measurement_failure(&self, consecutive_failures: u32) {
        self.update(|g| {
            g.retrieval_error_count = consecutive_failures;
            g.measurement_failures_total += 1;
        });
    }
}
