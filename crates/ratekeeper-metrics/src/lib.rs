//! ratekeeper-metrics — observability for the sampling controller.
//!
//! # Architecture
//!
//! ```text
//! GaugeRegistry (MetricsSink)
//!   ├── publish_info() / set_target() / record_cycle()  ← controller
//!   └── snapshot() → GaugeSnapshot
//!
//! Prometheus exposition
//!   └── render_prometheus() → text/plain for /metrics endpoint
//!
//! CsvAuditLog (AuditLog)
//!   └── one row per corrected cycle
//! ```

pub mod audit;
pub mod prometheus;
pub mod registry;

pub use audit::CsvAuditLog;
pub use prometheus::render_prometheus;
pub use registry::{GaugeRegistry, GaugeSnapshot};
