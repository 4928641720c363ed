//! ratekeeper-control — adaptive sampling control loop.
//!
//! Keeps the growth rate of a daily, date-named index near a configured
//! target by adjusting a persisted "percent kept" with a PID controller.
//!
//! # Architecture
//!
//! ```text
//! Service::start()
//!   └── CycleScheduler (one task, one cycle in flight)
//!         └── SamplingController::run_cycle()
//!               ├── TargetRotation   → current target id, counter reset
//!               ├── MeasurementSource::size()        (bounded by timeout)
//!               ├── missed-window averaging + DeltaSmoother (EMA)
//!               ├── PidController::update(error)     (anti-windup)
//!               ├── PercentageStore::upsert()        (bounded by timeout)
//!               └── MetricsSink / AuditLog
//! ```
//!
//! Measurement failures skip the correction and widen the next
//! successful window; persistence failures are logged and the
//! in-memory percent stays authoritative.

pub mod collaborator;
pub mod controller;
pub mod pid;
pub mod rotation;
pub mod scheduler;
pub mod service;
pub mod smoother;
pub mod state;

pub use collaborator::{
    AuditLog, CollaboratorError, Collaborators, MeasurementSource, MetricsSink, PercentageStore,
};
pub use controller::{CycleOutcome, SamplingController};
pub use pid::PidController;
pub use rotation::TargetRotation;
pub use scheduler::{CycleScheduler, ScheduleHandle};
pub use service::{Service, ServiceHandle};
pub use smoother::DeltaSmoother;
pub use state::CycleState;
