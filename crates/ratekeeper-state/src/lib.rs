//! ratekeeper-state — embedded store for the sampling controller.
//!
//! Backed by [redb](https://docs.rs/redb). Holds the latest percent
//! document per id and a per-target history of completed cycles. The
//! `StateStore` implements both `PercentageStore` and `AuditLog`, so the
//! controller can run without a remote document store.
//!
//! The store is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`).

pub mod error;
pub mod store;
pub mod tables;

pub use error::{StateError, StateResult};
pub use store::StateStore;
