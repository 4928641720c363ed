//! ratekeeper-probe — HTTP adapters for the sampling controller.
//!
//! - [`IndexSizeSource`] reads the on-disk size of a daily index from the
//!   `_cat/indices` API.
//! - [`DocumentStore`] upserts the percent document through the
//!   `_update` API.
//!
//! Both speak plain HTTP/1.1 over a fresh connection per request, and
//! every request is bounded by the configured timeout.

pub mod client;
pub mod document;
pub mod error;
pub mod index_size;

#[cfg(test)]
pub(crate) mod fake_server;

pub use client::{Endpoint, HttpClient};
pub use document::DocumentStore;
pub use error::{ProbeError, ProbeResult};
pub use index_size::IndexSizeSource;
