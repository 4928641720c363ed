//! Error types for the embedded store.

use thiserror::Error;

pub type StateResult<T> = Result<T, StateError>;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to open state database: {0}")]
    Open(String),

    /// Any redb transaction, table, read or write failure.
    #[error("state storage error: {0}")]
    Storage(String),

    #[error("failed to encode {record}: {reason}")]
    Encode { record: &'static str, reason: String },

    /// A stored value no longer parses as the record it was written as.
    #[error("corrupt {record} record at {key:?}: {reason}")]
    Corrupt {
        record: &'static str,
        key: String,
        reason: String,
    },
}
