//! # Store Errors
//!
//! Errors surfaced by provenance store operations. Store errors abort an
//! operation before any ledger call is made.

use thiserror::Error;

use veritrace_core::CoreError;

/// Errors produced by the provenance store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The product does not exist.
    #[error("product not found: {id}")]
    NotFound {
        /// The product identifier that was looked up.
        id: String,
    },

    /// A product with this batch number already exists. Batch numbers are
    /// globally unique.
    #[error("duplicate batch number: {batch}")]
    DuplicateBatch {
        /// The conflicting batch number.
        batch: String,
    },

    /// Malformed input (out-of-range score, empty field).
    #[error("validation error: {0}")]
    Validation(String),

    /// A tracking entry dated before the latest recorded entry. The
    /// history is chronologically ordered; late-arriving events are
    /// rejected rather than spliced in.
    #[error("tracking entry out of order: {attempted} precedes latest entry {last}")]
    OutOfOrder {
        /// Timestamp of the latest recorded entry.
        last: String,
        /// Timestamp of the rejected entry.
        attempted: String,
    },

    /// Optimistic-concurrency failure: another writer committed first.
    /// The write was not applied; re-read and retry.
    #[error("version conflict: expected {expected}, current {actual}")]
    Conflict {
        /// Version the writer submitted.
        expected: u64,
        /// Version currently stored.
        actual: u64,
    },
}

impl From<CoreError> for StoreError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Validation(msg) => Self::Validation(msg),
            CoreError::NotFound { id, .. } => Self::NotFound { id },
            CoreError::Conflict { expected, actual } => Self::Conflict { expected, actual },
        }
    }
}
