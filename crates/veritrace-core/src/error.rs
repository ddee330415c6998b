//! # Error Types — Shared Error Taxonomy
//!
//! The foundational error variants shared across the stack. All errors use
//! `thiserror` for derive-based `Display` and `Error` implementations.
//!
//! ## Design
//!
//! - Validation errors name the offending field or value.
//! - Version conflicts carry expected vs actual so a caller can re-read
//!   and retry rather than guess.
//! - Each downstream crate defines its own error enum and wraps or maps
//!   these variants; the core never decides user-facing presentation.

use thiserror::Error;

/// Foundational errors produced by core type constructors and shared by
/// downstream crates.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Malformed input: empty identifier, bad timestamp, out-of-range score.
    #[error("validation error: {0}")]
    Validation(String),

    /// The referenced record does not exist.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Record kind, e.g. "product" or "verification request".
        kind: &'static str,
        /// The identifier that was looked up.
        id: String,
    },

    /// Optimistic-concurrency failure: the submitted expected version is
    /// stale. The write was not applied.
    #[error("version conflict: expected {expected}, current {actual}")]
    Conflict {
        /// Version the writer read before computing its patch.
        expected: u64,
        /// Version actually stored at commit time.
        actual: u64,
    },
}

impl CoreError {
    /// Shorthand for a `NotFound` error.
    pub fn not_found(kind: &'static str, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}
