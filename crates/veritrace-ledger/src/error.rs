//! # Ledger Errors
//!
//! One taxonomy for both ledgers. The coordinator's dual-write protocol
//! branches on these variants, so they encode retryability explicitly
//! instead of leaving callers to parse messages.

use thiserror::Error;

/// Errors surfaced by ledger interactions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Transient failure: connection refused, gateway down. Safe to retry
    /// with an idempotency key.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    /// Deterministic business-rule rejection from the ledger (missing key,
    /// endorsement failure, contract revert). Not retryable.
    #[error("ledger rejected: {0}")]
    Rejected(String),

    /// The call did not complete within the configured deadline. Distinct
    /// from rejection: the transaction may or may not have been applied.
    #[error("ledger call timed out after {elapsed_secs}s: {operation}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// Seconds waited before giving up.
        elapsed_secs: u64,
    },

    /// A ledger payload could not be encoded or decoded.
    #[error("ledger serialization error: {0}")]
    Serialization(String),
}

impl LedgerError {
    /// Whether a retry with the same idempotency key is safe.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout { .. })
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
