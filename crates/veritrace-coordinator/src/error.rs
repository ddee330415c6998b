//! # Coordination Errors
//!
//! An aborted dual write is an error; a partial commit is not. Partial
//! commits are an explicit outcome in [`crate::saga::DualWriteOutcome`]
//! because the permissioned receipt they carry is real and must reach the
//! caller.

use thiserror::Error;

use veritrace_ledger::LedgerError;

/// Errors produced by the ledger coordinator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoordinatorError {
    /// The permissioned ledger refused the operation. Nothing was written
    /// to either ledger.
    #[error("{kind} aborted by permissioned ledger: {source}")]
    Aborted {
        /// Operation kind, e.g. `create` or `transfer`.
        kind: &'static str,
        /// The refusal.
        #[source]
        source: LedgerError,
    },

    /// A history read failed on the named ledger.
    #[error("history read failed on {ledger} ledger: {source}")]
    HistoryRead {
        /// `"permissioned"` or `"public"`.
        ledger: &'static str,
        /// The underlying failure.
        #[source]
        source: LedgerError,
    },

    /// Neither ledger has any record of the product.
    #[error("no history on either ledger for {product_id}")]
    UnknownProduct {
        /// The product that was asked about.
        product_id: String,
    },

    /// A ledger reply could not be decoded.
    #[error("malformed ledger reply: {0}")]
    MalformedReply(String),
}
