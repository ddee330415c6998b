//! # Service Errors
//!
//! The outward-facing error taxonomy. Each layer keeps its own error type;
//! this enum only wraps them plus the few failures that originate in the
//! service itself.

use thiserror::Error;

use veritrace_core::CoreError;
use veritrace_coordinator::CoordinatorError;
use veritrace_ledger::LedgerError;
use veritrace_store::StoreError;
use veritrace_verify::VerifyError;
use veritrace_zkp::VerifyError as AttestationError;

/// Errors surfaced by the provenance service.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Input validation failure from the core types.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Off-chain store failure, including version conflicts.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Direct ledger read failure.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Dual-write or history-aggregation failure.
    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),

    /// Verification rule or state-machine failure.
    #[error(transparent)]
    Verification(#[from] VerifyError),

    /// The attestation proof or its signals were malformed.
    #[error(transparent)]
    Attestation(#[from] AttestationError),

    /// No verification request with this id.
    #[error("verification request not found: {id}")]
    UnknownRequest {
        /// The missing request id.
        id: String,
    },

    /// No rule with this id.
    #[error("rule not found: {id}")]
    UnknownRule {
        /// The missing rule id.
        id: String,
    },

    /// A ledger reply could not be decoded.
    #[error("malformed ledger reply: {0}")]
    MalformedReply(String),

    /// Retry requested for a product whose ledger state is already in
    /// sync.
    #[error("no pending ledger sync for product: {id}")]
    NoPendingSync {
        /// The product that needs no reconciliation.
        id: String,
    },
}
