//! # Authenticity Aggregation
//!
//! Combines three independent signals into one authenticity verdict:
//! the permissioned ledger's check, the public ledger's check, and the
//! zero-knowledge attestation.
//!
//! ## Invariant
//!
//! The verdict is the logical AND of all three signals, and every signal's
//! detail survives aggregation unchanged. A consumer of the report can
//! always see which ledger disagreed and why.

use serde::{Deserialize, Serialize};

/// One ledger's authenticity answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalResult {
    /// Whether this signal considers the product authentic.
    pub authentic: bool,
    /// The ledger's own explanation, passed through verbatim.
    pub detail: serde_json::Value,
}

impl SignalResult {
    /// Build from a ledger reply of the form
    /// `{"isAuthentic": bool, "detail": ...}`. Absent or non-boolean
    /// `isAuthentic` counts as not authentic.
    pub fn from_ledger_reply(reply: &serde_json::Value) -> Self {
        Self {
            authentic: reply
                .get("isAuthentic")
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(false),
            detail: reply
                .get("detail")
                .cloned()
                .unwrap_or(serde_json::Value::Null),
        }
    }
}

/// The full cross-ledger authenticity picture for one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticityReport {
    /// The permissioned ledger's signal.
    pub permissioned: SignalResult,
    /// The public ledger's signal.
    pub public_ledger: SignalResult,
    /// Whether the zero-knowledge attestation verified.
    pub zk_proof_valid: bool,
    /// AND of all three signals.
    pub authentic: bool,
}

impl AuthenticityReport {
    /// Aggregate the three signals. The verdict is true only when every
    /// signal agrees; the per-signal details are carried regardless.
    pub fn aggregate(
        permissioned: SignalResult,
        public_ledger: SignalResult,
        zk_proof_valid: bool,
    ) -> Self {
        let authentic = permissioned.authentic && public_ledger.authentic && zk_proof_valid;
        Self {
            permissioned,
            public_ledger,
            zk_proof_valid,
            authentic,
        }
    }
}
