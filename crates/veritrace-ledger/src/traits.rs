//! # Ledger Traits
//!
//! The two ledger interfaces the coordinator writes through, plus the
//! receipt and event types they return. Implementations must be
//! `Send + Sync`; calls are blocking I/O with explicit timeouts.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::state::VersionedValue;

/// Default deadline for a single ledger round-trip.
pub const DEFAULT_LEDGER_TIMEOUT: Duration = Duration::from_secs(5);

/// Opaque receipt for an ordered, endorsed transaction on the permissioned
/// ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    /// Ledger-assigned transaction identifier.
    pub tx_id: String,
}

/// An event emitted by a public-ledger contract call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEvent {
    /// Event name, e.g. `ProductCreated`.
    pub name: String,
    /// Event payload as emitted by the contract.
    pub payload: serde_json::Value,
}

/// Result of a signed, state-changing public-ledger call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokeOutcome {
    /// Transaction hash or equivalent receipt reference.
    pub tx_ref: String,
    /// Events emitted during the call, in emission order.
    pub events: Vec<LedgerEvent>,
    /// The call's return value.
    pub return_value: serde_json::Value,
}

impl InvokeOutcome {
    /// The payload of the first event with the given name, if emitted.
    pub fn event(&self, name: &str) -> Option<&serde_json::Value> {
        self.events
            .iter()
            .find(|e| e.name == name)
            .map(|e| &e.payload)
    }
}

/// A scoped connection to the permissioned ledger, acquired per call and
/// released on drop. No long-lived cross-request sessions.
pub trait PermissionedSession {
    /// Submit an ordered, endorsed, state-changing transaction.
    fn submit(&mut self, function: &str, args: &[String]) -> Result<TxReceipt, LedgerError>;

    /// Evaluate a read-only query. Free; does not go through ordering.
    fn evaluate(&self, function: &str, args: &[String]) -> Result<Vec<u8>, LedgerError>;

    /// Every historical state ever written for `key`, in ledger-native
    /// chronological order.
    fn history(&self, key: &str) -> Result<Vec<VersionedValue>, LedgerError>;
}

/// The permissioned transactional ledger.
pub trait PermissionedLedger: Send + Sync {
    /// Connect with an enrolled identity. The session is a scoped resource;
    /// callers acquire one per operation and drop it when done.
    fn connect(&self, identity: &str) -> Result<Box<dyn PermissionedSession + '_>, LedgerError>;
}

/// The public contract-bearing ledger.
pub trait PublicLedger: Send + Sync {
    /// Invoke a signed, state-changing contract method.
    fn invoke(
        &self,
        method: &str,
        args: &[serde_json::Value],
    ) -> Result<InvokeOutcome, LedgerError>;

    /// Free read-only contract call.
    fn call(&self, method: &str, args: &[serde_json::Value])
        -> Result<serde_json::Value, LedgerError>;
}
