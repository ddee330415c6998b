//! # veritrace-coordinator — Dual-Ledger Coordination
//!
//! Orders every state-changing operation across the two ledgers and
//! reconstructs a product's history from both.
//!
//! ## Design
//!
//! The permissioned ledger is the system of record, so it is always written
//! first. If it rejects, nothing happened and the operation aborts. If it
//! commits and the public ledger then fails, the coordinator does not roll
//! back or pretend otherwise: it returns a `PartialCommit` naming the
//! receipt that exists and the failure that prevented the mirror write.
//! Callers retry with the same operation; an idempotency key derived from
//! the product, the operation kind, and the resulting version ensures a
//! retry completes the missing leg instead of double-applying the first.
//!
//! History is never merged. [`HistoryAggregator`] returns the permissioned
//! ledger's versioned states and the public ledger's events side by side,
//! each in its ledger-native order.

pub mod error;
pub mod history;
pub mod operation;
pub mod saga;

pub use error::CoordinatorError;
pub use history::{HistoryAggregator, PermissionedRecord, ProductHistory};
pub use operation::{LedgerOperation, OperationKind};
pub use saga::{DualWriteOutcome, LedgerCoordinator};
