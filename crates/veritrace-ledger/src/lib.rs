//! # veritrace-ledger — Ledger Interfaces and Reference Implementations
//!
//! Abstracts the two heterogeneous ledgers the stack writes to:
//!
//! - **Permissioned ledger** (`PermissionedLedger`): enrolled-identity
//!   connections acquired and released per call, ordered state-changing
//!   `submit`, free read-only `evaluate`, and full per-key version history.
//!
//! - **Public ledger** (`PublicLedger`): signed state-changing `invoke`
//!   returning a receipt plus emitted events, and free read-only `call`.
//!
//! ## Handler model
//!
//! Permissioned-ledger business logic is written as plain handler functions
//! over a narrow [`state::LedgerState`] capability (`get`/`put`/
//! `history_of`/`query`) rather than contract classes. The in-memory
//! ledger dispatches submitted function names to these handlers; a real
//! ledger binding would install the same handlers behind its runtime.
//!
//! ## Errors
//!
//! `LedgerError` distinguishes transient unavailability (retryable with an
//! idempotency key), deterministic rejection (not retryable), and timeouts.
//! The dual-write coordinator depends on this distinction.

pub mod error;
pub mod handlers;
pub mod memory;
pub mod state;
pub mod traits;

pub use error::LedgerError;
pub use memory::{InMemoryPermissionedLedger, InMemoryPublicLedger};
pub use state::{LedgerState, MemoryState, VersionedValue};
pub use traits::{
    InvokeOutcome, LedgerEvent, PermissionedLedger, PermissionedSession, PublicLedger, TxReceipt,
    DEFAULT_LEDGER_TIMEOUT,
};
