//! # veritrace-verify — Verification Engine
//!
//! Rule-based verification decisions and the request workflow around them.
//!
//! ## Modules
//!
//! - **Requests** (`request.rs`): the verification-request state machine.
//!   `Pending` is the only non-terminal state; every transition appends to
//!   an append-only audit trail, and terminal requests reject further
//!   transitions.
//!
//! - **Rules** (`rules.rs`): threshold and time-window rules dispatched
//!   through a registered-evaluator map keyed by rule type. New rule types
//!   register an evaluator; the dispatcher never changes.
//!
//! - **Authenticity** (`authenticity.rs`): combines the permissioned-ledger
//!   result, the public-ledger result, and the zero-knowledge proof verdict
//!   with logical AND — always preserving each signal's detail.
//!
//! Rule decisions are pure functions of a product's attribute snapshot and
//! the supplied clock; recording the decision on the product is the
//! caller's side effect, not the engine's.

pub mod authenticity;
pub mod error;
pub mod request;
pub mod rules;

pub use authenticity::{AuthenticityReport, SignalResult};
pub use error::VerifyError;
pub use request::{AuditEntry, Decision, RequestStatus, VerificationRequest};
pub use rules::{
    ComparisonOp, RuleEngine, RuleOutcome, RuleStatus, ThresholdParams, TimeWindowParams,
    VerificationRule, Verdict, RULE_TYPE_THRESHOLD, RULE_TYPE_TIME_WINDOW,
};
