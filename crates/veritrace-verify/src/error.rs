//! # Verification Errors
//!
//! Rule and state-machine failures. Malformed rules and unknown attributes
//! are validation errors, never panics — a bad rule must not take down the
//! verification path.

use thiserror::Error;

/// Errors produced by the verification engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    /// The request is already in a terminal state.
    #[error("invalid state transition: {from} -> {to} (request is terminal)")]
    InvalidTransition {
        /// Current (terminal) status.
        from: String,
        /// Attempted target status.
        to: String,
    },

    /// The rule references an attribute the product snapshot does not have.
    #[error("unknown attribute: {attribute}")]
    UnknownAttribute {
        /// The attribute named by the rule.
        attribute: String,
    },

    /// The attribute exists but has the wrong type for this rule.
    #[error("attribute {attribute} is not {expected}")]
    InvalidAttributeType {
        /// The attribute named by the rule.
        attribute: String,
        /// What the rule needed, e.g. "a number" or "an ISO8601 date".
        expected: &'static str,
    },

    /// No evaluator is registered for this rule type.
    #[error("unsupported rule type: {rule_type}")]
    UnknownRuleType {
        /// The unrecognized type tag.
        rule_type: String,
    },

    /// The rule has been retired and can no longer be applied.
    #[error("rule {rule_id} is retired")]
    RetiredRule {
        /// The retired rule.
        rule_id: String,
    },

    /// Rule parameters failed to deserialize for their declared type.
    #[error("invalid rule parameters: {0}")]
    InvalidParameters(String),
}
