//! # Verification Request State Machine
//!
//! A verification request starts `Pending` and moves exactly once to
//! `Verified`, `Failed`, or `Rejected`. Every status change appends an
//! audit entry; entries are never overwritten or removed. A request in a
//! terminal state rejects further transitions.
//!
//! ```text
//! Pending ──▶ Verified (terminal)
//!    │
//!    ├──────▶ Failed   (terminal)
//!    │
//!    └──────▶ Rejected (terminal)
//! ```

use serde::{Deserialize, Serialize};

use veritrace_core::{ActorId, ProductId, Timestamp, VerificationId};

use crate::error::VerifyError;

/// Status of a verification request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    /// Awaiting a verifier decision (the only non-terminal state).
    Pending,
    /// Verified by a verifier (terminal).
    Verified,
    /// Verification failed (terminal).
    Failed,
    /// Rejected by a verifier without evaluation (terminal).
    Rejected,
}

impl RequestStatus {
    /// Whether no further transitions are allowed from this status.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Verified => "VERIFIED",
            Self::Failed => "FAILED",
            Self::Rejected => "REJECTED",
        };
        f.write_str(s)
    }
}

/// A verifier's decision on a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    /// The product checks out.
    Verified,
    /// The product failed verification.
    Failed,
    /// The request is declined without a verdict on the product.
    Rejected,
}

impl Decision {
    /// The request status this decision resolves to.
    pub fn as_status(&self) -> RequestStatus {
        match self {
            Self::Verified => RequestStatus::Verified,
            Self::Failed => RequestStatus::Failed,
            Self::Rejected => RequestStatus::Rejected,
        }
    }
}

/// One entry in a request's append-only audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Status after this entry.
    pub status: RequestStatus,
    /// When the entry was recorded.
    pub timestamp: Timestamp,
    /// Who caused the change (requester at creation, verifier after).
    pub updated_by: ActorId,
    /// Free-form verifier comments.
    pub comments: Option<String>,
}

/// A verification request with its full audit history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationRequest {
    /// Unique request identifier.
    pub id: VerificationId,
    /// The product under verification.
    pub product_id: ProductId,
    /// Who asked for verification.
    pub requester: ActorId,
    /// Request kind, e.g. "authenticity" or "certification".
    pub request_type: String,
    /// Current status.
    pub status: RequestStatus,
    /// Append-only audit trail; first entry is the creation.
    pub history: Vec<AuditEntry>,
    /// When the request was created.
    pub created_at: Timestamp,
}

impl VerificationRequest {
    /// Create a pending request with its initial audit entry.
    pub fn new(product_id: ProductId, requester: ActorId, request_type: impl Into<String>) -> Self {
        let now = Timestamp::now();
        Self {
            id: VerificationId::new(),
            product_id,
            requester: requester.clone(),
            request_type: request_type.into(),
            status: RequestStatus::Pending,
            history: vec![AuditEntry {
                status: RequestStatus::Pending,
                timestamp: now,
                updated_by: requester,
                comments: None,
            }],
            created_at: now,
        }
    }

    /// Apply a verifier decision: the only transition.
    ///
    /// Appends an audit entry and moves to the decision's terminal status.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` if the request is already terminal; the request
    /// and its history are left untouched.
    pub fn process(
        &mut self,
        verifier: ActorId,
        decision: Decision,
        comments: Option<String>,
    ) -> Result<AuditEntry, VerifyError> {
        if self.status.is_terminal() {
            return Err(VerifyError::InvalidTransition {
                from: self.status.to_string(),
                to: decision.as_status().to_string(),
            });
        }

        let status = decision.as_status();
        let entry = AuditEntry {
            status,
            timestamp: Timestamp::now(),
            updated_by: verifier,
            comments,
        };
        self.history.push(entry.clone());
        self.status = status;
        Ok(entry)
    }
}
