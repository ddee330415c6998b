//! # Product Data Model
//!
//! The off-chain record of a tracked product: identity, current custody,
//! certifications, ethical scores, and the append-only tracking history.
//!
//! ## Invariants
//!
//! - `overall_ethical_score` is the arithmetic mean of the individual
//!   scores, `0.0` for an empty list, recomputed on every addition.
//! - `tracking_history` is append-only and chronologically ordered; the
//!   first entry is always the manufacturer at creation time.
//! - `version` increases by exactly one on every successful mutation.
//!
//! Certification status is recomputed lazily at verification time via
//! [`Certification::effective_status`], not on a timer.

use serde::{Deserialize, Serialize};

use veritrace_core::{ActorId, BatchNumber, CoreError, ProductId, RuleId, Timestamp};

// ─── Certification ───────────────────────────────────────────────────

/// Lifecycle status of a certification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CertificationStatus {
    /// Within its validity window.
    Active,
    /// Past its expiration date.
    Expired,
    /// Withdrawn by the certifying body. Never recomputed back to Active.
    Revoked,
}

impl std::fmt::Display for CertificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Active => "ACTIVE",
            Self::Expired => "EXPIRED",
            Self::Revoked => "REVOKED",
        };
        f.write_str(s)
    }
}

/// A certification issued for a product by an external body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Certification {
    /// The certifying body, e.g. "Fair Trade International".
    pub body: String,
    /// When the certification was issued.
    pub certification_date: Timestamp,
    /// When the certification expires.
    pub expiration_date: Timestamp,
    /// Opaque structured payload supplied by the certifying body.
    pub details: serde_json::Value,
    /// Stored status. Read through [`Certification::effective_status`],
    /// which accounts for expiry lazily.
    pub status: CertificationStatus,
}

impl Certification {
    /// Create an Active certification.
    ///
    /// # Errors
    ///
    /// Rejects an empty certifying body and an expiration date that is not
    /// after the certification date.
    pub fn new(
        body: impl Into<String>,
        certification_date: Timestamp,
        expiration_date: Timestamp,
        details: serde_json::Value,
    ) -> Result<Self, CoreError> {
        let body = body.into();
        if body.trim().is_empty() {
            return Err(CoreError::Validation(
                "certification body must not be empty".to_string(),
            ));
        }
        if expiration_date <= certification_date {
            return Err(CoreError::Validation(format!(
                "expiration {expiration_date} must be after certification date {certification_date}"
            )));
        }
        Ok(Self {
            body,
            certification_date,
            expiration_date,
            details,
            status: CertificationStatus::Active,
        })
    }

    /// The status as of `now`.
    ///
    /// Expired if and only if `now` is strictly past the expiration date.
    /// A revoked certification stays revoked regardless of dates.
    pub fn effective_status(&self, now: Timestamp) -> CertificationStatus {
        match self.status {
            CertificationStatus::Revoked => CertificationStatus::Revoked,
            _ if now > self.expiration_date => CertificationStatus::Expired,
            other => other,
        }
    }
}

// ─── Ethical Score ───────────────────────────────────────────────────

/// A single ethical assessment in one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EthicalScore {
    /// Assessment category, e.g. "labor" or "environment".
    pub category: String,
    /// Score in `[0, 100]`.
    pub score: f64,
    /// When the assessment was made.
    pub assessment_date: Timestamp,
    /// The external user entity that performed the assessment.
    pub assessor: ActorId,
}

impl EthicalScore {
    /// Create a score, validating the `[0, 100]` range.
    pub fn new(
        category: impl Into<String>,
        score: f64,
        assessment_date: Timestamp,
        assessor: ActorId,
    ) -> Result<Self, CoreError> {
        let category = category.into();
        if category.trim().is_empty() {
            return Err(CoreError::Validation(
                "score category must not be empty".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&score) {
            return Err(CoreError::Validation(format!(
                "ethical score must be in [0, 100], got {score}"
            )));
        }
        Ok(Self {
            category,
            score,
            assessment_date,
            assessor,
        })
    }
}

// ─── Tracking ────────────────────────────────────────────────────────

/// One entry in a product's custody trail. Entries are never mutated or
/// removed once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingEntry {
    /// The custodian at this point in time.
    pub owner: ActorId,
    /// Physical location.
    pub location: String,
    /// When custody was recorded.
    pub timestamp: Timestamp,
}

// ─── Ledger References ───────────────────────────────────────────────

/// Cross-references into the two ledgers, filled in as ledger writes
/// succeed. Absent references mean the corresponding ledger write has not
/// (yet) committed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRefs {
    /// Receipt reference from the permissioned ledger's create transaction.
    pub permissioned_tx_ref: Option<String>,
    /// Identifier generated by the public ledger contract on creation.
    pub public_ledger_id: Option<String>,
}

// ─── Verification Cache ──────────────────────────────────────────────

/// Outcome of the most recent verification decision, cached on the product
/// for audit queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VerificationStatus {
    /// The product passed verification.
    Verified,
    /// The product failed verification.
    Failed,
    /// The verification request was rejected by the verifier.
    Rejected,
}

impl std::fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Verified => "VERIFIED",
            Self::Failed => "FAILED",
            Self::Rejected => "REJECTED",
        };
        f.write_str(s)
    }
}

// ─── Product ─────────────────────────────────────────────────────────

/// Input for product creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    /// Product name.
    pub name: String,
    /// Manufacturer display name.
    pub manufacturer: String,
    /// The manufacturer as custody actor; owns the first tracking entry.
    pub owner: ActorId,
    /// When the product was manufactured.
    pub manufacturing_date: Timestamp,
    /// Globally unique batch number.
    pub batch_number: BatchNumber,
    /// Initial location, typically the manufacturing plant.
    pub location: String,
}

/// Partial update applied through the optimistic-concurrency path.
///
/// Ownership changes go through transfer, not patching; score and
/// certification additions go through their append operations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductPatch {
    /// New product name, if changing.
    pub name: Option<String>,
    /// New location, if changing.
    pub location: Option<String>,
}

/// The authoritative off-chain record of one product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Unique product identifier.
    pub id: ProductId,
    /// Product name.
    pub name: String,
    /// Manufacturer display name.
    pub manufacturer: String,
    /// When the product was manufactured.
    pub manufacturing_date: Timestamp,
    /// Globally unique batch number.
    pub batch_number: BatchNumber,
    /// Current custodian.
    pub current_owner: ActorId,
    /// Current physical location.
    pub location: String,
    /// Certifications issued for this product.
    pub certifications: Vec<Certification>,
    /// Individual ethical assessments.
    pub ethical_scores: Vec<EthicalScore>,
    /// Arithmetic mean of `ethical_scores`; `0.0` when empty.
    pub overall_ethical_score: f64,
    /// Append-only custody trail, chronologically ordered.
    pub tracking_history: Vec<TrackingEntry>,
    /// Cross-references into the two ledgers.
    pub ledger_refs: LedgerRefs,
    /// Cached outcome of the most recent verification decision.
    pub verification_status: Option<VerificationStatus>,
    /// When the most recent verification decision was made.
    pub last_verification_date: Option<Timestamp>,
    /// The rule that produced the most recent rule-based decision.
    pub last_applied_rule: Option<RuleId>,
    /// When the off-chain record was created.
    pub created_at: Timestamp,
    /// Monotonic version counter for optimistic concurrency.
    pub version: u64,
}

impl Product {
    /// Build a fresh product record from creation input.
    ///
    /// The first tracking entry is the manufacturer at creation time.
    pub fn create(id: ProductId, input: NewProduct, now: Timestamp) -> Self {
        let first_entry = TrackingEntry {
            owner: input.owner.clone(),
            location: input.location.clone(),
            timestamp: now,
        };
        Self {
            id,
            name: input.name,
            manufacturer: input.manufacturer,
            manufacturing_date: input.manufacturing_date,
            batch_number: input.batch_number,
            current_owner: input.owner,
            location: input.location,
            certifications: Vec::new(),
            ethical_scores: Vec::new(),
            overall_ethical_score: 0.0,
            tracking_history: vec![first_entry],
            ledger_refs: LedgerRefs::default(),
            verification_status: None,
            last_verification_date: None,
            last_applied_rule: None,
            created_at: now,
            version: 1,
        }
    }

    /// Recompute the derived overall score from the individual scores.
    pub(crate) fn recompute_overall_score(&mut self) {
        if self.ethical_scores.is_empty() {
            self.overall_ethical_score = 0.0;
            return;
        }
        let total: f64 = self.ethical_scores.iter().map(|s| s.score).sum();
        self.overall_ethical_score = total / self.ethical_scores.len() as f64;
    }

    /// The product as a flat JSON object for rule evaluation.
    ///
    /// Rule attributes resolve against this representation, so an unknown
    /// attribute is detectable as a missing key rather than a crash. The
    /// most recent certification date answers to both `certificationDate`
    /// and `latestCertificationDate`.
    pub fn attributes(&self) -> serde_json::Value {
        let certification_date = self
            .certifications
            .last()
            .map(|c| c.certification_date.to_iso8601());
        serde_json::json!({
            "id": self.id.to_string(),
            "name": self.name,
            "manufacturer": self.manufacturer,
            "manufacturingDate": self.manufacturing_date.to_iso8601(),
            "batchNumber": self.batch_number.as_str(),
            "currentOwner": self.current_owner.as_str(),
            "location": self.location,
            "overallEthicalScore": self.overall_ethical_score,
            "certificationCount": self.certifications.len(),
            "certificationDate": &certification_date,
            "latestCertificationDate": &certification_date,
            "createdAt": self.created_at.to_iso8601(),
            "version": self.version,
        })
    }
}
