//! # Dual-Write Operations
//!
//! Each operation knows how to phrase itself for both ledgers: a chaincode
//! function with string arguments on the permissioned side, a contract
//! method with JSON arguments on the public side. Operations that have no
//! public mirror (metadata updates stay off the public chain) phrase only
//! the permissioned leg.
//!
//! ## Invariant
//!
//! The idempotency key is `{productId}:{kind}:{version}`, where `version`
//! is the provenance-store version the operation produces. Two submissions
//! of the same logical change always collide on the key; two distinct
//! changes never do, because the store's optimistic concurrency check
//! assigns each committed change its own version.

use serde::{Deserialize, Serialize};

use veritrace_core::{ProductId, Timestamp};

/// The kind tag used in idempotency keys and log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    /// Product registration.
    Create,
    /// Mutable-attribute update (no public mirror).
    Update,
    /// Custody transfer.
    Transfer,
    /// Certification attachment.
    Certify,
    /// Ethical assessment recording.
    Score,
    /// Sensor telemetry recording.
    Telemetry,
}

impl OperationKind {
    /// Stable lowercase tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Transfer => "transfer",
            Self::Certify => "certify",
            Self::Score => "score",
            Self::Telemetry => "telemetry",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A state-changing operation expressed for both ledgers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LedgerOperation {
    /// Register a product on both ledgers.
    Create {
        /// Off-chain product key; becomes the permissioned ledger key and
        /// the public contract's provenance anchor.
        product_id: ProductId,
        /// Product name.
        name: String,
        /// Manufacturer name.
        manufacturer: String,
        /// Manufacturing date.
        manufacturing_date: Timestamp,
        /// Manufacturer batch number.
        batch_number: String,
        /// Initial owner.
        owner: String,
        /// Initial location.
        location: String,
        /// When the registration happened.
        timestamp: Timestamp,
    },

    /// Update mutable attributes. Permissioned leg only.
    Update {
        /// Off-chain product key.
        product_id: ProductId,
        /// Store version after the update.
        version: u64,
        /// Sparse patch, e.g. `{"name": ..., "location": ...}`.
        patch: serde_json::Value,
        /// Who made the change.
        updated_by: String,
    },

    /// Transfer custody on both ledgers.
    Transfer {
        /// Off-chain product key.
        product_id: ProductId,
        /// Public contract's product id; `None` when the product never
        /// reached the public ledger.
        chain_id: Option<String>,
        /// Store version after the transfer.
        version: u64,
        /// Receiving owner.
        new_owner: String,
        /// Where the handover happened.
        location: String,
        /// When the handover happened.
        timestamp: Timestamp,
    },

    /// Attach a certification on both ledgers.
    Certify {
        /// Off-chain product key.
        product_id: ProductId,
        /// Public contract's product id, when known.
        chain_id: Option<String>,
        /// Store version after the attachment.
        version: u64,
        /// Certifying body.
        body: String,
        /// When the certification was issued.
        certification_date: Timestamp,
        /// When it lapses.
        expiration_date: Timestamp,
        /// Body-specific details.
        details: serde_json::Value,
    },

    /// Record an ethical assessment on both ledgers.
    Score {
        /// Off-chain product key.
        product_id: ProductId,
        /// Public contract's product id, when known.
        chain_id: Option<String>,
        /// Store version after the recording.
        version: u64,
        /// Assessment category, e.g. `laborConditions`.
        category: String,
        /// Score in `[0, 100]`.
        score: f64,
        /// When the assessment was made.
        assessment_date: Timestamp,
        /// Who assessed.
        assessor: String,
    },

    /// Record sensor telemetry on both ledgers.
    Telemetry {
        /// Off-chain product key.
        product_id: ProductId,
        /// Public contract's product id, when known.
        chain_id: Option<String>,
        /// Store version after the recording.
        version: u64,
        /// Reporting device.
        device_id: String,
        /// When the reading was taken.
        timestamp: Timestamp,
        /// Sensor measurements.
        measurements: serde_json::Value,
        /// Where the reading was taken.
        location: String,
    },
}

impl LedgerOperation {
    /// The operation's kind tag.
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Create { .. } => OperationKind::Create,
            Self::Update { .. } => OperationKind::Update,
            Self::Transfer { .. } => OperationKind::Transfer,
            Self::Certify { .. } => OperationKind::Certify,
            Self::Score { .. } => OperationKind::Score,
            Self::Telemetry { .. } => OperationKind::Telemetry,
        }
    }

    /// The product this operation touches.
    pub fn product_id(&self) -> &ProductId {
        match self {
            Self::Create { product_id, .. }
            | Self::Update { product_id, .. }
            | Self::Transfer { product_id, .. }
            | Self::Certify { product_id, .. }
            | Self::Score { product_id, .. }
            | Self::Telemetry { product_id, .. } => product_id,
        }
    }

    /// The store version this operation produces. Registration always
    /// produces version 1.
    pub fn version(&self) -> u64 {
        match self {
            Self::Create { .. } => 1,
            Self::Update { version, .. }
            | Self::Transfer { version, .. }
            | Self::Certify { version, .. }
            | Self::Score { version, .. }
            | Self::Telemetry { version, .. } => *version,
        }
    }

    /// `{productId}:{kind}:{version}` — collides exactly when two
    /// submissions describe the same logical change.
    pub fn idempotency_key(&self) -> String {
        format!("{}:{}:{}", self.product_id(), self.kind(), self.version())
    }

    /// The permissioned chaincode invocation: `(function, args)`.
    pub fn permissioned_call(&self) -> (&'static str, Vec<String>) {
        match self {
            Self::Create {
                product_id,
                name,
                manufacturer,
                manufacturing_date,
                batch_number,
                owner,
                location,
                timestamp,
            } => (
                "createProduct",
                vec![
                    product_id.to_string(),
                    name.clone(),
                    manufacturer.clone(),
                    manufacturing_date.to_iso8601(),
                    batch_number.clone(),
                    owner.clone(),
                    location.clone(),
                    timestamp.to_iso8601(),
                ],
            ),
            Self::Update {
                product_id,
                patch,
                updated_by,
                ..
            } => (
                "updateProduct",
                vec![product_id.to_string(), patch.to_string(), updated_by.clone()],
            ),
            Self::Transfer {
                product_id,
                new_owner,
                location,
                timestamp,
                ..
            } => (
                "transferProduct",
                vec![
                    product_id.to_string(),
                    new_owner.clone(),
                    location.clone(),
                    timestamp.to_iso8601(),
                ],
            ),
            Self::Certify {
                product_id,
                body,
                certification_date,
                expiration_date,
                details,
                ..
            } => (
                "addCertification",
                vec![
                    product_id.to_string(),
                    body.clone(),
                    certification_date.to_iso8601(),
                    expiration_date.to_iso8601(),
                    details.to_string(),
                ],
            ),
            Self::Score {
                product_id,
                category,
                score,
                assessment_date,
                assessor,
                ..
            } => (
                "addEthicalScore",
                vec![
                    product_id.to_string(),
                    category.clone(),
                    score.to_string(),
                    assessment_date.to_iso8601(),
                    assessor.clone(),
                ],
            ),
            Self::Telemetry {
                product_id,
                device_id,
                timestamp,
                measurements,
                location,
                ..
            } => (
                "recordTelemetry",
                vec![
                    product_id.to_string(),
                    device_id.clone(),
                    timestamp.to_iso8601(),
                    measurements.to_string(),
                    location.clone(),
                ],
            ),
        }
    }

    /// The public contract invocation, or `None` for operations with no
    /// public mirror.
    pub fn public_call(&self) -> Option<(&'static str, Vec<serde_json::Value>)> {
        match self {
            Self::Create {
                product_id,
                name,
                manufacturer,
                manufacturing_date,
                batch_number,
                ..
            } => Some((
                "createProduct",
                vec![
                    serde_json::json!(name),
                    serde_json::json!(manufacturer),
                    serde_json::json!(manufacturing_date.to_iso8601()),
                    serde_json::json!(batch_number),
                    // Provenance anchors: enough for the contract to check a
                    // presented verification code on its own.
                    serde_json::json!({
                        "offchainId": product_id.to_string(),
                        "manufacturingDate": manufacturing_date.to_iso8601(),
                    }),
                ],
            )),
            Self::Update { .. } => None,
            Self::Transfer {
                chain_id,
                new_owner,
                location,
                ..
            } => chain_id.as_ref().map(|chain_id| {
                (
                    "transferProduct",
                    vec![
                        serde_json::json!(chain_id),
                        serde_json::json!(new_owner),
                        serde_json::json!(location),
                    ],
                )
            }),
            Self::Certify {
                chain_id,
                body,
                expiration_date,
                ..
            } => chain_id.as_ref().map(|chain_id| {
                (
                    "addCertification",
                    vec![
                        serde_json::json!(chain_id),
                        serde_json::json!(body),
                        serde_json::json!(expiration_date.to_iso8601()),
                    ],
                )
            }),
            Self::Score {
                chain_id,
                category,
                score,
                assessment_date,
                assessor,
                ..
            } => chain_id.as_ref().map(|chain_id| {
                (
                    "createAssessment",
                    vec![
                        serde_json::json!(chain_id),
                        serde_json::json!(category),
                        serde_json::json!(score),
                        serde_json::json!({
                            "assessor": assessor,
                            "assessmentDate": assessment_date.to_iso8601(),
                        }),
                    ],
                )
            }),
            Self::Telemetry {
                chain_id,
                device_id,
                timestamp,
                measurements,
                ..
            } => chain_id.as_ref().map(|chain_id| {
                (
                    "recordTelemetry",
                    vec![
                        serde_json::json!(chain_id),
                        serde_json::json!(device_id),
                        serde_json::json!(timestamp.to_iso8601()),
                        measurements.clone(),
                    ],
                )
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer_op(product_id: ProductId, version: u64) -> LedgerOperation {
        LedgerOperation::Transfer {
            product_id,
            chain_id: Some("1".to_string()),
            version,
            new_owner: "distributor-7".to_string(),
            location: "Rotterdam".to_string(),
            timestamp: Timestamp::parse("2026-02-01T10:00:00Z").unwrap(),
        }
    }

    #[test]
    fn test_idempotency_key_shape() {
        let id = ProductId::new();
        let op = transfer_op(id, 3);
        assert_eq!(op.idempotency_key(), format!("{id}:transfer:3"));
    }

    #[test]
    fn test_same_change_same_key_different_change_different_key() {
        let id = ProductId::new();
        let first = transfer_op(id, 3);
        let resubmitted = transfer_op(id, 3);
        let later = transfer_op(id, 4);

        assert_eq!(first.idempotency_key(), resubmitted.idempotency_key());
        assert_ne!(first.idempotency_key(), later.idempotency_key());
    }

    #[test]
    fn test_create_is_always_version_one() {
        let op = LedgerOperation::Create {
            product_id: ProductId::new(),
            name: "Fair Trade Coffee".to_string(),
            manufacturer: "Highland Roasters".to_string(),
            manufacturing_date: Timestamp::parse("2026-01-15T00:00:00Z").unwrap(),
            batch_number: "LOT-2026-001".to_string(),
            owner: "Highland Roasters".to_string(),
            location: "Addis Ababa".to_string(),
            timestamp: Timestamp::parse("2026-01-15T08:00:00Z").unwrap(),
        };
        assert_eq!(op.version(), 1);
        assert!(op.idempotency_key().ends_with(":create:1"));
    }

    #[test]
    fn test_update_has_no_public_leg() {
        let op = LedgerOperation::Update {
            product_id: ProductId::new(),
            version: 2,
            patch: serde_json::json!({ "name": "Renamed" }),
            updated_by: "ops-1".to_string(),
        };
        assert!(op.public_call().is_none());
        assert_eq!(op.permissioned_call().0, "updateProduct");
    }

    #[test]
    fn test_create_public_leg_carries_provenance_anchors() {
        let id = ProductId::new();
        let op = LedgerOperation::Create {
            product_id: id,
            name: "Fair Trade Coffee".to_string(),
            manufacturer: "Highland Roasters".to_string(),
            manufacturing_date: Timestamp::parse("2026-01-15T00:00:00Z").unwrap(),
            batch_number: "LOT-2026-001".to_string(),
            owner: "Highland Roasters".to_string(),
            location: "Addis Ababa".to_string(),
            timestamp: Timestamp::parse("2026-01-15T08:00:00Z").unwrap(),
        };

        let (method, args) = op.public_call().unwrap();
        assert_eq!(method, "createProduct");
        let metadata = &args[4];
        assert_eq!(metadata["offchainId"], serde_json::json!(id.to_string()));
        assert_eq!(
            metadata["manufacturingDate"],
            serde_json::json!("2026-01-15T00:00:00Z")
        );
    }

    #[test]
    fn test_permissioned_args_match_chaincode_order() {
        let id = ProductId::new();
        let op = transfer_op(id, 2);
        let (function, args) = op.permissioned_call();
        assert_eq!(function, "transferProduct");
        assert_eq!(
            args,
            vec![
                id.to_string(),
                "distributor-7".to_string(),
                "Rotterdam".to_string(),
                "2026-02-01T10:00:00Z".to_string(),
            ]
        );
    }
}
