//! # Provenance Service
//!
//! The application-facing surface. Every workflow follows the same shape:
//! validate, mutate the off-chain store (the authoritative record), then
//! mirror to the ledgers through the coordinator.
//!
//! ## Design
//!
//! Ledger outcomes are data, not errors. The off-chain store commit is the
//! point of no return; whatever happens on the ledgers afterwards is
//! reported in the [`CommitReport`] so callers can retry the ledger sync
//! without re-applying the business change. Only failures *before* the
//! store commit (validation, version conflicts, unknown products) are
//! `Err`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use veritrace_coordinator::{
    CoordinatorError, DualWriteOutcome, HistoryAggregator, LedgerCoordinator, LedgerOperation,
    ProductHistory,
};
use veritrace_core::{ActorId, ProductId, RuleId, Timestamp, VerificationId};
use veritrace_ledger::handlers::verification_code;
use veritrace_ledger::{LedgerError, PermissionedLedger, PublicLedger};
use veritrace_store::{
    Certification, EthicalScore, NewProduct, Product, ProductPatch, ProductStatistics,
    ProvenanceStore, SearchPage, TrackingEntry, VerificationStatus,
};
use veritrace_verify::{
    AuthenticityReport, Decision, RuleEngine, RuleOutcome, RuleStatus, SignalResult,
    VerificationRequest, Verdict, VerificationRule, VerifyError,
};
use veritrace_zkp::{AttestationOracle, Proof, PublicSignals};

use crate::error::ServiceError;
use crate::telemetry::{AnalyticsSink, TelemetryEvent};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// How far a business change made it onto the ledgers.
#[derive(Debug, Clone)]
pub enum LedgerSync {
    /// Every required leg committed.
    Committed {
        /// Permissioned transaction id.
        permissioned_tx: String,
        /// Public contract's return value, when a public leg ran.
        public_return: Option<serde_json::Value>,
    },
    /// Permissioned leg committed; public mirror write failed. A call to
    /// [`ProvenanceService::retry_ledger_sync`] completes the public leg.
    PartialCommit {
        /// Permissioned transaction id.
        permissioned_tx: String,
        /// Why the public leg failed.
        failure: LedgerError,
        /// The operation a reconciler replays to complete the sync.
        operation: LedgerOperation,
    },
    /// The permissioned ledger refused; nothing reached either ledger. The
    /// off-chain record still committed and a later sync can reconcile.
    Aborted {
        /// The refusal.
        failure: CoordinatorError,
    },
}

/// A committed off-chain change plus its ledger sync status.
#[derive(Debug, Clone)]
pub struct CommitReport {
    /// The product after the change.
    pub product: Product,
    /// What the ledgers say about it.
    pub ledger: LedgerSync,
}

/// A product's cached verification standing, for consumer-facing reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationStanding {
    /// The most recent decision, or `"Not Verified"` when no decision has
    /// ever been made.
    pub status: String,
    /// When the most recent decision was made.
    pub last_verification_date: Option<Timestamp>,
}

/// The wired-up application service.
pub struct ProvenanceService {
    store: Arc<ProvenanceStore>,
    coordinator: LedgerCoordinator,
    aggregator: HistoryAggregator,
    permissioned: Arc<dyn PermissionedLedger>,
    public: Arc<dyn PublicLedger>,
    oracle: Arc<dyn AttestationOracle>,
    analytics: Arc<dyn AnalyticsSink>,
    engine: RuleEngine,
    rules: Mutex<HashMap<RuleId, VerificationRule>>,
    requests: Mutex<HashMap<VerificationId, VerificationRequest>>,
    /// Operations whose last ledger sync did not fully commit, by product.
    pending_syncs: Mutex<HashMap<ProductId, LedgerOperation>>,
    identity: String,
}

impl ProvenanceService {
    /// Wire a service from its dependencies. `identity` is the enrolled
    /// identity used for every permissioned-ledger interaction.
    pub fn new(
        store: Arc<ProvenanceStore>,
        permissioned: Arc<dyn PermissionedLedger>,
        public: Arc<dyn PublicLedger>,
        oracle: Arc<dyn AttestationOracle>,
        analytics: Arc<dyn AnalyticsSink>,
        identity: impl Into<String>,
    ) -> Self {
        let identity = identity.into();
        Self {
            coordinator: LedgerCoordinator::new(
                Arc::clone(&permissioned),
                Arc::clone(&public),
                identity.clone(),
            ),
            aggregator: HistoryAggregator::new(
                Arc::clone(&permissioned),
                Arc::clone(&public),
                identity.clone(),
            ),
            store,
            permissioned,
            public,
            oracle,
            analytics,
            engine: RuleEngine::new(),
            rules: Mutex::new(HashMap::new()),
            requests: Mutex::new(HashMap::new()),
            pending_syncs: Mutex::new(HashMap::new()),
            identity,
        }
    }

    /// Fully in-process service: in-memory store and ledgers, mock oracle,
    /// no analytics. For demos and tests.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(ProvenanceStore::new()),
            Arc::new(veritrace_ledger::InMemoryPermissionedLedger::new()),
            Arc::new(veritrace_ledger::InMemoryPublicLedger::new()),
            Arc::new(veritrace_zkp::MockAttestationOracle::new()),
            Arc::new(crate::telemetry::NoopAnalytics),
            "provenance-service",
        )
    }

    // ─── Product Lifecycle ───────────────────────────────────────────

    /// Register a product: off-chain record, then both ledgers, then the
    /// cross-references.
    pub fn register_product(&self, input: NewProduct) -> Result<CommitReport, ServiceError> {
        let product = self.store.create(input)?;
        tracing::info!(product_id = %product.id, batch = product.batch_number.as_str(), "product registered");

        let op = LedgerOperation::Create {
            product_id: product.id,
            name: product.name.clone(),
            manufacturer: product.manufacturer.clone(),
            manufacturing_date: product.manufacturing_date,
            batch_number: product.batch_number.as_str().to_string(),
            owner: product.current_owner.as_str().to_string(),
            location: product.location.clone(),
            timestamp: product.created_at,
        };
        let sync = self.run_dual_write(&op);

        match &sync {
            LedgerSync::Committed {
                permissioned_tx,
                public_return,
            } => {
                let public_id = public_return
                    .as_ref()
                    .and_then(|v| v.as_str())
                    .map(str::to_string);
                self.store.record_ledger_refs(
                    product.id,
                    Some(permissioned_tx.clone()),
                    public_id,
                )?;
            }
            LedgerSync::PartialCommit { permissioned_tx, .. } => {
                self.store
                    .record_ledger_refs(product.id, Some(permissioned_tx.clone()), None)?;
            }
            LedgerSync::Aborted { .. } => {}
        }

        Ok(CommitReport {
            product: self.store.get(product.id)?,
            ledger: sync,
        })
    }

    /// Read a product.
    pub fn get_product(&self, id: ProductId) -> Result<Product, ServiceError> {
        Ok(self.store.get(id)?)
    }

    /// Update mutable attributes with optimistic concurrency.
    pub fn update_product(
        &self,
        id: ProductId,
        patch: ProductPatch,
        expected_version: u64,
        updated_by: &ActorId,
    ) -> Result<CommitReport, ServiceError> {
        let mut patch_json = serde_json::Map::new();
        if let Some(name) = &patch.name {
            patch_json.insert("name".to_string(), serde_json::json!(name));
        }
        if let Some(location) = &patch.location {
            patch_json.insert("location".to_string(), serde_json::json!(location));
        }

        let product = self.store.update(id, patch, expected_version)?;
        let sync = self.run_dual_write(&LedgerOperation::Update {
            product_id: id,
            version: product.version,
            patch: serde_json::Value::Object(patch_json),
            updated_by: updated_by.as_str().to_string(),
        });
        Ok(CommitReport { product, ledger: sync })
    }

    /// Transfer custody: owner, location, and one tracking entry, then both
    /// ledgers.
    pub fn transfer_product(
        &self,
        id: ProductId,
        new_owner: ActorId,
        location: String,
        expected_version: u64,
    ) -> Result<CommitReport, ServiceError> {
        let product =
            self.store
                .transfer(id, new_owner.clone(), location.clone(), expected_version)?;
        tracing::info!(product_id = %id, new_owner = new_owner.as_str(), "custody transferred");

        let timestamp = product
            .tracking_history
            .last()
            .map(|e| e.timestamp)
            .unwrap_or_else(Timestamp::now);
        let sync = self.run_dual_write(&LedgerOperation::Transfer {
            product_id: id,
            chain_id: product.ledger_refs.public_ledger_id.clone(),
            version: product.version,
            new_owner: new_owner.as_str().to_string(),
            location,
            timestamp,
        });
        Ok(CommitReport { product, ledger: sync })
    }

    /// Attach a certification.
    pub fn add_certification(
        &self,
        id: ProductId,
        body: String,
        certification_date: Timestamp,
        expiration_date: Timestamp,
        details: serde_json::Value,
    ) -> Result<CommitReport, ServiceError> {
        let cert = Certification::new(body, certification_date, expiration_date, details.clone())?;
        let product = self.store.append_certification(id, cert.clone())?;

        let sync = self.run_dual_write(&LedgerOperation::Certify {
            product_id: id,
            chain_id: product.ledger_refs.public_ledger_id.clone(),
            version: product.version,
            body: cert.body,
            certification_date,
            expiration_date,
            details,
        });
        Ok(CommitReport { product, ledger: sync })
    }

    /// Record an ethical assessment; the overall score is recomputed as the
    /// mean of all individual scores.
    pub fn add_ethical_score(
        &self,
        id: ProductId,
        category: String,
        score: f64,
        assessment_date: Timestamp,
        assessor: ActorId,
    ) -> Result<CommitReport, ServiceError> {
        let entry = EthicalScore::new(category.clone(), score, assessment_date, assessor.clone())?;
        let product = self.store.append_ethical_score(id, entry)?;

        let sync = self.run_dual_write(&LedgerOperation::Score {
            product_id: id,
            chain_id: product.ledger_refs.public_ledger_id.clone(),
            version: product.version,
            category,
            score,
            assessment_date,
            assessor: assessor.as_str().to_string(),
        });
        Ok(CommitReport { product, ledger: sync })
    }

    /// Ingest one telemetry event: lenient timestamp parsing, a tracking
    /// entry under the current owner, both ledgers, then analytics.
    pub fn ingest_telemetry(&self, event: TelemetryEvent) -> Result<CommitReport, ServiceError> {
        let timestamp = Timestamp::parse_lenient(&event.recorded_at)?;
        let current = self.store.get(event.product_id)?;

        let product = self.store.append_tracking(
            event.product_id,
            TrackingEntry {
                owner: current.current_owner.clone(),
                location: event.location.clone(),
                timestamp,
            },
        )?;

        let sync = self.run_dual_write(&LedgerOperation::Telemetry {
            product_id: event.product_id,
            chain_id: product.ledger_refs.public_ledger_id.clone(),
            version: product.version,
            device_id: event.device_id.as_str().to_string(),
            timestamp,
            measurements: event.measurements.clone(),
            location: event.location.clone(),
        });

        self.analytics.observe(&event);
        Ok(CommitReport { product, ledger: sync })
    }

    /// Search products by name, manufacturer, or batch number.
    pub fn search_products(&self, query: &str, page: usize, limit: usize) -> SearchPage {
        self.store.search(query, page, limit)
    }

    /// Aggregate statistics over products created within `[start, end]`.
    pub fn statistics(&self, start: Timestamp, end: Timestamp) -> ProductStatistics {
        self.store.statistics(start, end)
    }

    // ─── Authenticity ────────────────────────────────────────────────

    /// The verification code for a product, as both ledgers compute it.
    /// Printed on packaging so consumers can present it back.
    pub fn verification_code(&self, id: ProductId) -> Result<String, ServiceError> {
        let product = self.store.get(id)?;
        Ok(verification_code(
            &product.id.to_string(),
            &product.manufacturing_date.to_iso8601(),
        ))
    }

    /// Check a presented verification code against both ledgers and verify
    /// the attestation proof. The verdict is the AND of all three signals;
    /// each signal's detail is preserved in the report.
    pub fn verify_authenticity(
        &self,
        id: ProductId,
        presented_code: &str,
        proof: &Proof,
        signals: &PublicSignals,
    ) -> Result<AuthenticityReport, ServiceError> {
        let product = self.store.get(id)?;

        let session = self.permissioned.connect(&self.identity)?;
        let reply = session.evaluate(
            "verifyProduct",
            &[id.to_string(), presented_code.to_string()],
        )?;
        let reply: serde_json::Value = serde_json::from_slice(&reply)
            .map_err(|e| ServiceError::MalformedReply(e.to_string()))?;
        let permissioned = SignalResult::from_ledger_reply(&reply);

        let public_ledger = match &product.ledger_refs.public_ledger_id {
            Some(chain_id) => {
                let reply = self.public.call(
                    "verifyProduct",
                    &[serde_json::json!(chain_id), serde_json::json!(presented_code)],
                )?;
                SignalResult::from_ledger_reply(&reply)
            }
            None => SignalResult {
                authentic: false,
                detail: serde_json::json!("product has no public ledger record"),
            },
        };

        let zk_proof_valid = self.oracle.verify_proof(proof, signals)?;
        let report = AuthenticityReport::aggregate(permissioned, public_ledger, zk_proof_valid);
        tracing::info!(product_id = %id, authentic = report.authentic, "authenticity checked");
        Ok(report)
    }

    /// Verify a certification by certifying body against the permissioned
    /// ledger copy, evaluated as of the current time. Read-only: the stored
    /// certification status is never mutated by this query.
    pub fn verify_certification(
        &self,
        id: ProductId,
        body: &str,
    ) -> Result<serde_json::Value, ServiceError> {
        self.store.get(id)?;
        let session = self.permissioned.connect(&self.identity)?;
        let reply = session.evaluate(
            "verifyCertification",
            &[
                id.to_string(),
                body.to_string(),
                Timestamp::now().to_iso8601(),
            ],
        )?;
        serde_json::from_slice(&reply).map_err(|e| ServiceError::MalformedReply(e.to_string()))
    }

    /// The product's ethical profile as the permissioned ledger holds it:
    /// certifications, individual scores, and the derived overall score.
    pub fn ethical_profile(&self, id: ProductId) -> Result<serde_json::Value, ServiceError> {
        self.store.get(id)?;
        let session = self.permissioned.connect(&self.identity)?;
        let reply = session.evaluate("getEthicalProfile", &[id.to_string()])?;
        serde_json::from_slice(&reply).map_err(|e| ServiceError::MalformedReply(e.to_string()))
    }

    /// The cached verification standing of a product.
    pub fn verification_status(
        &self,
        id: ProductId,
    ) -> Result<VerificationStanding, ServiceError> {
        let product = self.store.get(id)?;
        let status = product
            .verification_status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "Not Verified".to_string());
        Ok(VerificationStanding {
            status,
            last_verification_date: product.last_verification_date,
        })
    }

    // ─── Verification Requests ───────────────────────────────────────

    /// Open a pending verification request for a product.
    pub fn request_verification(
        &self,
        product_id: ProductId,
        requester: ActorId,
        request_type: impl Into<String>,
    ) -> Result<VerificationRequest, ServiceError> {
        // Existence check before accepting the request.
        self.store.get(product_id)?;
        let request = VerificationRequest::new(product_id, requester, request_type);
        tracing::info!(request_id = %request.id, %product_id, "verification requested");
        lock(&self.requests).insert(request.id, request.clone());
        Ok(request)
    }

    /// Apply a verifier decision to a pending request and cache the outcome
    /// on the product.
    pub fn decide_verification(
        &self,
        request_id: VerificationId,
        verifier: ActorId,
        decision: Decision,
        comments: Option<String>,
    ) -> Result<VerificationRequest, ServiceError> {
        let mut requests = lock(&self.requests);
        let request = requests
            .get_mut(&request_id)
            .ok_or_else(|| ServiceError::UnknownRequest {
                id: request_id.to_string(),
            })?;

        let entry = request.process(verifier, decision, comments)?;
        let status = match decision {
            Decision::Verified => VerificationStatus::Verified,
            Decision::Failed => VerificationStatus::Failed,
            Decision::Rejected => VerificationStatus::Rejected,
        };
        self.store
            .record_verification(request.product_id, status, entry.timestamp, None)?;
        tracing::info!(%request_id, status = %request.status, "verification decided");
        Ok(request.clone())
    }

    /// Read a verification request with its audit trail.
    pub fn verification_request(
        &self,
        request_id: VerificationId,
    ) -> Result<VerificationRequest, ServiceError> {
        lock(&self.requests)
            .get(&request_id)
            .cloned()
            .ok_or_else(|| ServiceError::UnknownRequest {
                id: request_id.to_string(),
            })
    }

    /// All verification requests ever opened for a product, newest last.
    pub fn requests_for_product(&self, product_id: ProductId) -> Vec<VerificationRequest> {
        let requests = lock(&self.requests);
        let mut matching: Vec<VerificationRequest> = requests
            .values()
            .filter(|r| r.product_id == product_id)
            .cloned()
            .collect();
        matching.sort_by_key(|r| r.created_at);
        matching
    }

    // ─── Rules ───────────────────────────────────────────────────────

    /// Register an active rule. The type tag must have a registered
    /// evaluator.
    pub fn register_rule(
        &self,
        rule_type: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Result<VerificationRule, ServiceError> {
        let rule_type = rule_type.into();
        if !self.engine.supports(&rule_type) {
            return Err(VerifyError::UnknownRuleType { rule_type }.into());
        }
        let rule = VerificationRule::new(rule_type, parameters);
        lock(&self.rules).insert(rule.id, rule.clone());
        Ok(rule)
    }

    /// Retire a rule. It stays listed for audit but refuses to run.
    pub fn retire_rule(&self, rule_id: RuleId) -> Result<VerificationRule, ServiceError> {
        let mut rules = lock(&self.rules);
        let rule = rules
            .get_mut(&rule_id)
            .ok_or_else(|| ServiceError::UnknownRule {
                id: rule_id.to_string(),
            })?;
        rule.status = RuleStatus::Retired;
        Ok(rule.clone())
    }

    /// All registered rules, oldest first.
    pub fn rules(&self) -> Vec<VerificationRule> {
        let rules = lock(&self.rules);
        let mut all: Vec<VerificationRule> = rules.values().cloned().collect();
        all.sort_by_key(|r| r.created_at);
        all
    }

    /// Evaluate a rule against a product's current attributes and cache the
    /// verdict on the product.
    pub fn apply_rule(
        &self,
        rule_id: RuleId,
        product_id: ProductId,
    ) -> Result<RuleOutcome, ServiceError> {
        let rule = lock(&self.rules)
            .get(&rule_id)
            .cloned()
            .ok_or_else(|| ServiceError::UnknownRule {
                id: rule_id.to_string(),
            })?;
        let product = self.store.get(product_id)?;

        let now = Timestamp::now();
        let outcome = self.engine.apply(&rule, &product.attributes(), now)?;
        let status = match outcome.verdict {
            Verdict::Verified => VerificationStatus::Verified,
            Verdict::Failed => VerificationStatus::Failed,
        };
        self.store
            .record_verification(product_id, status, now, Some(rule_id))?;
        tracing::info!(%rule_id, %product_id, status = %status, "rule applied");
        Ok(outcome)
    }

    // ─── Reconciliation ──────────────────────────────────────────────

    /// Replay the recorded ledger operation for a product whose last change
    /// did not fully reach the ledgers.
    ///
    /// After a `PartialCommit` only the public leg runs; after an `Aborted`
    /// sync the whole dual write is retried under the same idempotency key.
    /// The business change is never re-applied.
    pub fn retry_ledger_sync(&self, id: ProductId) -> Result<LedgerSync, ServiceError> {
        let op = lock(&self.pending_syncs)
            .get(&id)
            .cloned()
            .ok_or_else(|| ServiceError::NoPendingSync { id: id.to_string() })?;

        let sync = self.run_dual_write(&op);
        if let LedgerSync::Committed {
            permissioned_tx,
            public_return,
        } = &sync
        {
            // Only registration hands back the on-chain product id; other
            // operations return operation-specific values.
            let public_id = match &op {
                LedgerOperation::Create { .. } => public_return
                    .as_ref()
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
                _ => None,
            };
            self.store
                .record_ledger_refs(id, Some(permissioned_tx.clone()), public_id)?;
            tracing::info!(product_id = %id, kind = %op.kind(), "ledger sync reconciled");
        }
        Ok(sync)
    }

    // ─── History ─────────────────────────────────────────────────────

    /// Both ledger histories for a product, side by side.
    pub fn product_history(&self, id: ProductId) -> Result<ProductHistory, ServiceError> {
        let product = self.store.get(id)?;
        Ok(self
            .aggregator
            .fetch(&id, product.ledger_refs.public_ledger_id.as_deref())?)
    }

    // ─── Internals ───────────────────────────────────────────────────

    fn run_dual_write(&self, op: &LedgerOperation) -> LedgerSync {
        let sync = match self.coordinator.execute(op) {
            Ok(DualWriteOutcome::Committed { permissioned, public }) => LedgerSync::Committed {
                permissioned_tx: permissioned.tx_id,
                public_return: public.map(|o| o.return_value),
            },
            Ok(DualWriteOutcome::PartialCommit {
                permissioned,
                failure,
                operation,
            }) => LedgerSync::PartialCommit {
                permissioned_tx: permissioned.tx_id,
                failure,
                operation,
            },
            Err(failure) => {
                tracing::error!(
                    kind = %op.kind(),
                    product_id = %op.product_id(),
                    error = %failure,
                    "ledger sync aborted, off-chain record stands"
                );
                LedgerSync::Aborted { failure }
            }
        };

        match &sync {
            LedgerSync::Committed { .. } => {
                lock(&self.pending_syncs).remove(op.product_id());
            }
            LedgerSync::PartialCommit { .. } | LedgerSync::Aborted { .. } => {
                lock(&self.pending_syncs).insert(*op.product_id(), op.clone());
            }
        }
        sync
    }
}
