//! # Dual-Write Saga
//!
//! Permissioned first, public second, no rollback.
//!
//! ## Design
//!
//! The permissioned ledger is the system of record. An operation the
//! permissioned ledger refuses never reaches the public ledger, so an abort
//! leaves no trace anywhere. Once the permissioned write commits there is
//! nothing to roll back against a blockchain, so a public-leg failure is
//! surfaced as a [`DualWriteOutcome::PartialCommit`] carrying the real
//! permissioned receipt and the real failure.
//!
//! ## Invariant
//!
//! A replayed idempotency key never re-submits the permissioned leg. A
//! replay of a committed key returns the recorded outcome; a replay of a
//! partially committed key retries only the public leg and upgrades the
//! record on success. Concurrent executions of the same key serialize on
//! a per-key slot, so the second caller waits and then replays.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use veritrace_ledger::{
    InvokeOutcome, LedgerError, PermissionedLedger, PublicLedger, TxReceipt,
};

use crate::error::CoordinatorError;
use crate::operation::LedgerOperation;

/// The result of a dual write that got at least as far as the system of
/// record.
#[derive(Debug, Clone, PartialEq)]
pub enum DualWriteOutcome {
    /// Every required leg committed.
    Committed {
        /// Receipt from the permissioned ledger.
        permissioned: TxReceipt,
        /// Public-ledger outcome; `None` when the operation has no public
        /// mirror.
        public: Option<InvokeOutcome>,
    },

    /// The permissioned ledger committed but the public mirror write
    /// failed. Re-executing the recorded operation completes the public
    /// leg without touching the permissioned one.
    PartialCommit {
        /// The receipt that exists.
        permissioned: TxReceipt,
        /// Why the public leg failed.
        failure: LedgerError,
        /// The operation to replay when reconciling.
        operation: LedgerOperation,
    },
}

impl DualWriteOutcome {
    /// The permissioned receipt, present in every outcome.
    pub fn permissioned_receipt(&self) -> &TxReceipt {
        match self {
            Self::Committed { permissioned, .. } | Self::PartialCommit { permissioned, .. } => {
                permissioned
            }
        }
    }

    /// The public outcome, when that leg committed.
    pub fn public_outcome(&self) -> Option<&InvokeOutcome> {
        match self {
            Self::Committed { public, .. } => public.as_ref(),
            Self::PartialCommit { .. } => None,
        }
    }
}

/// Recorded outcome for one idempotency key. The slot mutex is held across
/// the ledger writes, so concurrent executions of the same key serialize
/// here instead of both submitting.
type SyncSlot = Arc<Mutex<Option<DualWriteOutcome>>>;

/// Writes operations to both ledgers in order and remembers what it has
/// already applied.
pub struct LedgerCoordinator {
    permissioned: Arc<dyn PermissionedLedger>,
    public: Arc<dyn PublicLedger>,
    identity: String,
    /// Outcome slots by idempotency key. Grows with the number of distinct
    /// keys applied through this coordinator; a durable deployment would
    /// back this with evictable storage keyed the same way.
    applied: Mutex<HashMap<String, SyncSlot>>,
}

impl LedgerCoordinator {
    /// Coordinator writing as `identity` on the permissioned ledger.
    pub fn new(
        permissioned: Arc<dyn PermissionedLedger>,
        public: Arc<dyn PublicLedger>,
        identity: impl Into<String>,
    ) -> Self {
        Self {
            permissioned,
            public,
            identity: identity.into(),
            applied: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, key: &str) -> SyncSlot {
        let mut map = self.applied.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(map.entry(key.to_string()).or_default())
    }

    /// Execute a dual write.
    ///
    /// # Errors
    ///
    /// `Aborted` if the permissioned ledger refuses the operation; neither
    /// ledger was written.
    pub fn execute(&self, op: &LedgerOperation) -> Result<DualWriteOutcome, CoordinatorError> {
        let key = op.idempotency_key();
        let kind = op.kind();

        // Held until the write finishes: a second caller with the same key
        // blocks here and then sees the recorded outcome.
        let slot = self.slot(&key);
        let mut recorded = slot.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(outcome) = recorded.clone() {
            match outcome {
                DualWriteOutcome::Committed { .. } => {
                    tracing::info!(%key, %kind, "replaying committed dual write");
                    return Ok(outcome);
                }
                DualWriteOutcome::PartialCommit { permissioned, .. } => {
                    tracing::info!(%key, %kind, "resuming partial commit");
                    let outcome = self.finish_public_leg(op, &key, permissioned);
                    *recorded = Some(outcome.clone());
                    return Ok(outcome);
                }
            }
        }

        let (function, args) = op.permissioned_call();
        let receipt = self
            .permissioned
            .connect(&self.identity)
            .and_then(|mut session| session.submit(function, &args))
            .map_err(|source| {
                tracing::error!(%key, %kind, error = %source, "dual write aborted");
                CoordinatorError::Aborted {
                    kind: kind.as_str(),
                    source,
                }
            })?;

        let outcome = self.finish_public_leg(op, &key, receipt);
        *recorded = Some(outcome.clone());
        Ok(outcome)
    }

    fn finish_public_leg(
        &self,
        op: &LedgerOperation,
        key: &str,
        receipt: TxReceipt,
    ) -> DualWriteOutcome {
        match op.public_call() {
            None => DualWriteOutcome::Committed {
                permissioned: receipt,
                public: None,
            },
            Some((method, args)) => match self.public.invoke(method, &args) {
                Ok(public) => DualWriteOutcome::Committed {
                    permissioned: receipt,
                    public: Some(public),
                },
                Err(failure) => {
                    tracing::warn!(
                        %key,
                        kind = %op.kind(),
                        error = %failure,
                        retryable = failure.is_retryable(),
                        "public mirror write failed, permissioned leg committed"
                    );
                    DualWriteOutcome::PartialCommit {
                        permissioned: receipt,
                        failure,
                        operation: op.clone(),
                    }
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use veritrace_core::{ProductId, Timestamp};
    use veritrace_ledger::{
        InMemoryPermissionedLedger, InMemoryPublicLedger, PermissionedSession, VersionedValue,
    };

    fn coordinator() -> (
        LedgerCoordinator,
        Arc<InMemoryPermissionedLedger>,
        Arc<InMemoryPublicLedger>,
    ) {
        let permissioned = Arc::new(InMemoryPermissionedLedger::new());
        let public = Arc::new(InMemoryPublicLedger::new());
        let coordinator = LedgerCoordinator::new(
            Arc::clone(&permissioned) as Arc<dyn PermissionedLedger>,
            Arc::clone(&public) as Arc<dyn PublicLedger>,
            "coordinator-svc",
        );
        (coordinator, permissioned, public)
    }

    fn create_op(product_id: ProductId) -> LedgerOperation {
        LedgerOperation::Create {
            product_id,
            name: "Fair Trade Coffee".to_string(),
            manufacturer: "Highland Roasters".to_string(),
            manufacturing_date: Timestamp::parse("2026-01-15T00:00:00Z").unwrap(),
            batch_number: "LOT-2026-001".to_string(),
            owner: "Highland Roasters".to_string(),
            location: "Addis Ababa".to_string(),
            timestamp: Timestamp::parse("2026-01-15T08:00:00Z").unwrap(),
        }
    }

    #[test]
    fn test_create_commits_both_legs() {
        let (coordinator, _, _) = coordinator();
        let outcome = coordinator.execute(&create_op(ProductId::new())).unwrap();

        match outcome {
            DualWriteOutcome::Committed { public, .. } => {
                let public = public.unwrap();
                assert!(public.event("ProductCreated").is_some());
                assert!(public.return_value.is_string());
            }
            other => panic!("expected Committed, got {other:?}"),
        }
    }

    #[test]
    fn test_permissioned_refusal_aborts_without_public_write() {
        let (coordinator, permissioned, _) = coordinator();
        permissioned.fail_next(LedgerError::Unavailable("peer down".to_string()));

        let err = coordinator.execute(&create_op(ProductId::new())).unwrap_err();
        assert!(matches!(err, CoordinatorError::Aborted { kind: "create", .. }));
    }

    #[test]
    fn test_public_failure_surfaces_partial_commit() {
        let (coordinator, _, public) = coordinator();
        public.fail_next(LedgerError::Timeout {
            operation: "createProduct".to_string(),
            elapsed_secs: 5,
        });

        let op = create_op(ProductId::new());
        let outcome = coordinator.execute(&op).unwrap();
        match outcome {
            DualWriteOutcome::PartialCommit {
                permissioned,
                failure,
                operation,
            } => {
                assert!(!permissioned.tx_id.is_empty());
                assert!(failure.is_retryable());
                // The outcome carries everything a reconciler needs to
                // replay the same key later.
                assert_eq!(operation.idempotency_key(), op.idempotency_key());
            }
            other => panic!("expected PartialCommit, got {other:?}"),
        }
    }

    #[test]
    fn test_replay_returns_recorded_outcome_without_resubmitting() {
        let (coordinator, permissioned, _) = coordinator();
        let op = create_op(ProductId::new());

        let first = coordinator.execute(&op).unwrap();
        // A resubmission would be refused by the chaincode (key exists), so
        // a successful replay proves the permissioned leg was not re-run.
        let second = coordinator.execute(&op).unwrap();
        assert_eq!(first, second);

        // And even a faulted ledger is never reached on replay.
        permissioned.fail_next(LedgerError::Unavailable("peer down".to_string()));
        let third = coordinator.execute(&op).unwrap();
        assert_eq!(first, third);
    }

    /// Counts submissions and widens the race window so an unserialized
    /// duplicate execution would reliably double-submit.
    struct CountingLedger {
        inner: InMemoryPermissionedLedger,
        submits: AtomicUsize,
    }

    impl PermissionedLedger for CountingLedger {
        fn connect(
            &self,
            identity: &str,
        ) -> Result<Box<dyn PermissionedSession + '_>, LedgerError> {
            Ok(Box::new(CountingSession {
                inner: self.inner.connect(identity)?,
                submits: &self.submits,
            }))
        }
    }

    struct CountingSession<'a> {
        inner: Box<dyn PermissionedSession + 'a>,
        submits: &'a AtomicUsize,
    }

    impl PermissionedSession for CountingSession<'_> {
        fn submit(&mut self, function: &str, args: &[String]) -> Result<TxReceipt, LedgerError> {
            self.submits.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(25));
            self.inner.submit(function, args)
        }

        fn evaluate(&self, function: &str, args: &[String]) -> Result<Vec<u8>, LedgerError> {
            self.inner.evaluate(function, args)
        }

        fn history(&self, key: &str) -> Result<Vec<VersionedValue>, LedgerError> {
            self.inner.history(key)
        }
    }

    #[test]
    fn test_concurrent_same_key_submits_permissioned_leg_once() {
        let permissioned = Arc::new(CountingLedger {
            inner: InMemoryPermissionedLedger::new(),
            submits: AtomicUsize::new(0),
        });
        let public = Arc::new(InMemoryPublicLedger::new());
        let coordinator = LedgerCoordinator::new(
            Arc::clone(&permissioned) as Arc<dyn PermissionedLedger>,
            public as Arc<dyn PublicLedger>,
            "coordinator-svc",
        );

        let product_id = ProductId::new();
        let created = coordinator.execute(&create_op(product_id)).unwrap();
        let chain_id = created
            .public_outcome()
            .and_then(|o| o.return_value.as_str())
            .unwrap()
            .to_string();

        let op = LedgerOperation::Transfer {
            product_id,
            chain_id: Some(chain_id),
            version: 2,
            new_owner: "distributor-7".to_string(),
            location: "Rotterdam".to_string(),
            timestamp: Timestamp::parse("2026-02-01T10:00:00Z").unwrap(),
        };

        std::thread::scope(|scope| {
            let a = scope.spawn(|| coordinator.execute(&op).unwrap());
            let b = scope.spawn(|| coordinator.execute(&op).unwrap());
            assert_eq!(a.join().unwrap(), b.join().unwrap());
        });

        // One create plus exactly one transfer, regardless of which caller
        // performed the write and which replayed.
        assert_eq!(permissioned.submits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_retry_after_partial_commit_completes_public_leg_only() {
        let (coordinator, _, public) = coordinator();
        let op = create_op(ProductId::new());

        public.fail_next(LedgerError::Unavailable("rpc down".to_string()));
        let first = coordinator.execute(&op).unwrap();
        let receipt = first.permissioned_receipt().clone();
        assert!(matches!(first, DualWriteOutcome::PartialCommit { .. }));

        let second = coordinator.execute(&op).unwrap();
        match second {
            DualWriteOutcome::Committed { permissioned, public } => {
                // Same receipt as the original commit: leg not re-run.
                assert_eq!(permissioned, receipt);
                assert!(public.unwrap().event("ProductCreated").is_some());
            }
            other => panic!("expected Committed after retry, got {other:?}"),
        }

        // The upgraded record replays as committed from now on.
        let third = coordinator.execute(&op).unwrap();
        assert!(matches!(third, DualWriteOutcome::Committed { .. }));
    }

    #[test]
    fn test_update_commits_with_no_public_outcome() {
        let (coordinator, _, _) = coordinator();
        let product_id = ProductId::new();
        coordinator.execute(&create_op(product_id)).unwrap();

        let update = LedgerOperation::Update {
            product_id,
            version: 2,
            patch: serde_json::json!({ "location": "Djibouti" }),
            updated_by: "ops-1".to_string(),
        };
        let outcome = coordinator.execute(&update).unwrap();
        match outcome {
            DualWriteOutcome::Committed { public, .. } => assert!(public.is_none()),
            other => panic!("expected Committed, got {other:?}"),
        }
    }

    #[test]
    fn test_distinct_versions_are_distinct_writes() {
        let (coordinator, _, _) = coordinator();
        let product_id = ProductId::new();
        let created = coordinator.execute(&create_op(product_id)).unwrap();
        let chain_id = created
            .public_outcome()
            .and_then(|o| o.return_value.as_str())
            .unwrap()
            .to_string();

        let transfer = |version: u64, owner: &str| LedgerOperation::Transfer {
            product_id,
            chain_id: Some(chain_id.clone()),
            version,
            new_owner: owner.to_string(),
            location: "Rotterdam".to_string(),
            timestamp: Timestamp::parse("2026-02-01T10:00:00Z").unwrap(),
        };

        let a = coordinator.execute(&transfer(2, "distributor-7")).unwrap();
        let b = coordinator.execute(&transfer(3, "retailer-2")).unwrap();
        assert_ne!(
            a.permissioned_receipt().tx_id,
            b.permissioned_receipt().tx_id
        );
    }
}
