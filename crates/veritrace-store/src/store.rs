//! # Provenance Store
//!
//! In-memory keyed store with per-product optimistic concurrency.
//!
//! ## Concurrency
//!
//! A single `RwLock` guards the map; every mutation is a short read-modify-
//! write that never performs I/O while holding the lock. Serialization of
//! writers on the *same* product is enforced by the version counter: a
//! writer reads a product, computes its patch, and submits with the version
//! it read. If another writer committed in between, the version no longer
//! matches and the write fails with `Conflict` instead of overwriting.
//!
//! Append operations (tracking, certification, score) take no expected
//! version — they are commutative additions applied atomically under the
//! lock, and each still bumps the version.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use veritrace_core::{ActorId, ProductId, RuleId, Timestamp};

use crate::error::StoreError;
use crate::product::{
    Certification, EthicalScore, NewProduct, Product, ProductPatch, TrackingEntry,
    VerificationStatus,
};

/// Manufacturers reported by [`ProvenanceStore::statistics`].
const TOP_MANUFACTURER_LIMIT: usize = 5;

/// One page of search results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchPage {
    /// Matching products for this page, newest first.
    pub items: Vec<Product>,
    /// Total matches across all pages.
    pub total: usize,
    /// 1-based page index.
    pub page: usize,
    /// Page size.
    pub limit: usize,
}

/// Date-ranged aggregate statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductStatistics {
    /// Products created within the range.
    pub total_products: usize,
    /// Mean of the products' overall ethical scores; `0.0` when empty.
    pub average_ethical_score: f64,
    /// Up to five manufacturers, ranked by product count.
    pub top_manufacturers: Vec<String>,
}

#[derive(Debug, Default)]
struct StoreInner {
    products: HashMap<ProductId, Product>,
    /// batch number -> product id, enforcing global batch uniqueness.
    batch_index: HashMap<String, ProductId>,
}

/// The off-chain authoritative store of product state.
#[derive(Debug, Default)]
pub struct ProvenanceStore {
    inner: RwLock<StoreInner>,
}

impl ProvenanceStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // A poisoned lock means a panic elsewhere, not corrupt data: every
    // critical section either fully applies a mutation or leaves the
    // record untouched. Recover the guard instead of propagating.
    fn read(&self) -> RwLockReadGuard<'_, StoreInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// `DuplicateBatch` if the batch number is already taken.
    pub fn create(&self, input: NewProduct) -> Result<Product, StoreError> {
        let mut inner = self.write();
        let batch_key = input.batch_number.as_str().to_string();
        if inner.batch_index.contains_key(&batch_key) {
            return Err(StoreError::DuplicateBatch { batch: batch_key });
        }

        let id = ProductId::new();
        let product = Product::create(id, input, Timestamp::now());
        inner.batch_index.insert(batch_key, id);
        inner.products.insert(id, product.clone());
        Ok(product)
    }

    /// Read a product by id.
    pub fn get(&self, id: ProductId) -> Result<Product, StoreError> {
        self.read()
            .products
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound { id: id.to_string() })
    }

    /// Apply a patch with optimistic concurrency.
    ///
    /// # Errors
    ///
    /// `Conflict` when `expected_version` is stale — the write is not
    /// applied and the caller should re-read.
    pub fn update(
        &self,
        id: ProductId,
        patch: ProductPatch,
        expected_version: u64,
    ) -> Result<Product, StoreError> {
        self.mutate_versioned(id, expected_version, |product| {
            if let Some(name) = patch.name {
                product.name = name;
            }
            if let Some(location) = patch.location {
                product.location = location;
            }
            Ok(())
        })
    }

    /// Transfer custody: updates owner and location and appends exactly one
    /// tracking entry, atomically.
    pub fn transfer(
        &self,
        id: ProductId,
        new_owner: ActorId,
        location: String,
        expected_version: u64,
    ) -> Result<Product, StoreError> {
        self.mutate_versioned(id, expected_version, |product| {
            // A future-dated telemetry entry must not leave the history
            // unsorted when the wall clock catches up.
            let timestamp = product
                .tracking_history
                .last()
                .map_or_else(Timestamp::now, |last| Timestamp::now().max(last.timestamp));
            product.current_owner = new_owner.clone();
            product.location = location.clone();
            product.tracking_history.push(TrackingEntry {
                owner: new_owner.clone(),
                location: location.clone(),
                timestamp,
            });
            Ok(())
        })
    }

    /// Append a custody entry (telemetry-driven movement).
    ///
    /// # Errors
    ///
    /// `OutOfOrder` when the entry is dated before the latest recorded
    /// entry — the history stays chronologically ordered and the record is
    /// untouched.
    pub fn append_tracking(
        &self,
        id: ProductId,
        entry: TrackingEntry,
    ) -> Result<Product, StoreError> {
        self.mutate(id, |product| {
            if let Some(last) = product.tracking_history.last() {
                if entry.timestamp < last.timestamp {
                    return Err(StoreError::OutOfOrder {
                        last: last.timestamp.to_iso8601(),
                        attempted: entry.timestamp.to_iso8601(),
                    });
                }
            }
            product.location = entry.location.clone();
            product.tracking_history.push(entry.clone());
            Ok(())
        })
    }

    /// Append a certification.
    pub fn append_certification(
        &self,
        id: ProductId,
        cert: Certification,
    ) -> Result<Product, StoreError> {
        self.mutate(id, |product| {
            product.certifications.push(cert.clone());
            Ok(())
        })
    }

    /// Append an ethical score and recompute the derived overall score.
    pub fn append_ethical_score(
        &self,
        id: ProductId,
        score: EthicalScore,
    ) -> Result<Product, StoreError> {
        self.mutate(id, |product| {
            product.ethical_scores.push(score.clone());
            product.recompute_overall_score();
            Ok(())
        })
    }

    /// Record ledger cross-references after successful ledger writes.
    /// Only fills fields present in `refs`; existing references survive.
    pub fn record_ledger_refs(
        &self,
        id: ProductId,
        permissioned_tx_ref: Option<String>,
        public_ledger_id: Option<String>,
    ) -> Result<Product, StoreError> {
        self.mutate(id, |product| {
            if let Some(tx) = permissioned_tx_ref.clone() {
                product.ledger_refs.permissioned_tx_ref = Some(tx);
            }
            if let Some(pid) = public_ledger_id.clone() {
                product.ledger_refs.public_ledger_id = Some(pid);
            }
            Ok(())
        })
    }

    /// Cache the outcome of a verification decision on the product.
    pub fn record_verification(
        &self,
        id: ProductId,
        status: VerificationStatus,
        decided_at: Timestamp,
        rule: Option<RuleId>,
    ) -> Result<Product, StoreError> {
        self.mutate(id, |product| {
            product.verification_status = Some(status);
            product.last_verification_date = Some(decided_at);
            if let Some(rule_id) = rule {
                product.last_applied_rule = Some(rule_id);
            }
            Ok(())
        })
    }

    /// Case-insensitive substring search over name, manufacturer, and batch
    /// number, newest first.
    pub fn search(&self, query: &str, page: usize, limit: usize) -> SearchPage {
        let needle = query.to_lowercase();
        let inner = self.read();

        let mut matches: Vec<&Product> = inner
            .products
            .values()
            .filter(|p| {
                p.name.to_lowercase().contains(&needle)
                    || p.manufacturer.to_lowercase().contains(&needle)
                    || p.batch_number.as_str().to_lowercase().contains(&needle)
            })
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.0.cmp(&b.id.0)));

        let total = matches.len();
        let page = page.max(1);
        let limit = limit.max(1);
        let items = matches
            .into_iter()
            .skip((page - 1) * limit)
            .take(limit)
            .cloned()
            .collect();

        SearchPage {
            items,
            total,
            page,
            limit,
        }
    }

    /// Aggregate statistics over products created within `[start, end]`.
    pub fn statistics(&self, start: Timestamp, end: Timestamp) -> ProductStatistics {
        let inner = self.read();
        let in_range: Vec<&Product> = inner
            .products
            .values()
            .filter(|p| p.created_at >= start && p.created_at <= end)
            .collect();

        if in_range.is_empty() {
            return ProductStatistics {
                total_products: 0,
                average_ethical_score: 0.0,
                top_manufacturers: Vec::new(),
            };
        }

        let total_products = in_range.len();
        let average_ethical_score =
            in_range.iter().map(|p| p.overall_ethical_score).sum::<f64>() / total_products as f64;

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for p in &in_range {
            *counts.entry(p.manufacturer.as_str()).or_insert(0) += 1;
        }
        let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        let top_manufacturers = ranked
            .into_iter()
            .take(TOP_MANUFACTURER_LIMIT)
            .map(|(name, _)| name.to_string())
            .collect();

        ProductStatistics {
            total_products,
            average_ethical_score,
            top_manufacturers,
        }
    }

    /// Versioned read-modify-write. Fails with `Conflict` on a stale
    /// expected version; bumps the version on success.
    fn mutate_versioned(
        &self,
        id: ProductId,
        expected_version: u64,
        apply: impl FnOnce(&mut Product) -> Result<(), StoreError>,
    ) -> Result<Product, StoreError> {
        let mut inner = self.write();
        let product = inner
            .products
            .get_mut(&id)
            .ok_or(StoreError::NotFound { id: id.to_string() })?;

        if product.version != expected_version {
            return Err(StoreError::Conflict {
                expected: expected_version,
                actual: product.version,
            });
        }

        apply(product)?;
        product.version += 1;
        Ok(product.clone())
    }

    /// Unconditional read-modify-write for append operations; still bumps
    /// the version.
    fn mutate(
        &self,
        id: ProductId,
        apply: impl FnOnce(&mut Product) -> Result<(), StoreError>,
    ) -> Result<Product, StoreError> {
        let mut inner = self.write();
        let product = inner
            .products
            .get_mut(&id)
            .ok_or(StoreError::NotFound { id: id.to_string() })?;

        apply(product)?;
        product.version += 1;
        Ok(product.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use proptest::prelude::*;

    use super::*;
    use veritrace_core::BatchNumber;

    fn input(batch: &str) -> NewProduct {
        NewProduct {
            name: "Organic cocoa".to_string(),
            manufacturer: "Kuapa Kokoo".to_string(),
            owner: ActorId::new("actor-kuapa").unwrap(),
            manufacturing_date: Timestamp::parse("2026-01-05T00:00:00Z").unwrap(),
            batch_number: BatchNumber::new(batch).unwrap(),
            location: "Kumasi, Ghana".to_string(),
        }
    }

    fn score(value: f64) -> EthicalScore {
        EthicalScore::new(
            "labor",
            value,
            Timestamp::now(),
            ActorId::new("assessor-1").unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_create_and_get() {
        let store = ProvenanceStore::new();
        let created = store.create(input("LOT-1")).unwrap();
        let fetched = store.get(created.id).unwrap();
        assert_eq!(fetched.version, 1);
        assert_eq!(fetched.batch_number.as_str(), "LOT-1");
    }

    #[test]
    fn test_duplicate_batch_rejected() {
        let store = ProvenanceStore::new();
        store.create(input("LOT-1")).unwrap();
        match store.create(input("LOT-1")) {
            Err(StoreError::DuplicateBatch { batch }) => assert_eq!(batch, "LOT-1"),
            other => panic!("expected DuplicateBatch, got {other:?}"),
        }
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let store = ProvenanceStore::new();
        assert!(matches!(
            store.get(ProductId::new()),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_update_bumps_version() {
        let store = ProvenanceStore::new();
        let p = store.create(input("LOT-1")).unwrap();
        let patch = ProductPatch {
            name: Some("Organic cocoa nibs".to_string()),
            location: None,
        };
        let updated = store.update(p.id, patch, p.version).unwrap();
        assert_eq!(updated.version, 2);
        assert_eq!(updated.name, "Organic cocoa nibs");
    }

    #[test]
    fn test_stale_version_conflicts() {
        let store = ProvenanceStore::new();
        let p = store.create(input("LOT-1")).unwrap();
        store
            .update(p.id, ProductPatch::default(), p.version)
            .unwrap();

        // Second writer still holds version 1.
        match store.update(p.id, ProductPatch::default(), p.version) {
            Err(StoreError::Conflict { expected, actual }) => {
                assert_eq!(expected, 1);
                assert_eq!(actual, 2);
            }
            other => panic!("expected Conflict, got {other:?}"),
        }
    }

    #[test]
    fn test_concurrent_transfers_exactly_one_wins() {
        let store = Arc::new(ProvenanceStore::new());
        let p = store.create(input("LOT-1")).unwrap();

        let handles: Vec<_> = (0..2)
            .map(|i| {
                let store = Arc::clone(&store);
                let id = p.id;
                let version = p.version;
                std::thread::spawn(move || {
                    store.transfer(
                        id,
                        ActorId::new(format!("carrier-{i}")).unwrap(),
                        format!("warehouse-{i}"),
                        version,
                    )
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let successes = results.iter().filter(|r| r.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(StoreError::Conflict { .. })))
            .count();
        assert_eq!(successes, 1);
        assert_eq!(conflicts, 1);

        let final_state = store.get(p.id).unwrap();
        assert_eq!(final_state.version, 2);
        assert_eq!(final_state.tracking_history.len(), 2);
    }

    #[test]
    fn test_transfer_appends_exactly_one_entry_and_preserves_prior() {
        let store = ProvenanceStore::new();
        let p = store.create(input("LOT-1")).unwrap();
        let original_entry = p.tracking_history[0].clone();

        let after = store
            .transfer(
                p.id,
                ActorId::new("distributor-1").unwrap(),
                "Rotterdam".to_string(),
                p.version,
            )
            .unwrap();

        assert_eq!(after.tracking_history.len(), 2);
        assert_eq!(after.tracking_history[0], original_entry);
        assert_eq!(after.tracking_history[1].location, "Rotterdam");
        assert_eq!(after.current_owner.as_str(), "distributor-1");
    }

    #[test]
    fn test_append_tracking_rejects_entries_dated_before_latest() {
        let store = ProvenanceStore::new();
        let p = store.create(input("LOT-1")).unwrap();

        let stale = TrackingEntry {
            owner: p.current_owner.clone(),
            location: "somewhere past".to_string(),
            timestamp: Timestamp::parse("2020-01-01T00:00:00Z").unwrap(),
        };
        match store.append_tracking(p.id, stale) {
            Err(StoreError::OutOfOrder { attempted, .. }) => {
                assert_eq!(attempted, "2020-01-01T00:00:00Z");
            }
            other => panic!("expected OutOfOrder, got {other:?}"),
        }

        // Nothing was recorded.
        let unchanged = store.get(p.id).unwrap();
        assert_eq!(unchanged.version, p.version);
        assert_eq!(unchanged.tracking_history.len(), 1);
    }

    #[test]
    fn test_append_tracking_accepts_equal_timestamps() {
        let store = ProvenanceStore::new();
        let p = store.create(input("LOT-1")).unwrap();
        let same_instant = TrackingEntry {
            owner: p.current_owner.clone(),
            location: "same dock".to_string(),
            timestamp: p.tracking_history[0].timestamp,
        };
        let after = store.append_tracking(p.id, same_instant).unwrap();
        assert_eq!(after.tracking_history.len(), 2);
    }

    #[test]
    fn test_append_ethical_score_recomputes_mean() {
        let store = ProvenanceStore::new();
        let p = store.create(input("LOT-1")).unwrap();
        store.append_ethical_score(p.id, score(90.0)).unwrap();
        let after = store.append_ethical_score(p.id, score(70.0)).unwrap();
        assert!((after.overall_ethical_score - 80.0).abs() < 1e-9);
        assert_eq!(after.version, 3);
    }

    #[test]
    fn test_record_ledger_refs_merges() {
        let store = ProvenanceStore::new();
        let p = store.create(input("LOT-1")).unwrap();
        store
            .record_ledger_refs(p.id, Some("tx-abc".to_string()), None)
            .unwrap();
        let after = store
            .record_ledger_refs(p.id, None, Some("chain-7".to_string()))
            .unwrap();
        assert_eq!(after.ledger_refs.permissioned_tx_ref.as_deref(), Some("tx-abc"));
        assert_eq!(after.ledger_refs.public_ledger_id.as_deref(), Some("chain-7"));
    }

    #[test]
    fn test_search_matches_name_manufacturer_batch() {
        let store = ProvenanceStore::new();
        store.create(input("LOT-A1")).unwrap();
        let mut other = input("LOT-B2");
        other.name = "Arabica beans".to_string();
        other.manufacturer = "Highland Farms".to_string();
        store.create(other).unwrap();

        assert_eq!(store.search("cocoa", 1, 10).total, 1);
        assert_eq!(store.search("highland", 1, 10).total, 1);
        assert_eq!(store.search("lot-", 1, 10).total, 2);
        assert_eq!(store.search("nothing", 1, 10).total, 0);
    }

    #[test]
    fn test_search_pagination() {
        let store = ProvenanceStore::new();
        for i in 0..5 {
            store.create(input(&format!("LOT-{i}"))).unwrap();
        }
        let page = store.search("lot", 2, 2);
        assert_eq!(page.total, 5);
        assert_eq!(page.items.len(), 2);
        let last = store.search("lot", 3, 2);
        assert_eq!(last.items.len(), 1);
    }

    #[test]
    fn test_statistics_empty_range() {
        let store = ProvenanceStore::new();
        store.create(input("LOT-1")).unwrap();
        let stats = store.statistics(
            Timestamp::parse("2000-01-01T00:00:00Z").unwrap(),
            Timestamp::parse("2000-12-31T00:00:00Z").unwrap(),
        );
        assert_eq!(stats.total_products, 0);
        assert_eq!(stats.average_ethical_score, 0.0);
        assert!(stats.top_manufacturers.is_empty());
    }

    #[test]
    fn test_statistics_aggregates() {
        let store = ProvenanceStore::new();
        let a = store.create(input("LOT-1")).unwrap();
        let mut other = input("LOT-2");
        other.manufacturer = "Highland Farms".to_string();
        store.create(other).unwrap();
        store.append_ethical_score(a.id, score(50.0)).unwrap();

        let stats = store.statistics(
            Timestamp::parse("2000-01-01T00:00:00Z").unwrap(),
            Timestamp::parse("2100-01-01T00:00:00Z").unwrap(),
        );
        assert_eq!(stats.total_products, 2);
        assert!((stats.average_ethical_score - 25.0).abs() < 1e-9);
        assert_eq!(stats.top_manufacturers.len(), 2);
    }

    proptest! {
        #[test]
        fn prop_overall_score_is_mean(values in proptest::collection::vec(0.0f64..=100.0, 1..20)) {
            let store = ProvenanceStore::new();
            let p = store.create(input("LOT-PROP")).unwrap();
            let mut last = None;
            for v in &values {
                last = Some(store.append_ethical_score(p.id, score(*v)).unwrap());
            }
            let expected = values.iter().sum::<f64>() / values.len() as f64;
            let got = last.unwrap().overall_ethical_score;
            prop_assert!((got - expected).abs() < 1e-9);
        }

        #[test]
        fn prop_tracking_history_is_append_only(transfers in 1usize..8) {
            let store = ProvenanceStore::new();
            let p = store.create(input("LOT-PROP")).unwrap();
            let mut version = p.version;
            let mut snapshots = vec![store.get(p.id).unwrap().tracking_history];

            for i in 0..transfers {
                let after = store.transfer(
                    p.id,
                    ActorId::new(format!("owner-{i}")).unwrap(),
                    format!("site-{i}"),
                    version,
                ).unwrap();
                version = after.version;
                snapshots.push(after.tracking_history);
            }

            // Every snapshot is a strict prefix of the next.
            for pair in snapshots.windows(2) {
                prop_assert_eq!(&pair[1][..pair[0].len()], &pair[0][..]);
                prop_assert_eq!(pair[1].len(), pair[0].len() + 1);
            }
        }
    }
}
