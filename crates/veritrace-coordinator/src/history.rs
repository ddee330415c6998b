//! # Side-by-Side History
//!
//! Reconstructs a product's story from both ledgers without merging them.
//!
//! ## Invariant
//!
//! The two ledgers have independent clocks and incompatible record shapes,
//! so their histories are returned side by side, each in its own
//! ledger-native order. Interleaving them would fabricate an ordering
//! neither ledger attests to.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use veritrace_core::ProductId;
use veritrace_ledger::{LedgerError, LedgerEvent, PermissionedLedger, PublicLedger};

use crate::error::CoordinatorError;

/// One historical state from the permissioned ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionedRecord {
    /// Transaction that wrote this state.
    pub tx_id: String,
    /// The full product document as of that transaction.
    pub state: serde_json::Value,
}

/// A product's history on both ledgers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductHistory {
    /// The product.
    pub product_id: ProductId,
    /// Every permissioned state, oldest first.
    pub permissioned: Vec<PermissionedRecord>,
    /// Every public contract event, in emission order.
    pub public_events: Vec<LedgerEvent>,
}

/// Reads histories from both ledgers.
pub struct HistoryAggregator {
    permissioned: Arc<dyn PermissionedLedger>,
    public: Arc<dyn PublicLedger>,
    identity: String,
}

impl HistoryAggregator {
    /// Aggregator reading as `identity` on the permissioned ledger.
    pub fn new(
        permissioned: Arc<dyn PermissionedLedger>,
        public: Arc<dyn PublicLedger>,
        identity: impl Into<String>,
    ) -> Self {
        Self {
            permissioned,
            public,
            identity: identity.into(),
        }
    }

    /// Fetch both histories for a product.
    ///
    /// `chain_id` is the public contract's id for the product, when the
    /// product ever reached the public ledger. A product unknown to one
    /// ledger contributes an empty side; a product unknown to both is
    /// `UnknownProduct`.
    ///
    /// # Errors
    ///
    /// `HistoryRead` when a ledger fails for any reason other than not
    /// knowing the product.
    pub fn fetch(
        &self,
        product_id: &ProductId,
        chain_id: Option<&str>,
    ) -> Result<ProductHistory, CoordinatorError> {
        let permissioned = self.permissioned_history(product_id)?;
        let public_events = match chain_id {
            Some(chain_id) => self.public_history(chain_id)?,
            None => Vec::new(),
        };

        if permissioned.is_empty() && public_events.is_empty() {
            return Err(CoordinatorError::UnknownProduct {
                product_id: product_id.to_string(),
            });
        }

        Ok(ProductHistory {
            product_id: *product_id,
            permissioned,
            public_events,
        })
    }

    fn permissioned_history(
        &self,
        product_id: &ProductId,
    ) -> Result<Vec<PermissionedRecord>, CoordinatorError> {
        let session = self
            .permissioned
            .connect(&self.identity)
            .map_err(|source| CoordinatorError::HistoryRead {
                ledger: "permissioned",
                source,
            })?;
        let versions = session.history(&product_id.to_string()).map_err(|source| {
            CoordinatorError::HistoryRead {
                ledger: "permissioned",
                source,
            }
        })?;

        versions
            .into_iter()
            .map(|v| {
                let state = v
                    .as_json()
                    .map_err(|e| CoordinatorError::MalformedReply(e.to_string()))?;
                Ok(PermissionedRecord {
                    tx_id: v.tx_id,
                    state,
                })
            })
            .collect()
    }

    fn public_history(&self, chain_id: &str) -> Result<Vec<LedgerEvent>, CoordinatorError> {
        let reply = match self
            .public
            .call("getProductHistory", &[serde_json::json!(chain_id)])
        {
            Ok(reply) => reply,
            // The contract reverts for unknown products; that is an empty
            // side here, not a read failure.
            Err(LedgerError::Rejected(_)) => return Ok(Vec::new()),
            Err(source) => {
                return Err(CoordinatorError::HistoryRead {
                    ledger: "public",
                    source,
                })
            }
        };

        serde_json::from_value(reply).map_err(|e| CoordinatorError::MalformedReply(e.to_string()))
    }
}
