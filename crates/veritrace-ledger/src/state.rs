//! # Ledger-State Capability
//!
//! The narrow world-state interface handler functions operate over:
//! `get`, `put`, `history_of`, and `query`. Handlers receive this
//! capability by injection, which keeps them plain functions — no base
//! contract type, no inheritance.
//!
//! `MemoryState` is the reference implementation: a keyed store that
//! retains every historical value per key, which is exactly the property
//! the history aggregator relies on.

use serde::{Deserialize, Serialize};

/// One historical value of a ledger key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedValue {
    /// The transaction that wrote this value.
    pub tx_id: String,
    /// The stored document bytes (JSON).
    pub value: Vec<u8>,
}

impl VersionedValue {
    /// Decode the stored document as JSON.
    pub fn as_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_slice(&self.value)
    }
}

/// World-state capability injected into handler functions.
pub trait LedgerState {
    /// Current value of `key`, if any.
    fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Write `value` under `key`, recording a new historical version.
    fn put(&mut self, key: &str, value: Vec<u8>);

    /// Every value ever written for `key`, oldest first.
    fn history_of(&self, key: &str) -> Vec<VersionedValue>;

    /// All current documents whose JSON fields match every field of
    /// `selector` (rich query over the state, CouchDB-selector style).
    fn query(&self, selector: &serde_json::Value) -> Vec<Vec<u8>>;
}

/// In-memory world state retaining full per-key history.
#[derive(Debug, Default)]
pub struct MemoryState {
    entries: std::collections::HashMap<String, Vec<VersionedValue>>,
    tx_counter: u64,
}

impl MemoryState {
    /// Create an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// The transaction id assigned to the most recent write.
    pub(crate) fn last_tx_id(&self) -> String {
        format!("tx-{:08}", self.tx_counter)
    }
}

impl LedgerState for MemoryState {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.entries
            .get(key)
            .and_then(|versions| versions.last())
            .map(|v| v.value.clone())
    }

    fn put(&mut self, key: &str, value: Vec<u8>) {
        self.tx_counter += 1;
        let tx_id = format!("tx-{:08}", self.tx_counter);
        self.entries
            .entry(key.to_string())
            .or_default()
            .push(VersionedValue { tx_id, value });
    }

    fn history_of(&self, key: &str) -> Vec<VersionedValue> {
        self.entries.get(key).cloned().unwrap_or_default()
    }

    fn query(&self, selector: &serde_json::Value) -> Vec<Vec<u8>> {
        let Some(fields) = selector.as_object() else {
            return Vec::new();
        };
        let mut keys: Vec<&String> = self.entries.keys().collect();
        keys.sort();
        keys.into_iter()
            .filter_map(|key| self.entries.get(key).and_then(|v| v.last()))
            .filter(|current| {
                serde_json::from_slice::<serde_json::Value>(&current.value)
                    .map(|doc| fields.iter().all(|(k, v)| doc.get(k) == Some(v)))
                    .unwrap_or(false)
            })
            .map(|current| current.value.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_returns_latest() {
        let mut state = MemoryState::new();
        state.put("k", b"one".to_vec());
        state.put("k", b"two".to_vec());
        assert_eq!(state.get("k").unwrap(), b"two");
    }

    #[test]
    fn test_history_preserves_all_versions_in_order() {
        let mut state = MemoryState::new();
        state.put("k", b"one".to_vec());
        state.put("k", b"two".to_vec());
        state.put("other", b"x".to_vec());

        let history = state.history_of("k");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].value, b"one");
        assert_eq!(history[1].value, b"two");
        assert_ne!(history[0].tx_id, history[1].tx_id);
    }

    #[test]
    fn test_history_of_missing_key_is_empty() {
        let state = MemoryState::new();
        assert!(state.history_of("missing").is_empty());
    }

    #[test]
    fn test_query_matches_selector_fields() {
        let mut state = MemoryState::new();
        state.put("a", br#"{"docType":"product","owner":"x"}"#.to_vec());
        state.put("b", br#"{"docType":"product","owner":"y"}"#.to_vec());
        state.put("c", br#"{"docType":"rule"}"#.to_vec());

        let products = state.query(&serde_json::json!({"docType": "product"}));
        assert_eq!(products.len(), 2);

        let owned = state.query(&serde_json::json!({"docType": "product", "owner": "x"}));
        assert_eq!(owned.len(), 1);
    }
}
