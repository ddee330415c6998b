//! # Permissioned-Ledger Handlers
//!
//! The business logic installed on the permissioned ledger, written as
//! plain functions over the injected [`LedgerState`](crate::state::LedgerState)
//! capability. Each handler takes the submitted argument list, validates
//! arity, and reads/writes JSON documents in the world state.
//!
//! - `tracking` — product lifecycle: create, query, update, transfer,
//!   authenticity code verification, telemetry.
//! - `sourcing` — certifications and ethical scores.

pub mod sourcing;
pub mod tracking;

use sha2::{Digest, Sha256};

use crate::error::LedgerError;
use crate::state::LedgerState;

/// Compute the product verification code: the hex SHA-256 of the product
/// key concatenated with the ISO8601 manufacturing date.
///
/// Both ledgers verify authenticity against this code, and manufacturers
/// derive it when labeling physical goods.
pub fn verification_code(product_key: &str, manufacturing_date_iso: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(product_key.as_bytes());
    hasher.update(manufacturing_date_iso.as_bytes());
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Fetch the `i`-th argument or fail with a deterministic rejection.
pub(crate) fn arg<'a>(args: &'a [String], i: usize, name: &str) -> Result<&'a str, LedgerError> {
    args.get(i)
        .map(String::as_str)
        .ok_or_else(|| LedgerError::Rejected(format!("missing argument {i}: {name}")))
}

/// Read and decode the JSON document stored under `key`.
pub(crate) fn get_doc(
    state: &dyn LedgerState,
    key: &str,
) -> Result<serde_json::Value, LedgerError> {
    let bytes = state
        .get(key)
        .ok_or_else(|| LedgerError::Rejected(format!("{key} does not exist")))?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Encode and store a JSON document under `key`.
pub(crate) fn put_doc(
    state: &mut dyn LedgerState,
    key: &str,
    doc: &serde_json::Value,
) -> Result<(), LedgerError> {
    state.put(key, serde_json::to_vec(doc)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verification_code_is_deterministic() {
        let a = verification_code("product:abc", "2026-01-10T00:00:00Z");
        let b = verification_code("product:abc", "2026-01-10T00:00:00Z");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_verification_code_depends_on_both_inputs() {
        let base = verification_code("product:abc", "2026-01-10T00:00:00Z");
        assert_ne!(base, verification_code("product:xyz", "2026-01-10T00:00:00Z"));
        assert_ne!(base, verification_code("product:abc", "2026-01-11T00:00:00Z"));
    }
}
