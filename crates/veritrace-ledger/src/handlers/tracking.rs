//! # Product Tracking Handlers
//!
//! Product lifecycle logic on the permissioned ledger: creation, custody
//! transfer, updates, authenticity code verification, and telemetry
//! folding. Documents are keyed by the product key (`product:<uuid>`) and
//! tagged `docType: "product"` for rich queries.
//!
//! Handlers never read the wall clock — timestamps arrive as arguments so
//! every endorsing peer computes the identical write set.

use crate::error::LedgerError;
use crate::handlers::{arg, get_doc, put_doc, verification_code};
use crate::state::LedgerState;

/// `createProduct(id, name, manufacturer, manufacturingDate, batchNumber, owner, location, timestamp)`
///
/// Seeds the tracking history with the manufacturer as first custodian.
/// Rejects an already-existing key: creation is not an upsert.
pub fn create_product(
    state: &mut dyn LedgerState,
    args: &[String],
) -> Result<Vec<u8>, LedgerError> {
    let id = arg(args, 0, "id")?;
    let name = arg(args, 1, "name")?;
    let manufacturer = arg(args, 2, "manufacturer")?;
    let manufacturing_date = arg(args, 3, "manufacturingDate")?;
    let batch_number = arg(args, 4, "batchNumber")?;
    let owner = arg(args, 5, "owner")?;
    let location = arg(args, 6, "location")?;
    let timestamp = arg(args, 7, "timestamp")?;

    if state.get(id).is_some() {
        return Err(LedgerError::Rejected(format!("{id} already exists")));
    }

    let product = serde_json::json!({
        "id": id,
        "name": name,
        "manufacturer": manufacturer,
        "manufacturingDate": manufacturing_date,
        "batchNumber": batch_number,
        "currentOwner": owner,
        "location": location,
        "trackingHistory": [{
            "owner": owner,
            "location": location,
            "timestamp": timestamp,
        }],
        "docType": "product",
    });
    put_doc(state, id, &product)?;
    Ok(Vec::new())
}

/// `queryProduct(id)` — the current product document.
pub fn query_product(state: &dyn LedgerState, args: &[String]) -> Result<Vec<u8>, LedgerError> {
    let id = arg(args, 0, "id")?;
    state
        .get(id)
        .ok_or_else(|| LedgerError::Rejected(format!("{id} does not exist")))
}

/// `updateProduct(id, patchJson, updatedBy)`
///
/// Applies the name/location fields of the patch document. Other patch
/// fields are ignored rather than rejected, matching an open-world patch.
pub fn update_product(
    state: &mut dyn LedgerState,
    args: &[String],
) -> Result<Vec<u8>, LedgerError> {
    let id = arg(args, 0, "id")?;
    let patch: serde_json::Value = serde_json::from_str(arg(args, 1, "patch")?)?;
    let updated_by = arg(args, 2, "updatedBy")?;

    let mut product = get_doc(state, id)?;
    for field in ["name", "location"] {
        if let Some(value) = patch.get(field) {
            product[field] = value.clone();
        }
    }
    product["lastUpdatedBy"] = serde_json::Value::String(updated_by.to_string());
    put_doc(state, id, &product)?;
    Ok(Vec::new())
}

/// `transferProduct(id, newOwner, location, timestamp)`
///
/// Updates custody and appends exactly one tracking entry.
pub fn transfer_product(
    state: &mut dyn LedgerState,
    args: &[String],
) -> Result<Vec<u8>, LedgerError> {
    let id = arg(args, 0, "id")?;
    let new_owner = arg(args, 1, "newOwner")?;
    let location = arg(args, 2, "location")?;
    let timestamp = arg(args, 3, "timestamp")?;

    let mut product = get_doc(state, id)?;
    product["currentOwner"] = serde_json::Value::String(new_owner.to_string());
    product["location"] = serde_json::Value::String(location.to_string());
    append_tracking_entry(&mut product, new_owner, location, timestamp, None)?;
    put_doc(state, id, &product)?;
    Ok(Vec::new())
}

/// `verifyProduct(id, verificationCode)`
///
/// Recomputes the expected code from the stored document and compares.
/// Returns `{"isAuthentic": bool, "detail": ...}` — never a bare boolean.
pub fn verify_product(state: &dyn LedgerState, args: &[String]) -> Result<Vec<u8>, LedgerError> {
    let id = arg(args, 0, "id")?;
    let presented = arg(args, 1, "verificationCode")?;

    let product = get_doc(state, id)?;
    let manufacturing_date = product["manufacturingDate"].as_str().ok_or_else(|| {
        LedgerError::Serialization(format!("{id}: manufacturingDate missing or not a string"))
    })?;
    let expected = verification_code(id, manufacturing_date);
    let is_authentic = expected == presented;

    let result = serde_json::json!({
        "isAuthentic": is_authentic,
        "detail": if is_authentic {
            "verification code matches manufacturing record"
        } else {
            "verification code does not match manufacturing record"
        },
    });
    Ok(serde_json::to_vec(&result)?)
}

/// `recordTelemetry(id, deviceId, timestamp, measurementsJson, location)`
///
/// Folds a telemetry event into the tracking history. The custodian is
/// unchanged; the location moves with the device reading.
pub fn record_telemetry(
    state: &mut dyn LedgerState,
    args: &[String],
) -> Result<Vec<u8>, LedgerError> {
    let id = arg(args, 0, "id")?;
    let device_id = arg(args, 1, "deviceId")?;
    let timestamp = arg(args, 2, "timestamp")?;
    let measurements: serde_json::Value = serde_json::from_str(arg(args, 3, "measurements")?)?;
    let location = arg(args, 4, "location")?;

    let mut product = get_doc(state, id)?;
    let owner = product["currentOwner"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    product["location"] = serde_json::Value::String(location.to_string());
    append_tracking_entry(
        &mut product,
        &owner,
        location,
        timestamp,
        Some(serde_json::json!({ "deviceId": device_id, "measurements": measurements })),
    )?;
    put_doc(state, id, &product)?;
    Ok(Vec::new())
}

fn append_tracking_entry(
    product: &mut serde_json::Value,
    owner: &str,
    location: &str,
    timestamp: &str,
    telemetry: Option<serde_json::Value>,
) -> Result<(), LedgerError> {
    let mut entry = serde_json::json!({
        "owner": owner,
        "location": location,
        "timestamp": timestamp,
    });
    if let Some(t) = telemetry {
        entry["telemetry"] = t;
    }
    product["trackingHistory"]
        .as_array_mut()
        .ok_or_else(|| LedgerError::Serialization("trackingHistory is not an array".to_string()))?
        .push(entry);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MemoryState;

    fn create_args(id: &str) -> Vec<String> {
        vec![
            id.to_string(),
            "Organic cocoa".to_string(),
            "Kuapa Kokoo".to_string(),
            "2026-01-05T00:00:00Z".to_string(),
            "LOT-1".to_string(),
            "actor-kuapa".to_string(),
            "Kumasi, Ghana".to_string(),
            "2026-01-06T08:00:00Z".to_string(),
        ]
    }

    #[test]
    fn test_create_then_query() {
        let mut state = MemoryState::new();
        create_product(&mut state, &create_args("product:1")).unwrap();
        let bytes = query_product(&state, &["product:1".to_string()]).unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(doc["batchNumber"], "LOT-1");
        assert_eq!(doc["trackingHistory"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_create_rejects_existing_key() {
        let mut state = MemoryState::new();
        create_product(&mut state, &create_args("product:1")).unwrap();
        assert!(matches!(
            create_product(&mut state, &create_args("product:1")),
            Err(LedgerError::Rejected(_))
        ));
    }

    #[test]
    fn test_query_missing_rejected() {
        let state = MemoryState::new();
        assert!(matches!(
            query_product(&state, &["product:404".to_string()]),
            Err(LedgerError::Rejected(_))
        ));
    }

    #[test]
    fn test_transfer_appends_history() {
        let mut state = MemoryState::new();
        create_product(&mut state, &create_args("product:1")).unwrap();
        transfer_product(
            &mut state,
            &[
                "product:1".to_string(),
                "distributor-1".to_string(),
                "Rotterdam".to_string(),
                "2026-01-20T10:00:00Z".to_string(),
            ],
        )
        .unwrap();

        let doc = get_doc(&state, "product:1").unwrap();
        assert_eq!(doc["currentOwner"], "distributor-1");
        let history = doc["trackingHistory"].as_array().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0]["owner"], "actor-kuapa");
        assert_eq!(history[1]["location"], "Rotterdam");
    }

    #[test]
    fn test_transfer_writes_new_ledger_version() {
        let mut state = MemoryState::new();
        create_product(&mut state, &create_args("product:1")).unwrap();
        transfer_product(
            &mut state,
            &[
                "product:1".to_string(),
                "distributor-1".to_string(),
                "Rotterdam".to_string(),
                "2026-01-20T10:00:00Z".to_string(),
            ],
        )
        .unwrap();
        assert_eq!(state.history_of("product:1").len(), 2);
    }

    #[test]
    fn test_verify_product_roundtrip() {
        let mut state = MemoryState::new();
        create_product(&mut state, &create_args("product:1")).unwrap();

        let good = verification_code("product:1", "2026-01-05T00:00:00Z");
        let bytes = verify_product(&state, &["product:1".to_string(), good]).unwrap();
        let result: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(result["isAuthentic"], true);

        let bytes = verify_product(&state, &["product:1".to_string(), "wrong".to_string()])
            .unwrap();
        let result: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(result["isAuthentic"], false);
        assert!(result["detail"].is_string());
    }

    #[test]
    fn test_update_applies_known_fields_only() {
        let mut state = MemoryState::new();
        create_product(&mut state, &create_args("product:1")).unwrap();
        update_product(
            &mut state,
            &[
                "product:1".to_string(),
                r#"{"name":"Cocoa nibs","batchNumber":"HACKED"}"#.to_string(),
                "editor-1".to_string(),
            ],
        )
        .unwrap();

        let doc = get_doc(&state, "product:1").unwrap();
        assert_eq!(doc["name"], "Cocoa nibs");
        assert_eq!(doc["batchNumber"], "LOT-1");
        assert_eq!(doc["lastUpdatedBy"], "editor-1");
    }

    #[test]
    fn test_record_telemetry_folds_into_history() {
        let mut state = MemoryState::new();
        create_product(&mut state, &create_args("product:1")).unwrap();
        record_telemetry(
            &mut state,
            &[
                "product:1".to_string(),
                "sensor-42".to_string(),
                "2026-01-21T00:00:00Z".to_string(),
                r#"{"temperature": 4.2, "humidity": 61}"#.to_string(),
                "Cold chain truck 7".to_string(),
            ],
        )
        .unwrap();

        let doc = get_doc(&state, "product:1").unwrap();
        let history = doc["trackingHistory"].as_array().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1]["telemetry"]["deviceId"], "sensor-42");
        assert_eq!(history[1]["owner"], "actor-kuapa");
        assert_eq!(doc["location"], "Cold chain truck 7");
    }
}
