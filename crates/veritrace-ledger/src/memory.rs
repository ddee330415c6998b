//! # In-Memory Reference Ledgers
//!
//! Process-local implementations of both ledger traits. They carry the
//! real handler logic (not stubs) so the coordinator, verification engine,
//! and history aggregator can be exercised end to end without network
//! infrastructure. Fault injection via `fail_next` lets tests force the
//! partial-commit paths that define the dual-write protocol.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::LedgerError;
use crate::handlers::{sourcing, tracking, verification_code};
use crate::state::{LedgerState, MemoryState, VersionedValue};
use crate::traits::{
    InvokeOutcome, LedgerEvent, PermissionedLedger, PermissionedSession, PublicLedger, TxReceipt,
};

fn recover<'a, T>(
    guard: Result<MutexGuard<'a, T>, PoisonError<MutexGuard<'a, T>>>,
) -> MutexGuard<'a, T> {
    guard.unwrap_or_else(PoisonError::into_inner)
}

// ─── Permissioned Ledger ─────────────────────────────────────────────

/// In-memory permissioned ledger dispatching submitted function names to
/// the handlers in [`crate::handlers`].
#[derive(Debug, Default)]
pub struct InMemoryPermissionedLedger {
    state: Mutex<MemoryState>,
    faults: Mutex<VecDeque<LedgerError>>,
}

impl InMemoryPermissionedLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `err` to be returned by the next submit or history call.
    pub fn fail_next(&self, err: LedgerError) {
        recover(self.faults.lock()).push_back(err);
    }

    fn take_fault(&self) -> Option<LedgerError> {
        recover(self.faults.lock()).pop_front()
    }
}

impl PermissionedLedger for InMemoryPermissionedLedger {
    fn connect(&self, identity: &str) -> Result<Box<dyn PermissionedSession + '_>, LedgerError> {
        if identity.trim().is_empty() {
            return Err(LedgerError::Rejected(
                "identity is not enrolled: empty identity".to_string(),
            ));
        }
        Ok(Box::new(MemorySession { ledger: self }))
    }
}

struct MemorySession<'a> {
    ledger: &'a InMemoryPermissionedLedger,
}

impl PermissionedSession for MemorySession<'_> {
    fn submit(&mut self, function: &str, args: &[String]) -> Result<TxReceipt, LedgerError> {
        if let Some(err) = self.ledger.take_fault() {
            return Err(err);
        }

        let mut state = recover(self.ledger.state.lock());
        let handler: fn(&mut dyn LedgerState, &[String]) -> Result<Vec<u8>, LedgerError> =
            match function {
                "createProduct" => tracking::create_product,
                "updateProduct" => tracking::update_product,
                "transferProduct" => tracking::transfer_product,
                "recordTelemetry" => tracking::record_telemetry,
                "addCertification" => sourcing::add_certification,
                "addEthicalScore" => sourcing::add_ethical_score,
                other => {
                    return Err(LedgerError::Rejected(format!("unknown function: {other}")));
                }
            };

        handler(&mut *state, args)?;
        Ok(TxReceipt {
            tx_id: state.last_tx_id(),
        })
    }

    fn evaluate(&self, function: &str, args: &[String]) -> Result<Vec<u8>, LedgerError> {
        let state = recover(self.ledger.state.lock());
        match function {
            "queryProduct" => tracking::query_product(&*state, args),
            "verifyProduct" => tracking::verify_product(&*state, args),
            "verifyCertification" => sourcing::verify_certification(&*state, args),
            "getEthicalProfile" => sourcing::ethical_profile(&*state, args),
            other => Err(LedgerError::Rejected(format!("unknown function: {other}"))),
        }
    }

    fn history(&self, key: &str) -> Result<Vec<VersionedValue>, LedgerError> {
        if let Some(err) = self.ledger.take_fault() {
            return Err(err);
        }
        Ok(recover(self.ledger.state.lock()).history_of(key))
    }
}

// ─── Public Ledger ───────────────────────────────────────────────────

#[derive(Debug, Default)]
struct PublicState {
    next_id: u64,
    tx_counter: u64,
    products: HashMap<u64, serde_json::Value>,
    events: HashMap<u64, Vec<LedgerEvent>>,
}

impl PublicState {
    fn next_tx_ref(&mut self) -> String {
        self.tx_counter += 1;
        format!("0x{:016x}", self.tx_counter)
    }
}

/// In-memory public contract ledger: a product registry whose creation
/// call emits a `ProductCreated` event carrying the generated on-chain
/// identifier, mirroring how contract deployments hand back ids.
#[derive(Debug, Default)]
pub struct InMemoryPublicLedger {
    inner: Mutex<PublicState>,
    faults: Mutex<VecDeque<LedgerError>>,
}

impl InMemoryPublicLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `err` to be returned by the next `invoke`.
    pub fn fail_next(&self, err: LedgerError) {
        recover(self.faults.lock()).push_back(err);
    }

    fn take_fault(&self) -> Option<LedgerError> {
        recover(self.faults.lock()).pop_front()
    }
}

fn parse_chain_id(value: &serde_json::Value) -> Result<u64, LedgerError> {
    match value {
        serde_json::Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| LedgerError::Rejected(format!("invalid product id: {n}"))),
        serde_json::Value::String(s) => s
            .parse()
            .map_err(|_| LedgerError::Rejected(format!("invalid product id: {s}"))),
        other => Err(LedgerError::Rejected(format!(
            "invalid product id: {other}"
        ))),
    }
}

fn req<'a>(
    args: &'a [serde_json::Value],
    i: usize,
    name: &str,
) -> Result<&'a serde_json::Value, LedgerError> {
    args.get(i)
        .ok_or_else(|| LedgerError::Rejected(format!("missing argument {i}: {name}")))
}

impl PublicLedger for InMemoryPublicLedger {
    fn invoke(
        &self,
        method: &str,
        args: &[serde_json::Value],
    ) -> Result<InvokeOutcome, LedgerError> {
        if let Some(err) = self.take_fault() {
            return Err(err);
        }

        let mut state = recover(self.inner.lock());
        match method {
            "createProduct" => {
                let name = req(args, 0, "name")?.clone();
                let manufacturer = req(args, 1, "manufacturer")?.clone();
                let manufacturing_date = req(args, 2, "manufacturingDate")?.clone();
                let batch_number = req(args, 3, "batchNumber")?.clone();
                let metadata = req(args, 4, "metadata")?.clone();

                state.next_id += 1;
                let id = state.next_id;
                state.products.insert(
                    id,
                    serde_json::json!({
                        "id": id,
                        "name": name,
                        "manufacturer": manufacturer,
                        "manufacturingDate": manufacturing_date,
                        "batchNumber": batch_number,
                        "currentOwner": manufacturer,
                        "status": "Created",
                        "metadata": metadata,
                        "assessments": [],
                    }),
                );

                let event = LedgerEvent {
                    name: "ProductCreated".to_string(),
                    payload: serde_json::json!({ "productId": id.to_string() }),
                };
                state.events.entry(id).or_default().push(event.clone());
                Ok(InvokeOutcome {
                    tx_ref: state.next_tx_ref(),
                    events: vec![event],
                    return_value: serde_json::json!(id.to_string()),
                })
            }

            "transferProduct" => {
                let id = parse_chain_id(req(args, 0, "productId")?)?;
                let new_owner = req(args, 1, "newOwner")?.clone();
                let location = req(args, 2, "location")?.clone();

                let product = state
                    .products
                    .get_mut(&id)
                    .ok_or_else(|| LedgerError::Rejected(format!("product {id} does not exist")))?;
                product["currentOwner"] = new_owner.clone();
                product["status"] = serde_json::json!("InTransit");

                let event = LedgerEvent {
                    name: "ProductTransferred".to_string(),
                    payload: serde_json::json!({
                        "productId": id.to_string(),
                        "newOwner": new_owner,
                        "location": location,
                    }),
                };
                state.events.entry(id).or_default().push(event.clone());
                Ok(InvokeOutcome {
                    tx_ref: state.next_tx_ref(),
                    events: vec![event],
                    return_value: serde_json::Value::Null,
                })
            }

            "addCertification" => {
                let id = parse_chain_id(req(args, 0, "productId")?)?;
                let body = req(args, 1, "body")?.clone();
                let expiration_date = req(args, 2, "expirationDate")?.clone();

                if !state.products.contains_key(&id) {
                    return Err(LedgerError::Rejected(format!("product {id} does not exist")));
                }
                let event = LedgerEvent {
                    name: "CertificationAdded".to_string(),
                    payload: serde_json::json!({
                        "productId": id.to_string(),
                        "body": body,
                        "expirationDate": expiration_date,
                    }),
                };
                state.events.entry(id).or_default().push(event.clone());
                Ok(InvokeOutcome {
                    tx_ref: state.next_tx_ref(),
                    events: vec![event],
                    return_value: serde_json::Value::Null,
                })
            }

            "createAssessment" => {
                let id = parse_chain_id(req(args, 0, "productId")?)?;
                let category = req(args, 1, "category")?.clone();
                let score = req(args, 2, "score")?.clone();
                let evidence = req(args, 3, "evidence")?.clone();

                let product = state
                    .products
                    .get_mut(&id)
                    .ok_or_else(|| LedgerError::Rejected(format!("product {id} does not exist")))?;
                let assessments = product["assessments"].as_array_mut().ok_or_else(|| {
                    LedgerError::Serialization("assessments is not an array".to_string())
                })?;
                let assessment_id = assessments.len() as u64 + 1;
                assessments.push(serde_json::json!({
                    "assessmentId": assessment_id,
                    "category": category,
                    "score": score,
                    "evidence": evidence,
                }));

                let event = LedgerEvent {
                    name: "AssessmentCreated".to_string(),
                    payload: serde_json::json!({
                        "productId": id.to_string(),
                        "assessmentId": assessment_id.to_string(),
                    }),
                };
                state.events.entry(id).or_default().push(event.clone());
                Ok(InvokeOutcome {
                    tx_ref: state.next_tx_ref(),
                    events: vec![event],
                    return_value: serde_json::json!(assessment_id.to_string()),
                })
            }

            "recordTelemetry" => {
                let id = parse_chain_id(req(args, 0, "productId")?)?;
                let device_id = req(args, 1, "deviceId")?.clone();
                let timestamp = req(args, 2, "timestamp")?.clone();
                let measurements = req(args, 3, "measurements")?.clone();

                if !state.products.contains_key(&id) {
                    return Err(LedgerError::Rejected(format!("product {id} does not exist")));
                }
                let event = LedgerEvent {
                    name: "TelemetryRecorded".to_string(),
                    payload: serde_json::json!({
                        "productId": id.to_string(),
                        "deviceId": device_id,
                        "timestamp": timestamp,
                        "measurements": measurements,
                    }),
                };
                state.events.entry(id).or_default().push(event.clone());
                Ok(InvokeOutcome {
                    tx_ref: state.next_tx_ref(),
                    events: vec![event],
                    return_value: serde_json::Value::Null,
                })
            }

            other => Err(LedgerError::Rejected(format!("unknown method: {other}"))),
        }
    }

    fn call(
        &self,
        method: &str,
        args: &[serde_json::Value],
    ) -> Result<serde_json::Value, LedgerError> {
        let state = recover(self.inner.lock());
        match method {
            "getProduct" => {
                let id = parse_chain_id(req(args, 0, "productId")?)?;
                state
                    .products
                    .get(&id)
                    .cloned()
                    .ok_or_else(|| LedgerError::Rejected(format!("product {id} does not exist")))
            }

            "getProductHistory" => {
                let id = parse_chain_id(req(args, 0, "productId")?)?;
                if !state.products.contains_key(&id) {
                    return Err(LedgerError::Rejected(format!("product {id} does not exist")));
                }
                let events = state.events.get(&id).cloned().unwrap_or_default();
                Ok(serde_json::to_value(events)?)
            }

            "verifyProduct" => {
                let id = parse_chain_id(req(args, 0, "productId")?)?;
                let presented = req(args, 1, "verificationCode")?
                    .as_str()
                    .unwrap_or_default();

                let Some(product) = state.products.get(&id) else {
                    return Ok(serde_json::json!({
                        "isAuthentic": false,
                        "detail": format!("product {id} does not exist"),
                    }));
                };
                let metadata = &product["metadata"];
                let (Some(offchain_id), Some(date_iso)) = (
                    metadata["offchainId"].as_str(),
                    metadata["manufacturingDate"].as_str(),
                ) else {
                    return Ok(serde_json::json!({
                        "isAuthentic": false,
                        "detail": "product metadata lacks provenance anchors",
                    }));
                };

                let expected = verification_code(offchain_id, date_iso);
                let is_authentic = expected == presented;
                Ok(serde_json::json!({
                    "isAuthentic": is_authentic,
                    "detail": if is_authentic {
                        "verification code matches contract metadata"
                    } else {
                        "verification code does not match contract metadata"
                    },
                }))
            }

            "calculateEthicalScore" => {
                let id = parse_chain_id(req(args, 0, "productId")?)?;
                let product = state
                    .products
                    .get(&id)
                    .ok_or_else(|| LedgerError::Rejected(format!("product {id} does not exist")))?;
                let scores: Vec<f64> = product["assessments"]
                    .as_array()
                    .map(|list| {
                        list.iter()
                            .filter_map(|a| a["score"].as_f64())
                            .collect()
                    })
                    .unwrap_or_default();
                let mean = if scores.is_empty() {
                    0.0
                } else {
                    scores.iter().sum::<f64>() / scores.len() as f64
                };
                Ok(serde_json::json!(mean))
            }

            other => Err(LedgerError::Rejected(format!("unknown method: {other}"))),
        }
    }
}
