//! # Ethical Sourcing Handlers
//!
//! Certifications and ethical scores on the permissioned ledger. The
//! overall ethical score is recomputed on every addition so the ledger
//! copy never drifts from the mean of its parts.
//!
//! Certification expiry is evaluated lazily when a verifier asks, against
//! the `now` argument — never on a timer.

use crate::error::LedgerError;
use crate::handlers::{arg, get_doc, put_doc};
use crate::state::LedgerState;

/// `addCertification(productId, body, certificationDate, expirationDate, detailsJson)`
pub fn add_certification(
    state: &mut dyn LedgerState,
    args: &[String],
) -> Result<Vec<u8>, LedgerError> {
    let id = arg(args, 0, "productId")?;
    let body = arg(args, 1, "body")?;
    let certification_date = arg(args, 2, "certificationDate")?;
    let expiration_date = arg(args, 3, "expirationDate")?;
    let details: serde_json::Value = serde_json::from_str(arg(args, 4, "details")?)?;

    let mut product = get_doc(state, id)?;
    ensure_array(&mut product, "certifications")?;
    product["certifications"]
        .as_array_mut()
        .ok_or_else(|| LedgerError::Serialization("certifications is not an array".to_string()))?
        .push(serde_json::json!({
            "body": body,
            "certificationDate": certification_date,
            "expirationDate": expiration_date,
            "details": details,
            "status": "Active",
        }));
    put_doc(state, id, &product)?;
    Ok(Vec::new())
}

/// `verifyCertification(productId, body, now)`
///
/// Looks up the certification by certifying body and evaluates its status
/// as of `now`. Read-only: the decision is a pure function of the stored
/// document and the supplied clock.
pub fn verify_certification(
    state: &dyn LedgerState,
    args: &[String],
) -> Result<Vec<u8>, LedgerError> {
    let id = arg(args, 0, "productId")?;
    let body = arg(args, 1, "body")?;
    let now = arg(args, 2, "now")?;

    let product = get_doc(state, id)?;
    let certs = product["certifications"].as_array();

    let Some(cert) = certs.and_then(|list| list.iter().find(|c| c["body"] == body)) else {
        let result = serde_json::json!({
            "isValid": false,
            "message": "certification not found",
        });
        return Ok(serde_json::to_vec(&result)?);
    };

    if cert["status"] == "Revoked" {
        let result = serde_json::json!({
            "isValid": false,
            "message": "certification has been revoked",
        });
        return Ok(serde_json::to_vec(&result)?);
    }

    // Lexicographic comparison is chronological for ISO8601 Z timestamps.
    let expired = cert["expirationDate"]
        .as_str()
        .map(|exp| now > exp)
        .unwrap_or(true);
    let result = if expired {
        serde_json::json!({
            "isValid": false,
            "message": "certification has expired",
        })
    } else {
        serde_json::json!({
            "isValid": true,
            "certification": cert,
        })
    };
    Ok(serde_json::to_vec(&result)?)
}

/// `addEthicalScore(productId, category, score, assessmentDate, assessor)`
///
/// Appends the score and recomputes the overall mean.
pub fn add_ethical_score(
    state: &mut dyn LedgerState,
    args: &[String],
) -> Result<Vec<u8>, LedgerError> {
    let id = arg(args, 0, "productId")?;
    let category = arg(args, 1, "category")?;
    let score: f64 = arg(args, 2, "score")?
        .parse()
        .map_err(|_| LedgerError::Rejected(format!("score is not a number: {}", args[2])))?;
    let assessment_date = arg(args, 3, "assessmentDate")?;
    let assessor = arg(args, 4, "assessor")?;

    if !(0.0..=100.0).contains(&score) {
        return Err(LedgerError::Rejected(format!(
            "ethical score must be in [0, 100], got {score}"
        )));
    }

    let mut product = get_doc(state, id)?;
    ensure_array(&mut product, "ethicalScores")?;
    let scores = product["ethicalScores"]
        .as_array_mut()
        .ok_or_else(|| LedgerError::Serialization("ethicalScores is not an array".to_string()))?;
    scores.push(serde_json::json!({
        "category": category,
        "score": score,
        "assessmentDate": assessment_date,
        "assessor": assessor,
    }));

    let total: f64 = scores.iter().filter_map(|s| s["score"].as_f64()).sum();
    let mean = total / scores.len() as f64;
    product["overallEthicalScore"] = serde_json::json!(mean);

    put_doc(state, id, &product)?;
    Ok(Vec::new())
}

/// `getEthicalProfile(productId)` — certifications, scores, and the
/// derived overall score in one read.
pub fn ethical_profile(state: &dyn LedgerState, args: &[String]) -> Result<Vec<u8>, LedgerError> {
    let id = arg(args, 0, "productId")?;
    let product = get_doc(state, id)?;

    let profile = serde_json::json!({
        "productId": product["id"],
        "certifications": product.get("certifications").cloned()
            .unwrap_or_else(|| serde_json::json!([])),
        "ethicalScores": product.get("ethicalScores").cloned()
            .unwrap_or_else(|| serde_json::json!([])),
        "overallEthicalScore": product.get("overallEthicalScore").cloned()
            .unwrap_or_else(|| serde_json::json!(0.0)),
    });
    Ok(serde_json::to_vec(&profile)?)
}

fn ensure_array(doc: &mut serde_json::Value, field: &str) -> Result<(), LedgerError> {
    if doc.get(field).map(|v| v.is_array()) != Some(true) {
        doc[field] = serde_json::json!([]);
    }
    Ok(())
}
