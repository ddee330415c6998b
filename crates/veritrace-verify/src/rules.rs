//! # Rule Engine
//!
//! Verification rules as data, evaluators as registered functions.
//!
//! ## Design
//!
//! A rule carries an opaque `rule_type` tag and a JSON parameter blob; the
//! engine holds a map from type tag to evaluator function. Applying a rule
//! looks up the evaluator and hands it the parameters plus the product's
//! attribute snapshot. Adding a rule type means registering one function —
//! the dispatch path never changes.
//!
//! ## Invariant
//!
//! Evaluators are pure: they read the attribute snapshot and the supplied
//! clock, and never mutate anything. A retired rule is refused before its
//! evaluator runs.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use veritrace_core::{RuleId, Timestamp};

use crate::error::VerifyError;

/// Type tag for numeric threshold rules.
pub const RULE_TYPE_THRESHOLD: &str = "threshold";

/// Type tag for date-recency rules.
pub const RULE_TYPE_TIME_WINDOW: &str = "timeWindow";

/// Lifecycle of a rule. Retired rules are kept for audit but refuse to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleStatus {
    /// The rule may be applied.
    Active,
    /// The rule is kept for history only.
    Retired,
}

/// A stored verification rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationRule {
    /// Unique rule identifier.
    pub id: RuleId,
    /// Evaluator selector, e.g. [`RULE_TYPE_THRESHOLD`].
    pub rule_type: String,
    /// Evaluator-specific parameters, validated at evaluation time.
    pub parameters: serde_json::Value,
    /// Whether the rule may still be applied.
    pub status: RuleStatus,
    /// When the rule was registered.
    pub created_at: Timestamp,
}

impl VerificationRule {
    /// Create an active rule.
    pub fn new(rule_type: impl Into<String>, parameters: serde_json::Value) -> Self {
        Self {
            id: RuleId::new(),
            rule_type: rule_type.into(),
            parameters,
            status: RuleStatus::Active,
            created_at: Timestamp::now(),
        }
    }
}

/// The two-valued result of a rule evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// The product satisfies the rule.
    Verified,
    /// The product does not satisfy the rule.
    Failed,
}

/// A verdict together with a human-readable explanation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleOutcome {
    /// Pass or fail.
    pub verdict: Verdict,
    /// What was compared and how it came out.
    pub details: String,
}

/// Comparison operator for threshold rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOp {
    /// Strictly greater than.
    #[serde(rename = ">")]
    Gt,
    /// Strictly less than.
    #[serde(rename = "<")]
    Lt,
    /// Greater than or equal.
    #[serde(rename = ">=")]
    Ge,
    /// Less than or equal.
    #[serde(rename = "<=")]
    Le,
    /// Equal.
    #[serde(rename = "==")]
    Eq,
}

impl ComparisonOp {
    fn holds(&self, value: f64, threshold: f64) -> bool {
        match self {
            Self::Gt => value > threshold,
            Self::Lt => value < threshold,
            Self::Ge => value >= threshold,
            Self::Le => value <= threshold,
            Self::Eq => value == threshold,
        }
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Ge => ">=",
            Self::Le => "<=",
            Self::Eq => "==",
        };
        f.write_str(s)
    }
}

/// Parameters for a [`RULE_TYPE_THRESHOLD`] rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdParams {
    /// Attribute to compare, e.g. `overallEthicalScore`.
    pub attribute: String,
    /// Comparison boundary.
    pub threshold: f64,
    /// How the attribute relates to the threshold when the rule passes.
    pub operator: ComparisonOp,
}

/// Parameters for a [`RULE_TYPE_TIME_WINDOW`] rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeWindowParams {
    /// Attribute holding an ISO 8601 date, e.g. `latestCertificationDate`.
    pub attribute: String,
    /// Maximum allowed age in days, inclusive.
    pub max_age_days: f64,
}

/// Evaluator signature: rule parameters + attribute snapshot + clock.
pub type Evaluator =
    fn(&serde_json::Value, &serde_json::Value, Timestamp) -> Result<RuleOutcome, VerifyError>;

/// Dispatches rules to registered evaluators by type tag.
pub struct RuleEngine {
    evaluators: HashMap<String, Evaluator>,
}

impl RuleEngine {
    /// Engine with the built-in threshold and time-window evaluators.
    pub fn new() -> Self {
        let mut engine = Self {
            evaluators: HashMap::new(),
        };
        engine.register(RULE_TYPE_THRESHOLD, evaluate_threshold);
        engine.register(RULE_TYPE_TIME_WINDOW, evaluate_time_window);
        engine
    }

    /// Register (or replace) the evaluator for a rule type.
    pub fn register(&mut self, rule_type: impl Into<String>, evaluator: Evaluator) {
        self.evaluators.insert(rule_type.into(), evaluator);
    }

    /// Whether an evaluator exists for this type tag.
    pub fn supports(&self, rule_type: &str) -> bool {
        self.evaluators.contains_key(rule_type)
    }

    /// Apply a rule to a product attribute snapshot.
    ///
    /// # Errors
    ///
    /// `RetiredRule` if the rule is no longer active, `UnknownRuleType` if no
    /// evaluator is registered, plus whatever the evaluator reports about the
    /// parameters or the snapshot.
    pub fn apply(
        &self,
        rule: &VerificationRule,
        attributes: &serde_json::Value,
        now: Timestamp,
    ) -> Result<RuleOutcome, VerifyError> {
        if rule.status == RuleStatus::Retired {
            return Err(VerifyError::RetiredRule {
                rule_id: rule.id.to_string(),
            });
        }
        let evaluator =
            self.evaluators
                .get(rule.rule_type.as_str())
                .ok_or_else(|| VerifyError::UnknownRuleType {
                    rule_type: rule.rule_type.clone(),
                })?;
        evaluator(&rule.parameters, attributes, now)
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn lookup<'a>(
    attributes: &'a serde_json::Value,
    attribute: &str,
) -> Result<&'a serde_json::Value, VerifyError> {
    match attributes.get(attribute) {
        Some(value) if !value.is_null() => Ok(value),
        _ => Err(VerifyError::UnknownAttribute {
            attribute: attribute.to_string(),
        }),
    }
}

fn evaluate_threshold(
    parameters: &serde_json::Value,
    attributes: &serde_json::Value,
    _now: Timestamp,
) -> Result<RuleOutcome, VerifyError> {
    let params: ThresholdParams = serde_json::from_value(parameters.clone())
        .map_err(|e| VerifyError::InvalidParameters(e.to_string()))?;

    let value = lookup(attributes, &params.attribute)?
        .as_f64()
        .ok_or_else(|| VerifyError::InvalidAttributeType {
            attribute: params.attribute.clone(),
            expected: "a number",
        })?;

    let verdict = if params.operator.holds(value, params.threshold) {
        Verdict::Verified
    } else {
        Verdict::Failed
    };
    Ok(RuleOutcome {
        verdict,
        details: format!(
            "{} = {value}, required {} {}",
            params.attribute, params.operator, params.threshold
        ),
    })
}

fn evaluate_time_window(
    parameters: &serde_json::Value,
    attributes: &serde_json::Value,
    now: Timestamp,
) -> Result<RuleOutcome, VerifyError> {
    let params: TimeWindowParams = serde_json::from_value(parameters.clone())
        .map_err(|e| VerifyError::InvalidParameters(e.to_string()))?;

    let raw = lookup(attributes, &params.attribute)?
        .as_str()
        .ok_or_else(|| VerifyError::InvalidAttributeType {
            attribute: params.attribute.clone(),
            expected: "an ISO 8601 date",
        })?;
    let when = Timestamp::parse_lenient(raw).map_err(|_| VerifyError::InvalidAttributeType {
        attribute: params.attribute.clone(),
        expected: "an ISO 8601 date",
    })?;

    let age_days = now.days_since(when);
    let verdict = if age_days <= params.max_age_days {
        Verdict::Verified
    } else {
        Verdict::Failed
    };
    Ok(RuleOutcome {
        verdict,
        details: format!(
            "{} age: {age_days:.2} days, max allowed: {} days",
            params.attribute, params.max_age_days
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn threshold_rule(attribute: &str, threshold: f64, operator: &str) -> VerificationRule {
        VerificationRule::new(
            RULE_TYPE_THRESHOLD,
            json!({ "attribute": attribute, "threshold": threshold, "operator": operator }),
        )
    }

    #[test]
    fn test_threshold_above_passes() {
        let engine = RuleEngine::new();
        let rule = threshold_rule("overallEthicalScore", 40.0, ">");
        let attrs = json!({ "overallEthicalScore": 50.0 });

        let outcome = engine.apply(&rule, &attrs, Timestamp::now()).unwrap();
        assert_eq!(outcome.verdict, Verdict::Verified);
        assert!(outcome.details.contains("overallEthicalScore"));
    }

    #[test]
    fn test_threshold_below_fails() {
        let engine = RuleEngine::new();
        let rule = threshold_rule("overallEthicalScore", 40.0, ">");
        let attrs = json!({ "overallEthicalScore": 30.0 });

        let outcome = engine.apply(&rule, &attrs, Timestamp::now()).unwrap();
        assert_eq!(outcome.verdict, Verdict::Failed);
    }

    #[test]
    fn test_threshold_operators() {
        let engine = RuleEngine::new();
        let attrs = json!({ "overallEthicalScore": 40.0 });
        let cases = [
            (">", Verdict::Failed),
            (">=", Verdict::Verified),
            ("<", Verdict::Failed),
            ("<=", Verdict::Verified),
            ("==", Verdict::Verified),
        ];
        for (op, expected) in cases {
            let rule = threshold_rule("overallEthicalScore", 40.0, op);
            let outcome = engine.apply(&rule, &attrs, Timestamp::now()).unwrap();
            assert_eq!(outcome.verdict, expected, "operator {op}");
        }
    }

    #[test]
    fn test_time_window_stale_date_fails() {
        let engine = RuleEngine::new();
        let now = Timestamp::parse("2026-01-20T00:00:00Z").unwrap();
        let rule = VerificationRule::new(
            RULE_TYPE_TIME_WINDOW,
            json!({ "attribute": "latestCertificationDate", "maxAgeDays": 5.0 }),
        );
        // Ten days old.
        let attrs = json!({ "latestCertificationDate": "2026-01-10T00:00:00Z" });

        let outcome = engine.apply(&rule, &attrs, now).unwrap();
        assert_eq!(outcome.verdict, Verdict::Failed);
        assert!(outcome.details.contains("10.00 days"));
    }

    #[test]
    fn test_time_window_fresh_date_passes() {
        let engine = RuleEngine::new();
        let now = Timestamp::parse("2026-01-20T00:00:00Z").unwrap();
        let rule = VerificationRule::new(
            RULE_TYPE_TIME_WINDOW,
            json!({ "attribute": "latestCertificationDate", "maxAgeDays": 30.0 }),
        );
        let attrs = json!({ "latestCertificationDate": "2026-01-10T00:00:00Z" });

        let outcome = engine.apply(&rule, &attrs, now).unwrap();
        assert_eq!(outcome.verdict, Verdict::Verified);
    }

    #[test]
    fn test_time_window_age_boundary_is_inclusive() {
        let engine = RuleEngine::new();
        let now = Timestamp::parse("2026-01-20T00:00:00Z").unwrap();
        let rule = VerificationRule::new(
            RULE_TYPE_TIME_WINDOW,
            json!({ "attribute": "latestCertificationDate", "maxAgeDays": 10.0 }),
        );
        let attrs = json!({ "latestCertificationDate": "2026-01-10T00:00:00Z" });

        let outcome = engine.apply(&rule, &attrs, now).unwrap();
        assert_eq!(outcome.verdict, Verdict::Verified);
    }

    #[test]
    fn test_unknown_attribute_is_an_error() {
        let engine = RuleEngine::new();
        let rule = threshold_rule("warpFactor", 9.0, ">");
        let attrs = json!({ "overallEthicalScore": 50.0 });

        let err = engine.apply(&rule, &attrs, Timestamp::now()).unwrap_err();
        assert_eq!(
            err,
            VerifyError::UnknownAttribute {
                attribute: "warpFactor".to_string()
            }
        );
    }

    #[test]
    fn test_null_attribute_treated_as_missing() {
        let engine = RuleEngine::new();
        let rule = VerificationRule::new(
            RULE_TYPE_TIME_WINDOW,
            json!({ "attribute": "latestCertificationDate", "maxAgeDays": 30.0 }),
        );
        let attrs = json!({ "latestCertificationDate": null });

        assert!(matches!(
            engine.apply(&rule, &attrs, Timestamp::now()),
            Err(VerifyError::UnknownAttribute { .. })
        ));
    }

    #[test]
    fn test_wrong_attribute_type_is_an_error() {
        let engine = RuleEngine::new();
        let rule = threshold_rule("name", 5.0, ">");
        let attrs = json!({ "name": "Fair Trade Coffee" });

        assert!(matches!(
            engine.apply(&rule, &attrs, Timestamp::now()),
            Err(VerifyError::InvalidAttributeType { expected: "a number", .. })
        ));
    }

    #[test]
    fn test_unknown_rule_type_is_an_error() {
        let engine = RuleEngine::new();
        let rule = VerificationRule::new("geoFence", json!({}));

        assert!(matches!(
            engine.apply(&rule, &json!({}), Timestamp::now()),
            Err(VerifyError::UnknownRuleType { .. })
        ));
    }

    #[test]
    fn test_retired_rule_refuses_to_run() {
        let engine = RuleEngine::new();
        let mut rule = threshold_rule("overallEthicalScore", 40.0, ">");
        rule.status = RuleStatus::Retired;

        assert!(matches!(
            engine.apply(&rule, &json!({ "overallEthicalScore": 50.0 }), Timestamp::now()),
            Err(VerifyError::RetiredRule { .. })
        ));
    }

    #[test]
    fn test_malformed_parameters_are_an_error() {
        let engine = RuleEngine::new();
        let rule = VerificationRule::new(RULE_TYPE_THRESHOLD, json!({ "attribute": "x" }));

        assert!(matches!(
            engine.apply(&rule, &json!({ "x": 1.0 }), Timestamp::now()),
            Err(VerifyError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_custom_evaluator_registration() {
        let mut engine = RuleEngine::new();
        assert!(!engine.supports("alwaysPass"));
        engine.register("alwaysPass", |_, _, _| {
            Ok(RuleOutcome {
                verdict: Verdict::Verified,
                details: "unconditional".to_string(),
            })
        });

        let rule = VerificationRule::new("alwaysPass", json!({}));
        let outcome = engine.apply(&rule, &json!({}), Timestamp::now()).unwrap();
        assert_eq!(outcome.verdict, Verdict::Verified);
    }
}
