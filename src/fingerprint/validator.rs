//! Fingerprint schema validation
//!
//! A serialized fingerprint must be an object with exactly these keys:
//!
//! - `rule_id` (required): non-empty string of `[A-Za-z0-9_.:-]`
//! - `effects` (required): non-empty object of finite numbers
//! - `trust_weight` (optional): number in `[0, 1]`
//!
//! Validation never stops at the first problem; every violation is reported.
//! Non-finite floats serialize to `null` and are reported as non-numeric.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use super::types::RuleFingerprint;

const RULE_ID_PATTERN: &str = r"^[A-Za-z0-9_.:\-]+$";
const DECLARED_KEYS: [&str; 3] = ["rule_id", "effects", "trust_weight"];

fn rule_id_regex() -> Option<&'static Regex> {
    static RULE_ID: OnceLock<Option<Regex>> = OnceLock::new();
    RULE_ID.get_or_init(|| Regex::new(RULE_ID_PATTERN).ok()).as_ref()
}

/// Returns true if `rule_id` is a well-formed rule identifier
pub fn is_valid_rule_id(rule_id: &str) -> bool {
    rule_id_regex().map_or(false, |re| re.is_match(rule_id))
}

/// Validates a serialized fingerprint, returning every violation found.
///
/// An empty result means the value is schema-valid.
pub fn validate_fingerprint_value(value: &Value) -> Vec<String> {
    let mut errors = Vec::new();

    let obj = match value.as_object() {
        Some(obj) => obj,
        None => {
            errors.push("fingerprint must be a JSON object".to_string());
            return errors;
        }
    };

    for key in obj.keys() {
        if !DECLARED_KEYS.contains(&key.as_str()) {
            errors.push(format!("undeclared key '{}'", key));
        }
    }

    match obj.get("rule_id") {
        None => errors.push("missing required key 'rule_id'".to_string()),
        Some(Value::String(id)) if id.is_empty() => {
            errors.push("'rule_id' must not be empty".to_string())
        }
        Some(Value::String(id)) if !is_valid_rule_id(id) => errors.push(format!(
            "'rule_id' '{}' must match {}",
            id, RULE_ID_PATTERN
        )),
        Some(Value::String(_)) => {}
        Some(_) => errors.push("'rule_id' must be a string".to_string()),
    }

    match obj.get("effects") {
        None => errors.push("missing required key 'effects'".to_string()),
        Some(Value::Object(effects)) => {
            if effects.is_empty() {
                errors.push("'effects' must not be empty".to_string());
            }
            for (field, effect) in effects {
                match effect.as_f64() {
                    Some(v) if v.is_finite() => {}
                    _ => errors.push(format!("effect '{}' must be a finite number", field)),
                }
            }
        }
        Some(_) => errors.push("'effects' must be an object".to_string()),
    }

    if let Some(weight) = obj.get("trust_weight") {
        match weight.as_f64() {
            Some(w) if (0.0..=1.0).contains(&w) => {}
            Some(w) => errors.push(format!("'trust_weight' {} is outside [0, 1]", w)),
            None => errors.push("'trust_weight' must be a number".to_string()),
        }
    }

    errors
}

/// Validates an in-memory fingerprint against the same schema
pub fn validate_fingerprint(fingerprint: &RuleFingerprint) -> Vec<String> {
    match serde_json::to_value(fingerprint) {
        Ok(value) => validate_fingerprint_value(&value),
        Err(e) => vec![format!("fingerprint is not serializable: {}", e)],
    }
}
