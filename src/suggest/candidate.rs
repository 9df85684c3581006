//! Fingerprint candidates

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::world::Delta;

/// Hex digits of the effects hash kept in a proposed rule id
const ID_HASH_LEN: usize = 12;

/// A proposed fingerprint. Not a [`crate::fingerprint::RuleFingerprint`]
/// until an external approval process accepts it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FingerprintCandidate {
    /// `fp_` followed by a hash of the effects; equal effects give equal ids
    pub proposed_rule_id: String,
    pub effects: BTreeMap<String, f64>,
    pub schema_valid: bool,
    #[serde(default)]
    pub validation_errors: Vec<String>,
    /// Trace id of the request the candidate came from
    pub source_trace: Uuid,
    pub proposed_at: DateTime<Utc>,
}

impl FingerprintCandidate {
    /// Builds an unvalidated candidate whose effects are the changes in `delta`
    pub fn from_delta(delta: &Delta, source_trace: Uuid) -> Self {
        let effects = delta.changes();
        Self {
            proposed_rule_id: proposed_rule_id(&effects),
            effects,
            schema_valid: false,
            validation_errors: Vec::new(),
            source_trace,
            proposed_at: Utc::now(),
        }
    }

    /// The candidate in fingerprint form, as the schema validator sees it
    pub fn as_fingerprint_value(&self) -> Value {
        json!({
            "rule_id": self.proposed_rule_id,
            "effects": self.effects,
        })
    }

    pub(crate) fn set_validation(&mut self, valid: bool, errors: Vec<String>) {
        self.schema_valid = valid && errors.is_empty();
        self.validation_errors = errors;
    }
}

/// Deterministic rule id for a set of effects.
///
/// Hashes the effects as compact JSON with sorted keys.
pub fn proposed_rule_id(effects: &BTreeMap<String, f64>) -> String {
    let canonical = serde_json::to_string(effects).unwrap_or_default();
    let digest = Sha256::digest(canonical.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    format!("fp_{}", &hex[..ID_HASH_LEN])
}
