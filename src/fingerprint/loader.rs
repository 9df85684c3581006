//! Fingerprint file loader
//!
//! Accepts either layout:
//!
//! ```json
//! [ { "rule_id": "R1", "effects": { "inflation": 0.5 }, "trust_weight": 0.9 } ]
//! ```
//!
//! ```json
//! { "R1": { "effects": { "inflation": 0.5 }, "trust_weight": 0.9 } }
//! ```
//!
//! Every entry is schema-checked; one bad entry fails the whole file.

use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::observability::{log_event_with_fields, Event};

use super::errors::{FingerprintError, FingerprintResult};
use super::store::InMemoryFingerprintStore;
use super::types::RuleFingerprint;
use super::validator::validate_fingerprint_value;

/// Reads rule fingerprints from JSON
pub struct FingerprintLoader;

impl FingerprintLoader {
    /// Loads a fingerprint file into a fresh in-memory store
    pub fn load_file(path: &Path) -> FingerprintResult<InMemoryFingerprintStore> {
        let display = path.display().to_string();

        let content = fs::read_to_string(path).map_err(|e| FingerprintError::Io {
            path: display.clone(),
            reason: e.to_string(),
        })?;

        let value: Value =
            serde_json::from_str(&content).map_err(|e| FingerprintError::InvalidJson {
                path: display.clone(),
                reason: e.to_string(),
            })?;

        let store = InMemoryFingerprintStore::from_fingerprints(Self::parse_value(&value)?)?;

        log_event_with_fields(
            Event::FingerprintsLoaded,
            &[("count", &store.len().to_string()), ("path", &display)],
        );

        Ok(store)
    }

    /// Parses fingerprints from either supported layout
    pub fn parse_value(value: &Value) -> FingerprintResult<Vec<RuleFingerprint>> {
        match value {
            Value::Array(items) => items.iter().map(Self::parse_entry).collect(),
            Value::Object(map) => map
                .iter()
                .map(|(rule_id, body)| {
                    let mut entry = body.clone();
                    if let Some(obj) = entry.as_object_mut() {
                        obj.insert("rule_id".into(), Value::String(rule_id.clone()));
                    }
                    Self::parse_entry(&entry)
                })
                .collect(),
            _ => Err(FingerprintError::InvalidJson {
                path: "<value>".into(),
                reason: "expected an array or an object keyed by rule_id".into(),
            }),
        }
    }

    fn parse_entry(entry: &Value) -> FingerprintResult<RuleFingerprint> {
        let rule_id = entry
            .get("rule_id")
            .and_then(Value::as_str)
            .unwrap_or("<unknown>")
            .to_string();

        let errors = validate_fingerprint_value(entry);
        if !errors.is_empty() {
            return Err(FingerprintError::InvalidFingerprint { rule_id, errors });
        }

        serde_json::from_value(entry.clone()).map_err(|e| FingerprintError::InvalidFingerprint {
            rule_id,
            errors: vec![e.to_string()],
        })
    }
}
