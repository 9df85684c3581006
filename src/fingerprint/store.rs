//! Fingerprint store access
//!
//! The long-term rule library lives outside this crate. The engine reads it
//! through [`FingerprintStore`] and, once per request, copies it into an
//! immutable [`StoreSnapshot`] so an approval process inserting fingerprints
//! concurrently cannot change what a request sees.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::observability::Logger;
use crate::suggest::FingerprintCandidate;

use super::errors::{FingerprintError, FingerprintResult};
use super::types::RuleFingerprint;
use super::validator::{validate_fingerprint, validate_fingerprint_value};

/// Read access to the rule library
pub trait FingerprintStore: Send + Sync {
    /// Every fingerprint currently known
    fn get_all_fingerprints(&self) -> Vec<RuleFingerprint>;

    /// Checks a proposed fingerprint against the library schema.
    ///
    /// Returns `(valid, errors)`.
    fn validate_schema(&self, candidate: &FingerprintCandidate) -> (bool, Vec<String>) {
        let errors = validate_fingerprint_value(&candidate.as_fingerprint_value());
        (errors.is_empty(), errors)
    }
}

/// Thread-safe in-memory store keyed by rule id
#[derive(Debug, Default)]
pub struct InMemoryFingerprintStore {
    fingerprints: RwLock<BTreeMap<String, RuleFingerprint>>,
}

impl InMemoryFingerprintStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from fingerprints, rejecting invalid or duplicate entries
    pub fn from_fingerprints(
        fingerprints: impl IntoIterator<Item = RuleFingerprint>,
    ) -> FingerprintResult<Self> {
        let store = Self::new();
        for fp in fingerprints {
            store.insert(fp)?;
        }
        Ok(store)
    }

    /// Adds a fingerprint.
    ///
    /// # Errors
    ///
    /// Fails if the fingerprint violates the schema or its rule id is taken.
    pub fn insert(&self, fingerprint: RuleFingerprint) -> FingerprintResult<()> {
        let errors = validate_fingerprint(&fingerprint);
        if !errors.is_empty() {
            return Err(FingerprintError::InvalidFingerprint {
                rule_id: fingerprint.rule_id,
                errors,
            });
        }

        let mut map = self
            .fingerprints
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if map.contains_key(&fingerprint.rule_id) {
            return Err(FingerprintError::DuplicateRuleId(fingerprint.rule_id));
        }
        map.insert(fingerprint.rule_id.clone(), fingerprint);
        Ok(())
    }

    /// Removes a fingerprint, returning it if present
    pub fn remove(&self, rule_id: &str) -> Option<RuleFingerprint> {
        self.fingerprints
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(rule_id)
    }

    pub fn len(&self) -> usize {
        self.fingerprints
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FingerprintStore for InMemoryFingerprintStore {
    fn get_all_fingerprints(&self) -> Vec<RuleFingerprint> {
        self.fingerprints
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}

/// Request-scoped, immutable copy of a fingerprint store.
///
/// Fingerprints are ordered by rule id. Cloning is cheap.
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    fingerprints: Arc<[RuleFingerprint]>,
}

impl StoreSnapshot {
    /// Copies the store.
    ///
    /// Entries that violate the schema are left out with a WARN line, and a
    /// repeated rule id keeps its first occurrence, so matching never sees a
    /// non-finite effect or an out-of-range trust weight.
    pub fn capture(store: &dyn FingerprintStore) -> Self {
        Self::from_fingerprints(store.get_all_fingerprints())
    }

    pub fn from_fingerprints(fingerprints: impl IntoIterator<Item = RuleFingerprint>) -> Self {
        let mut by_id: BTreeMap<String, RuleFingerprint> = BTreeMap::new();

        for fp in fingerprints {
            let errors = validate_fingerprint(&fp);
            if !errors.is_empty() {
                Logger::warn(
                    "FINGERPRINT_SKIPPED",
                    &[("rule_id", &fp.rule_id), ("errors", &errors.join("; "))],
                );
                continue;
            }
            by_id.entry(fp.rule_id.clone()).or_insert(fp);
        }

        Self {
            fingerprints: by_id.into_values().collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &RuleFingerprint> {
        self.fingerprints.iter()
    }

    pub fn get(&self, rule_id: &str) -> Option<&RuleFingerprint> {
        self.fingerprints
            .binary_search_by(|fp| fp.rule_id.as_str().cmp(rule_id))
            .ok()
            .map(|idx| &self.fingerprints[idx])
    }

    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }

    /// Fails with the recoverable [`FingerprintError::EmptyStore`] when the
    /// snapshot holds no fingerprints.
    pub fn require_non_empty(&self) -> FingerprintResult<()> {
        if self.is_empty() {
            return Err(FingerprintError::EmptyStore);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get_all() {
        let store = InMemoryFingerprintStore::new();
        store.insert(RuleFingerprint::new("R2", [("a", 1.0)])).unwrap();
        store.insert(RuleFingerprint::new("R1", [("b", 1.0)])).unwrap();

        let ids: Vec<String> = store
            .get_all_fingerprints()
            .into_iter()
            .map(|fp| fp.rule_id)
            .collect();
        assert_eq!(ids, vec!["R1", "R2"]);
    }

    #[test]
    fn test_duplicate_rejected() {
        let store = InMemoryFingerprintStore::new();
        store.insert(RuleFingerprint::new("R1", [("a", 1.0)])).unwrap();
        assert_eq!(
            store.insert(RuleFingerprint::new("R1", [("b", 2.0)])),
            Err(FingerprintError::DuplicateRuleId("R1".into()))
        );
    }

    #[test]
    fn test_invalid_rejected() {
        let store = InMemoryFingerprintStore::new();
        let err = store
            .insert(RuleFingerprint::new("R1", [("a", 1.0)]).with_trust_weight(-0.1))
            .unwrap_err();
        assert!(matches!(err, FingerprintError::InvalidFingerprint { .. }));
        assert!(store.is_empty());
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_inserts() {
        let store = InMemoryFingerprintStore::new();
        store.insert(RuleFingerprint::new("R1", [("a", 1.0)])).unwrap();

        let snapshot = StoreSnapshot::capture(&store);
        store.insert(RuleFingerprint::new("R2", [("a", 2.0)])).unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_snapshot_sorted_and_searchable() {
        let snapshot = StoreSnapshot::from_fingerprints(vec![
            RuleFingerprint::new("c", [("x", 1.0)]),
            RuleFingerprint::new("a", [("x", 1.0)]),
            RuleFingerprint::new("b", [("x", 1.0)]),
        ]);
        let ids: Vec<&str> = snapshot.iter().map(|fp| fp.rule_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(snapshot.get("b").is_some());
        assert!(snapshot.get("z").is_none());
    }

    #[test]
    fn test_snapshot_skips_invalid_and_duplicates() {
        let snapshot = StoreSnapshot::from_fingerprints(vec![
            RuleFingerprint::new("R1", [("x", 1.0)]),
            RuleFingerprint::new("R1", [("x", 9.0)]),
            RuleFingerprint::new("R2", [("x", f64::NAN)]),
        ]);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("R1").unwrap().effects["x"], 1.0);
    }

    #[test]
    fn test_empty_snapshot_reports_recoverable_error() {
        let empty = StoreSnapshot::capture(&InMemoryFingerprintStore::new());
        let err = empty.require_non_empty().unwrap_err();
        assert_eq!(err, FingerprintError::EmptyStore);
        assert_eq!(err.code(), "RETRO_EMPTY_FINGERPRINT_STORE");
        assert!(err.is_recoverable());

        let filled = StoreSnapshot::from_fingerprints(vec![RuleFingerprint::new("R1", [("x", 1.0)])]);
        assert_eq!(filled.require_non_empty(), Ok(()));
    }
}
