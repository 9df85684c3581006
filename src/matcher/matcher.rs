//! Fuzzy, trust-weighted fingerprint matching
//!
//! For a fingerprint `f` and delta `d`, over the keys of `f.effects`:
//!
//! ```text
//! distance   = Σ |d[k] - f.effects[k]| / Σ |f.effects[k]|
//! similarity = f.trust_weight * (1 - clamp(distance, 0, 1))
//! ```
//!
//! Fingerprints sharing no key with the delta are skipped. An exact match
//! scores exactly `trust_weight`.
//!
//! Ordering (strict): similarity desc, trust_weight desc, rule_id asc.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::fingerprint::{RuleFingerprint, StoreSnapshot};
use crate::world::{Delta, DEFAULT_EPSILON};

/// Default similarity floor
pub const DEFAULT_MIN_SIMILARITY: f64 = 0.7;

/// One fingerprint scored against one delta
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub rule_id: String,
    pub similarity: f64,
    pub trust_weight: f64,
    /// Effects of the matched fingerprint
    pub effects: BTreeMap<String, f64>,
    /// What the fingerprint leaves unexplained
    pub residual: Delta,
}

impl MatchResult {
    /// Strict match ordering: best first
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .similarity
            .total_cmp(&self.similarity)
            .then_with(|| other.trust_weight.total_cmp(&self.trust_weight))
            .then_with(|| self.rule_id.cmp(&other.rule_id))
    }
}

/// Scores deltas against a store snapshot
#[derive(Debug, Clone, Copy)]
pub struct FingerprintMatcher {
    min_similarity: f64,
    epsilon: f64,
}

impl Default for FingerprintMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_SIMILARITY, DEFAULT_EPSILON)
    }
}

impl FingerprintMatcher {
    pub fn new(min_similarity: f64, epsilon: f64) -> Self {
        Self {
            min_similarity,
            epsilon,
        }
    }

    pub fn min_similarity(&self) -> f64 {
        self.min_similarity
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Similarity of one fingerprint to `delta`, or `None` when the fingerprint
    /// shares no key with the delta or has no measurable effect.
    pub fn similarity(&self, delta: &Delta, fingerprint: &RuleFingerprint) -> Option<f64> {
        if !delta.shares_keys_with(&fingerprint.effects) {
            return None;
        }

        let scale = fingerprint.effect_magnitude();
        if scale <= self.epsilon {
            return None;
        }

        let distance: f64 = fingerprint
            .effects
            .iter()
            .map(|(field, effect)| (delta.change_of(field) - effect).abs())
            .sum();

        let closeness = 1.0 - (distance / scale).clamp(0.0, 1.0);
        Some(fingerprint.trust_weight * closeness)
    }

    /// Ranked matches at or above the similarity floor.
    ///
    /// An empty store yields an empty list.
    pub fn match_delta(&self, delta: &Delta, store: &StoreSnapshot) -> Vec<MatchResult> {
        let mut matches: Vec<MatchResult> = store
            .iter()
            .filter_map(|fp| {
                let similarity = self.similarity(delta, fp)?;
                if similarity < self.min_similarity - self.epsilon {
                    return None;
                }
                Some(MatchResult {
                    rule_id: fp.rule_id.clone(),
                    similarity,
                    trust_weight: fp.trust_weight,
                    effects: fp.effects.clone(),
                    residual: delta.residual_after(&fp.effects, self.epsilon),
                })
            })
            .collect();

        matches.sort_by(MatchResult::rank_cmp);
        matches
    }
}

/// Ranked single-step matches of `delta` against `store`
pub fn match_fingerprints(
    delta: &Delta,
    store: &StoreSnapshot,
    min_similarity: f64,
) -> Vec<MatchResult> {
    FingerprintMatcher::new(min_similarity, DEFAULT_EPSILON).match_delta(delta, store)
}
