//! Fingerprint suggester
//!
//! When ranking leaves an observation unexplained, proposes a fingerprint
//! whose effects are the unexplained change and validates it. The store is
//! never written to.

use serde::Serialize;
use uuid::Uuid;

use crate::fingerprint::{validate_fingerprint_value, FingerprintStore};
use crate::observability::{log_event_with_fields, Event};
use crate::tracer::CausalChain;
use crate::world::Delta;

use super::candidate::FingerprintCandidate;
use super::errors::InvalidCandidateSchema;

/// Default confidence below which a suggestion is made
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.7;

/// Which delta a candidate's effects were taken from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionBasis {
    OriginalDelta,
    /// Residual of the best abandoned chain
    AbandonedResidual,
}

/// Suggester output: the candidate, its validation, and whether the approval
/// hook took it
#[derive(Debug, Clone, Serialize)]
pub struct SuggestionResult {
    pub candidate: FingerprintCandidate,
    pub basis: SuggestionBasis,
    /// `None` if not submitted (no hook, invalid schema, or hook unreachable)
    pub submitted: Option<bool>,
}

impl SuggestionResult {
    pub fn schema_valid(&self) -> bool {
        self.candidate.schema_valid
    }

    pub fn validation_errors(&self) -> &[String] {
        &self.candidate.validation_errors
    }

    pub fn schema_error(&self) -> Option<InvalidCandidateSchema> {
        if self.candidate.schema_valid {
            return None;
        }
        Some(InvalidCandidateSchema {
            rule_id: self.candidate.proposed_rule_id.clone(),
            errors: self.candidate.validation_errors.clone(),
        })
    }
}

/// Proposes a candidate for `delta`, validated against the default schema.
///
/// Uses a fresh trace id.
pub fn suggest_fingerprint(delta: &Delta) -> FingerprintCandidate {
    let mut candidate = FingerprintCandidate::from_delta(delta, Uuid::new_v4());
    let errors = validate_fingerprint_value(&candidate.as_fingerprint_value());
    candidate.set_validation(errors.is_empty(), errors);
    log_candidate(&candidate);
    candidate
}

/// True when no complete chain exists or the best chain is below
/// `min_confidence`. `chains` must already be ranked.
pub fn needs_suggestion(chains: &[CausalChain], min_confidence: f64) -> bool {
    let has_complete = chains.iter().any(CausalChain::is_complete);
    let best = chains.first().map_or(0.0, |c| c.confidence);
    !has_complete || best < min_confidence
}

/// The part of the observation left to explain.
///
/// With no complete chain, the residual of the highest ranked abandoned
/// chain; otherwise the original delta. The candidate completes the most
/// plausible partial explanation, so a larger residual left by a lower ranked
/// chain is not used. Chains with an empty residual are skipped.
pub fn unexplained_delta<'a>(
    original: &'a Delta,
    chains: &'a [CausalChain],
) -> (&'a Delta, SuggestionBasis) {
    if chains.iter().any(CausalChain::is_complete) {
        return (original, SuggestionBasis::OriginalDelta);
    }
    match chains.iter().find(|c| !c.residual.is_empty()) {
        Some(chain) => (&chain.residual, SuggestionBasis::AbandonedResidual),
        None => (original, SuggestionBasis::OriginalDelta),
    }
}

/// Builds and validates candidates against a store's schema
#[derive(Debug, Clone, Copy)]
pub struct FingerprintSuggester {
    min_confidence: f64,
}

impl Default for FingerprintSuggester {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_CONFIDENCE)
    }
}

impl FingerprintSuggester {
    pub fn new(min_confidence: f64) -> Self {
        Self { min_confidence }
    }

    pub fn min_confidence(&self) -> f64 {
        self.min_confidence
    }

    /// Candidate for `delta`, validated by `store`
    pub fn suggest(
        &self,
        delta: &Delta,
        trace_id: Uuid,
        store: &dyn FingerprintStore,
    ) -> FingerprintCandidate {
        let mut candidate = FingerprintCandidate::from_delta(delta, trace_id);
        let (valid, errors) = store.validate_schema(&candidate);
        candidate.set_validation(valid, errors);
        log_candidate(&candidate);
        candidate
    }

    /// Suggests a fingerprint if the ranked chains leave `original`
    /// unexplained. Returns `None` when the chains are good enough.
    pub fn suggest_for(
        &self,
        original: &Delta,
        ranked: &[CausalChain],
        trace_id: Uuid,
        store: &dyn FingerprintStore,
    ) -> Option<SuggestionResult> {
        if !needs_suggestion(ranked, self.min_confidence) {
            return None;
        }
        let (delta, basis) = unexplained_delta(original, ranked);
        Some(SuggestionResult {
            candidate: self.suggest(delta, trace_id, store),
            basis,
            submitted: None,
        })
    }
}

fn log_candidate(candidate: &FingerprintCandidate) {
    let trace = candidate.source_trace.to_string();
    let effects = candidate.effects.len().to_string();
    if candidate.schema_valid {
        log_event_with_fields(
            Event::CandidateProposed,
            &[
                ("effects", &effects),
                ("rule_id", &candidate.proposed_rule_id),
                ("trace_id", &trace),
            ],
        );
    } else {
        let errors = candidate.validation_errors.join("; ");
        log_event_with_fields(
            Event::CandidateRejected,
            &[
                ("code", "RETRO_INVALID_CANDIDATE_SCHEMA"),
                ("errors", &errors),
                ("rule_id", &candidate.proposed_rule_id),
                ("trace_id", &trace),
            ],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::InMemoryFingerprintStore;
    use crate::matcher::MatchResult;
    use crate::tracer::{AbandonReason, ChainStatus};

    fn chain(status: ChainStatus, confidence: f64, residual: Delta) -> CausalChain {
        let mut chain = CausalChain::new(
            vec![MatchResult {
                rule_id: "R".into(),
                similarity: confidence,
                trust_weight: 1.0,
                effects: Default::default(),
                residual: residual.clone(),
            }],
            status,
            (status == ChainStatus::Abandoned).then_some(AbandonReason::DepthLimit),
            residual,
        );
        chain.confidence = confidence;
        chain
    }

    #[test]
    fn test_candidate_from_full_delta_is_valid() {
        let delta = Delta::from_changes([("inflation", 1.0, 1.5), ("gdp", 2.0, 1.0)]);
        let candidate = suggest_fingerprint(&delta);

        assert!(candidate.schema_valid, "{:?}", candidate.validation_errors);
        assert_eq!(candidate.effects, delta.changes());
    }

    #[test]
    fn test_empty_delta_candidate_is_invalid() {
        let candidate = suggest_fingerprint(&Delta::new());
        assert!(!candidate.schema_valid);
        assert!(candidate.validation_errors.iter().any(|e| e.contains("effects")));
    }

    #[test]
    fn test_non_finite_effect_is_reported() {
        let mut delta = Delta::new();
        delta.insert_if_changed(
            "x",
            crate::world::FieldChange::new(0.0, f64::INFINITY, crate::world::FieldKind::Variable),
            1e-6,
        );
        let candidate = suggest_fingerprint(&delta);
        assert!(!candidate.schema_valid);
    }

    #[test]
    fn test_needs_suggestion() {
        let residual = Delta::from_changes([("x", 0.0, 1.0)]);
        assert!(needs_suggestion(&[], 0.7));
        assert!(needs_suggestion(&[chain(ChainStatus::Complete, 0.5, Delta::new())], 0.7));
        assert!(needs_suggestion(&[chain(ChainStatus::Abandoned, 0.9, residual)], 0.7));
        assert!(!needs_suggestion(&[chain(ChainStatus::Complete, 0.9, Delta::new())], 0.7));
    }

    #[test]
    fn test_abandoned_residual_is_basis() {
        let original = Delta::from_changes([("x", 0.0, 2.0), ("y", 0.0, 1.0)]);
        let residual = Delta::from_changes([("y", 0.0, 1.0)]);
        let chains = vec![chain(ChainStatus::Abandoned, 0.8, residual.clone())];

        let (delta, basis) = unexplained_delta(&original, &chains);
        assert_eq!(basis, SuggestionBasis::AbandonedResidual);
        assert_eq!(delta, &residual);
    }

    #[test]
    fn test_top_ranked_residual_wins_over_larger_one() {
        let original = Delta::from_changes([("x", 0.0, 2.0), ("y", 0.0, 1.0)]);
        let small = Delta::from_changes([("y", 0.0, 1.0)]);
        let large = Delta::from_changes([("x", 0.0, 2.0)]);
        let chains = vec![
            chain(ChainStatus::Abandoned, 0.8, Delta::new()),
            chain(ChainStatus::Abandoned, 0.7, small.clone()),
            chain(ChainStatus::Abandoned, 0.4, large),
        ];

        let (delta, basis) = unexplained_delta(&original, &chains);
        assert_eq!(basis, SuggestionBasis::AbandonedResidual);
        assert_eq!(delta, &small);
    }

    #[test]
    fn test_suggest_for_skips_good_explanations() {
        let store = InMemoryFingerprintStore::new();
        let original = Delta::from_changes([("x", 0.0, 1.0)]);
        let chains = vec![chain(ChainStatus::Complete, 0.95, Delta::new())];

        let suggester = FingerprintSuggester::default();
        assert!(suggester
            .suggest_for(&original, &chains, Uuid::new_v4(), &store)
            .is_none());

        let result = suggester
            .suggest_for(&original, &[], Uuid::new_v4(), &store)
            .unwrap();
        assert!(result.schema_valid());
        assert_eq!(result.basis, SuggestionBasis::OriginalDelta);
        assert!(result.schema_error().is_none());
    }
}
