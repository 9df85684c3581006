//! Trust and Symbolic collaborator interfaces
//!
//! Both are injected into the engine at construction. Implementations may be
//! slow or fail; every call goes through a [`super::BoundedCaller`].

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::matcher::MatchResult;
use crate::tracer::CausalChain;
use crate::world::{Delta, FieldKind};

use super::errors::CollaboratorResult;

/// What a collaborator sees besides the chain itself
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringContext {
    pub trace_id: Uuid,
    /// The observed delta the chain is meant to explain
    pub original_delta: Delta,
}

impl ScoringContext {
    pub fn new(trace_id: Uuid, original_delta: Delta) -> Self {
        Self {
            trace_id,
            original_delta,
        }
    }

    /// Deltas supporting a chain: the original delta, then the residual after
    /// each step.
    pub fn supporting_deltas<'a>(&'a self, chain: &'a CausalChain) -> Vec<&'a Delta> {
        std::iter::once(&self.original_delta)
            .chain(chain.steps.iter().map(|s| &s.residual))
            .collect()
    }
}

/// Tags and confidence adjustment from the symbolic subsystem
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymbolicAssessment {
    pub tags: BTreeSet<String>,
    /// Added to `mean_similarity * trust` before clamping
    pub confidence_adjustment: f64,
}

/// Scores how plausible a chain is, in `[0, 1]`
pub trait TrustCollaborator: Send + Sync {
    fn score_chain(&self, chain: &CausalChain, context: &ScoringContext)
        -> CollaboratorResult<f64>;
}

/// Attaches symbolic tags and a confidence adjustment to a chain
pub trait SymbolicCollaborator: Send + Sync {
    fn tag_and_adjust(
        &self,
        chain: &CausalChain,
        context: &ScoringContext,
    ) -> CollaboratorResult<SymbolicAssessment>;
}

/// Trust from the library itself: mean closeness of each step's effects to
/// the residual it explained.
///
/// Closeness is a step's similarity with its `trust_weight` divided back out.
/// The weight already scales the similarity, so it is not applied again here.
/// A zero-weight step contributes zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct FingerprintTrust;

impl FingerprintTrust {
    fn closeness(step: &MatchResult) -> f64 {
        if step.trust_weight <= 0.0 {
            return 0.0;
        }
        (step.similarity / step.trust_weight).clamp(0.0, 1.0)
    }
}

impl TrustCollaborator for FingerprintTrust {
    fn score_chain(&self, chain: &CausalChain, _context: &ScoringContext) -> CollaboratorResult<f64> {
        if chain.steps.is_empty() {
            return Ok(0.0);
        }
        let total: f64 = chain.steps.iter().map(Self::closeness).sum();
        Ok(total / chain.steps.len() as f64)
    }
}

/// Tags chains by the kinds of field they explain. Never adjusts confidence.
///
/// - `overlay:<name>` for every overlay field a step affects
/// - `capital_exposure` if any capital field is affected
/// - `multi_step` for chains longer than one step
/// - `partial` for abandoned chains
#[derive(Debug, Clone, Copy, Default)]
pub struct OverlayTagger;

impl SymbolicCollaborator for OverlayTagger {
    fn tag_and_adjust(
        &self,
        chain: &CausalChain,
        context: &ScoringContext,
    ) -> CollaboratorResult<SymbolicAssessment> {
        let mut tags = BTreeSet::new();

        for step in &chain.steps {
            for field in step.effects.keys() {
                match context.original_delta.get(field).map(|c| c.kind) {
                    Some(FieldKind::Overlay) => {
                        tags.insert(format!("overlay:{}", field));
                    }
                    Some(FieldKind::Capital) => {
                        tags.insert("capital_exposure".to_string());
                    }
                    _ => {}
                }
            }
        }
        if chain.len() > 1 {
            tags.insert("multi_step".to_string());
        }
        if !chain.is_complete() {
            tags.insert("partial".to_string());
        }

        Ok(SymbolicAssessment {
            tags,
            confidence_adjustment: 0.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracer::ChainStatus;
    use crate::world::FieldChange;

    fn step(rule_id: &str, trust_weight: f64, field: &str) -> MatchResult {
        MatchResult {
            rule_id: rule_id.into(),
            similarity: 1.0,
            trust_weight,
            effects: [(field.to_string(), 0.1)].into_iter().collect(),
            residual: Delta::new(),
        }
    }

    fn context() -> ScoringContext {
        let mut delta = Delta::new();
        delta.insert_if_changed("hope", FieldChange::new(0.2, 0.3, FieldKind::Overlay), 1e-6);
        delta.insert_if_changed("spy", FieldChange::new(10.0, 12.0, FieldKind::Capital), 1e-6);
        delta.insert_if_changed("gdp", FieldChange::new(1.0, 1.1, FieldKind::Variable), 1e-6);
        ScoringContext::new(Uuid::new_v4(), delta)
    }

    fn weighted_step(rule_id: &str, similarity: f64, trust_weight: f64) -> MatchResult {
        MatchResult {
            similarity,
            ..step(rule_id, trust_weight, "gdp")
        }
    }

    #[test]
    fn test_fingerprint_trust_is_mean_closeness() {
        // closeness 1.0 and 0.5
        let chain = CausalChain::new(
            vec![weighted_step("A", 0.5, 0.5), weighted_step("B", 0.25, 0.5)],
            ChainStatus::Complete,
            None,
            Delta::new(),
        );
        assert_eq!(FingerprintTrust.score_chain(&chain, &context()), Ok(0.75));
    }

    #[test]
    fn test_fingerprint_trust_ignores_weight_of_exact_match() {
        let chain = CausalChain::new(
            vec![weighted_step("A", 0.75, 0.75)],
            ChainStatus::Complete,
            None,
            Delta::new(),
        );
        assert_eq!(FingerprintTrust.score_chain(&chain, &context()), Ok(1.0));

        let zero = CausalChain::new(
            vec![weighted_step("Z", 0.0, 0.0)],
            ChainStatus::Complete,
            None,
            Delta::new(),
        );
        assert_eq!(FingerprintTrust.score_chain(&zero, &context()), Ok(0.0));
    }

    #[test]
    fn test_overlay_tagger_tags() {
        let chain = CausalChain::new(
            vec![step("A", 1.0, "hope"), step("B", 1.0, "spy")],
            ChainStatus::Abandoned,
            None,
            Delta::new(),
        );
        let assessment = OverlayTagger.tag_and_adjust(&chain, &context()).unwrap();
        let tags: Vec<&str> = assessment.tags.iter().map(String::as_str).collect();
        assert_eq!(
            tags,
            vec!["capital_exposure", "multi_step", "overlay:hope", "partial"]
        );
        assert_eq!(assessment.confidence_adjustment, 0.0);
    }

    #[test]
    fn test_supporting_deltas_start_with_original() {
        let ctx = context();
        let chain = CausalChain::new(
            vec![step("A", 1.0, "gdp")],
            ChainStatus::Complete,
            None,
            Delta::new(),
        );
        let deltas = ctx.supporting_deltas(&chain);
        assert_eq!(deltas.len(), 2);
        assert_eq!(deltas[0], &ctx.original_delta);
    }
}
