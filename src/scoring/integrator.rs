//! Scoring integrator
//!
//! ```text
//! confidence = clamp(mean_similarity * trust_score + symbolic_adjustment, 0, 1)
//! ```
//!
//! A collaborator that fails for any chain (after its bounded retry) is
//! dropped for the whole ranking call, so every chain in one ranking is
//! scored the same way. Without trust, `trust_score` counts as 1; without
//! symbolic, there are no tags and no adjustment. The result is flagged
//! `unscored_by_trust` / `unscored_by_symbolic`.
//!
//! Ordering (strict): confidence desc, chain length asc, complete before
//! abandoned, residual asc, rule ids asc.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::observability::{log_event_with_fields, Event, Logger};
use crate::tracer::CausalChain;

use super::bounded::{BoundedCaller, DEFAULT_RETRIES, DEFAULT_TIMEOUT_MS};
use super::collaborators::{ScoringContext, SymbolicCollaborator, TrustCollaborator};
use super::errors::CollaboratorError;

/// Chains in final order, with degradation flags
#[derive(Debug, Clone, Serialize)]
pub struct RankedChains {
    pub chains: Vec<CausalChain>,
    pub unscored_by_trust: bool,
    pub unscored_by_symbolic: bool,
    /// Collaborator calls that ended in a timeout
    pub collaborator_timeouts: u32,
}

impl RankedChains {
    pub fn best(&self) -> Option<&CausalChain> {
        self.chains.first()
    }

    pub fn is_degraded(&self) -> bool {
        self.unscored_by_trust || self.unscored_by_symbolic
    }
}

/// Strict chain ordering: best first
pub fn chain_rank_cmp(a: &CausalChain, b: &CausalChain) -> Ordering {
    b.confidence
        .total_cmp(&a.confidence)
        .then_with(|| a.len().cmp(&b.len()))
        .then_with(|| b.is_complete().cmp(&a.is_complete()))
        .then_with(|| a.residual_magnitude().total_cmp(&b.residual_magnitude()))
        .then_with(|| a.rule_ids().cmp(&b.rule_ids()))
}

/// Sorts chains by their current confidence without calling collaborators
pub fn sort_chains(chains: &mut [CausalChain]) {
    chains.sort_by(chain_rank_cmp);
}

/// Attaches trust and symbolic scoring to chains and ranks them
pub struct ScoringIntegrator {
    trust: Option<Arc<dyn TrustCollaborator>>,
    symbolic: Option<Arc<dyn SymbolicCollaborator>>,
    caller: Option<BoundedCaller>,
}

impl ScoringIntegrator {
    /// Integrator with no collaborators; every ranking is similarity-only
    pub fn unscored() -> Self {
        Self {
            trust: None,
            symbolic: None,
            caller: None,
        }
    }

    /// Integrator with the default timeout and retry budget
    pub fn new(
        trust: Option<Arc<dyn TrustCollaborator>>,
        symbolic: Option<Arc<dyn SymbolicCollaborator>>,
    ) -> Self {
        Self::with_bounds(
            trust,
            symbolic,
            Duration::from_millis(DEFAULT_TIMEOUT_MS),
            DEFAULT_RETRIES,
        )
    }

    pub fn with_bounds(
        trust: Option<Arc<dyn TrustCollaborator>>,
        symbolic: Option<Arc<dyn SymbolicCollaborator>>,
        timeout: Duration,
        retries: u32,
    ) -> Self {
        let caller = match BoundedCaller::new(timeout, retries) {
            Ok(caller) => Some(caller),
            Err(e) => {
                Logger::error("COLLABORATOR_RUNTIME_UNAVAILABLE", &[("reason", &e.to_string())]);
                None
            }
        };
        Self {
            trust,
            symbolic,
            caller,
        }
    }

    /// Scores and ranks `chains`.
    ///
    /// Never fails: collaborator problems degrade the ranking and set the
    /// `unscored_*` flags. Confidence is recomputed from step similarities,
    /// so ranking an already-ranked list yields the same order.
    pub fn rank_chains(&self, chains: Vec<CausalChain>, context: &ScoringContext) -> RankedChains {
        let mut timeouts = 0u32;

        let trust_scores = self.trust.as_ref().and_then(|trust| {
            let collab = Arc::clone(trust);
            self.collect_all("trust", &chains, context, &mut timeouts, move |chain, ctx| {
                let score = collab.score_chain(chain, ctx)?;
                if score.is_finite() {
                    Ok(score.clamp(0.0, 1.0))
                } else {
                    Err(CollaboratorError::InvalidResponse {
                        collaborator: "trust",
                        reason: format!("non-finite trust score {}", score),
                    })
                }
            })
        });

        let assessments = self.symbolic.as_ref().and_then(|symbolic| {
            let collab = Arc::clone(symbolic);
            self.collect_all("symbolic", &chains, context, &mut timeouts, move |chain, ctx| {
                let assessment = collab.tag_and_adjust(chain, ctx)?;
                if assessment.confidence_adjustment.is_finite() {
                    Ok(assessment)
                } else {
                    Err(CollaboratorError::InvalidResponse {
                        collaborator: "symbolic",
                        reason: "non-finite confidence adjustment".into(),
                    })
                }
            })
        });

        let unscored_by_trust = trust_scores.is_none();
        let unscored_by_symbolic = assessments.is_none();

        let mut ranked: Vec<CausalChain> = chains
            .into_iter()
            .enumerate()
            .map(|(i, mut chain)| {
                let trust = trust_scores.as_ref().map(|scores| scores[i]);
                let assessment = assessments
                    .as_ref()
                    .map(|all| all[i].clone())
                    .unwrap_or_default();

                let base = chain.mean_similarity() * trust.unwrap_or(1.0);
                chain.confidence = (base + assessment.confidence_adjustment).clamp(0.0, 1.0);
                chain.trust_score = trust;
                chain.symbolic_tags = assessment.tags;
                chain.unscored_by_trust = unscored_by_trust;
                chain.unscored_by_symbolic = unscored_by_symbolic;
                chain
            })
            .collect();

        sort_chains(&mut ranked);

        if unscored_by_trust || unscored_by_symbolic {
            log_event_with_fields(
                Event::RankingDegraded,
                &[
                    ("chains", &ranked.len().to_string()),
                    ("unscored_by_symbolic", bool_str(unscored_by_symbolic)),
                    ("unscored_by_trust", bool_str(unscored_by_trust)),
                ],
            );
        }
        log_event_with_fields(
            Event::RankingComplete,
            &[
                ("chains", &ranked.len().to_string()),
                ("trace_id", &context.trace_id.to_string()),
            ],
        );

        RankedChains {
            chains: ranked,
            unscored_by_trust,
            unscored_by_symbolic,
            collaborator_timeouts: timeouts,
        }
    }

    /// Calls `score` for every chain. `None` as soon as one chain cannot be
    /// scored.
    fn collect_all<T, F>(
        &self,
        name: &'static str,
        chains: &[CausalChain],
        context: &ScoringContext,
        timeouts: &mut u32,
        score: F,
    ) -> Option<Vec<T>>
    where
        T: Send + 'static,
        F: Fn(&CausalChain, &ScoringContext) -> Result<T, CollaboratorError>
            + Send
            + Sync
            + 'static,
    {
        let caller = self.caller.as_ref()?;
        let score = Arc::new(score);
        let mut results = Vec::with_capacity(chains.len());

        for chain in chains {
            let score = Arc::clone(&score);
            let chain = chain.clone();
            let ctx = context.clone();

            match caller.call(name, move || (*score)(&chain, &ctx)) {
                Ok(value) => results.push(value),
                Err(e) => {
                    let event = if e.is_timeout() {
                        *timeouts += 1;
                        Event::CollaboratorTimeout
                    } else {
                        Event::CollaboratorFailed
                    };
                    log_event_with_fields(
                        event,
                        &[
                            ("code", e.code()),
                            ("collaborator", name),
                            ("reason", &e.to_string()),
                            ("trace_id", &context.trace_id.to_string()),
                        ],
                    );
                    return None;
                }
            }
        }

        Some(results)
    }
}

fn bool_str(b: bool) -> &'static str {
    if b {
        "true"
    } else {
        "false"
    }
}

/// Similarity-only ranking, flagged unscored by both collaborators
pub fn rank_chains(chains: Vec<CausalChain>, context: &ScoringContext) -> RankedChains {
    ScoringIntegrator::unscored().rank_chains(chains, context)
}

impl std::fmt::Debug for ScoringIntegrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoringIntegrator")
            .field("trust", &self.trust.is_some())
            .field("symbolic", &self.symbolic.is_some())
            .field("caller", &self.caller)
            .finish()
    }
}
