//! Multi-step chain tracing
//!
//! Branches live in an arena and are expanded breadth-first from a work queue.
//! Each branch is `ACTIVE(residual, depth)` until it becomes:
//!
//! - `COMPLETE`: residual magnitude <= closure threshold
//! - `ABANDONED`: depth limit hit, no match strictly shrinks the residual, or
//!   the per-request expansion budget is spent
//!
//! A child is only spawned for a match whose residual is strictly smaller than
//! its parent's, so every path terminates and residual magnitude is
//! non-increasing along every chain.

use std::collections::{BTreeSet, VecDeque};

use serde::Serialize;

use crate::fingerprint::StoreSnapshot;
use crate::matcher::{FingerprintMatcher, MatchResult, DEFAULT_MIN_SIMILARITY};
use crate::observability::{log_event_with_fields, Event, Logger, Severity};
use crate::world::{Delta, DEFAULT_EPSILON};

use super::cancel::CancellationToken;
use super::chain::{AbandonReason, CausalChain, ChainStatus};
use super::errors::{TraceError, TracerResult};

pub const DEFAULT_MAX_DEPTH: usize = 5;
pub const DEFAULT_MAX_BRANCHING: usize = 3;
pub const DEFAULT_CLOSURE_RATIO: f64 = 0.05;
pub const DEFAULT_MAX_EXPANSIONS: usize = 4096;

/// Search bounds for one trace
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceLimits {
    pub max_depth: usize,
    pub max_branching: usize,
    /// Closure threshold as a fraction of the original delta magnitude
    pub closure_ratio: f64,
    /// Hard cap on branch states created per request
    pub max_expansions: usize,
}

impl Default for TraceLimits {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_branching: DEFAULT_MAX_BRANCHING,
            closure_ratio: DEFAULT_CLOSURE_RATIO,
            max_expansions: DEFAULT_MAX_EXPANSIONS,
        }
    }
}

impl TraceLimits {
    /// Upper bound on branch states: `min(Σ b^d for d in 0..=max_depth, max_expansions)`
    pub fn worst_case_states(&self) -> usize {
        let mut total: usize = 0;
        let mut level: usize = 1;
        for _ in 0..=self.max_depth {
            total = total.saturating_add(level);
            level = level.saturating_mul(self.max_branching);
        }
        total.min(self.max_expansions)
    }
}

/// Overall result of a trace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TraceOutcome {
    /// At least one chain closed the delta; only complete chains are returned
    Complete,
    /// No chain closed; best-effort abandoned chains are returned
    Abandoned,
    /// Nothing matched, or there was nothing to explain
    NoExplanation,
}

impl TraceOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TraceOutcome::Complete => "COMPLETE",
            TraceOutcome::Abandoned => "ABANDONED",
            TraceOutcome::NoExplanation => "NO_EXPLANATION",
        }
    }
}

/// Counters for one trace
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TraceStats {
    /// Branch states created, root included
    pub states: usize,
    /// Fingerprint comparisons performed
    pub fingerprints_scored: usize,
    pub complete: usize,
    pub abandoned: usize,
    /// Chains dropped because an earlier chain used the same rules
    pub duplicates: usize,
    pub expansion_limited: bool,
}

/// Chains found for one delta, tagged by outcome
#[derive(Debug, Clone, Serialize)]
pub struct TraceReport {
    pub outcome: TraceOutcome,
    pub chains: Vec<CausalChain>,
    pub closure_threshold: f64,
    pub stats: TraceStats,
}

impl TraceReport {
    pub fn is_complete(&self) -> bool {
        self.outcome == TraceOutcome::Complete
    }
}

struct BranchState {
    parent: Option<usize>,
    step: Option<MatchResult>,
    residual: Delta,
    depth: usize,
}

/// Composes single-step matches into chains
#[derive(Debug, Clone, Copy)]
pub struct ChainTracer {
    matcher: FingerprintMatcher,
    limits: TraceLimits,
}

impl Default for ChainTracer {
    fn default() -> Self {
        Self::new(FingerprintMatcher::default(), TraceLimits::default())
    }
}

impl ChainTracer {
    pub fn new(matcher: FingerprintMatcher, limits: TraceLimits) -> Self {
        Self { matcher, limits }
    }

    pub fn limits(&self) -> &TraceLimits {
        &self.limits
    }

    /// Traces `delta` against `store`.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError::Cancelled`] if `cancel` fires; no partial chains
    /// are returned in that case.
    pub fn trace(
        &self,
        delta: &Delta,
        store: &StoreSnapshot,
        cancel: &CancellationToken,
    ) -> TracerResult<TraceReport> {
        let epsilon = self.matcher.epsilon();
        let closure_threshold = self.limits.closure_ratio * delta.magnitude();

        let mut stats = TraceStats::default();
        let mut arena: Vec<BranchState> = vec![BranchState {
            parent: None,
            step: None,
            residual: delta.clone(),
            depth: 0,
        }];
        let mut queue: VecDeque<usize> = VecDeque::from([0]);
        let mut complete: Vec<usize> = Vec::new();
        let mut abandoned: Vec<(usize, AbandonReason)> = Vec::new();

        while let Some(idx) = queue.pop_front() {
            if cancel.is_cancelled() {
                log_event_with_fields(
                    Event::RequestCancelled,
                    &[("states", &arena.len().to_string())],
                );
                return Err(TraceError::Cancelled {
                    expansions: arena.len(),
                });
            }

            let magnitude = arena[idx].residual.magnitude();
            let depth = arena[idx].depth;

            if magnitude <= closure_threshold + epsilon {
                if depth > 0 {
                    complete.push(idx);
                }
                continue;
            }

            if depth >= self.limits.max_depth {
                abandoned.push((idx, AbandonReason::DepthLimit));
                continue;
            }

            stats.fingerprints_scored += store.len();
            let reducing: Vec<MatchResult> = self
                .matcher
                .match_delta(&arena[idx].residual, store)
                .into_iter()
                .filter(|m| m.residual.magnitude() < magnitude - epsilon)
                .take(self.limits.max_branching)
                .collect();

            if reducing.is_empty() {
                abandoned.push((idx, AbandonReason::Stuck));
                continue;
            }

            let mut spawned = 0;
            for step in reducing {
                if arena.len() >= self.limits.max_expansions {
                    if !stats.expansion_limited {
                        stats.expansion_limited = true;
                        log_event_with_fields(
                            Event::ExpansionLimitReached,
                            &[("max_expansions", &self.limits.max_expansions.to_string())],
                        );
                    }
                    break;
                }
                arena.push(BranchState {
                    parent: Some(idx),
                    residual: step.residual.clone(),
                    step: Some(step),
                    depth: depth + 1,
                });
                queue.push_back(arena.len() - 1);
                spawned += 1;
            }

            if spawned == 0 {
                abandoned.push((idx, AbandonReason::ExpansionLimit));
            }
        }

        stats.states = arena.len();

        let mut seen: BTreeSet<Vec<String>> = BTreeSet::new();
        let mut keep_unique = |chain: CausalChain, stats: &mut TraceStats| -> Option<CausalChain> {
            if seen.insert(chain.rule_set_key()) {
                Some(chain)
            } else {
                stats.duplicates += 1;
                None
            }
        };

        let complete_chains: Vec<CausalChain> = complete
            .iter()
            .map(|&idx| build_chain(&arena, idx, ChainStatus::Complete, None))
            .filter_map(|chain| keep_unique(chain, &mut stats))
            .collect();
        stats.complete = complete_chains.len();

        let report = if !complete_chains.is_empty() {
            TraceReport {
                outcome: TraceOutcome::Complete,
                chains: complete_chains,
                closure_threshold,
                stats,
            }
        } else {
            let mut abandoned_chains: Vec<CausalChain> = abandoned
                .iter()
                .filter(|(idx, _)| arena[*idx].depth > 0)
                .map(|&(idx, reason)| {
                    build_chain(&arena, idx, ChainStatus::Abandoned, Some(reason))
                })
                .filter_map(|chain| keep_unique(chain, &mut stats))
                .collect();
            abandoned_chains.sort_by(|a, b| {
                a.residual_magnitude()
                    .total_cmp(&b.residual_magnitude())
                    .then_with(|| a.len().cmp(&b.len()))
            });
            stats.abandoned = abandoned_chains.len();

            if Logger::enabled(Severity::Trace) {
                for chain in &abandoned_chains {
                    Logger::trace(
                        Event::ChainAbandoned.as_str(),
                        &[
                            ("reason", chain.abandon_reason.map_or("", |r| r.as_str())),
                            ("residual", &format!("{:.6}", chain.residual_magnitude())),
                            ("rules", &chain.rule_ids().join(",")),
                        ],
                    );
                }
            }

            TraceReport {
                outcome: if abandoned_chains.is_empty() {
                    TraceOutcome::NoExplanation
                } else {
                    TraceOutcome::Abandoned
                },
                chains: abandoned_chains,
                closure_threshold,
                stats,
            }
        };

        Ok(report)
    }
}

fn build_chain(
    arena: &[BranchState],
    leaf: usize,
    status: ChainStatus,
    reason: Option<AbandonReason>,
) -> CausalChain {
    let mut steps = Vec::with_capacity(arena[leaf].depth);
    let mut cursor = Some(leaf);
    while let Some(idx) = cursor {
        if let Some(step) = &arena[idx].step {
            steps.push(step.clone());
        }
        cursor = arena[idx].parent;
    }
    steps.reverse();
    CausalChain::new(steps, status, reason, arena[leaf].residual.clone())
}

/// Traces `delta` with default similarity floor, closure ratio and budget
pub fn trace_chains(
    delta: &Delta,
    store: &StoreSnapshot,
    max_depth: usize,
    max_branching: usize,
) -> TraceReport {
    let tracer = ChainTracer::new(
        FingerprintMatcher::new(DEFAULT_MIN_SIMILARITY, DEFAULT_EPSILON),
        TraceLimits {
            max_depth,
            max_branching,
            ..TraceLimits::default()
        },
    );
    // A fresh token is never cancelled.
    match tracer.trace(delta, store, &CancellationToken::new()) {
        Ok(report) => report,
        Err(TraceError::Cancelled { .. }) => TraceReport {
            outcome: TraceOutcome::NoExplanation,
            chains: Vec::new(),
            closure_threshold: 0.0,
            stats: TraceStats::default(),
        },
    }
}
