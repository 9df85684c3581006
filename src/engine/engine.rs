//! Reverse rule engine
//!
//! One request is one `(before, after)` snapshot pair:
//!
//! ```text
//! compute_delta -> snapshot store -> trace -> rank -> suggest? -> submit?
//! ```
//!
//! The store is copied once per request, so concurrent insertions by an
//! approval process never change what a request sees. Requests share no
//! mutable state besides the counters.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::fingerprint::{FingerprintStore, StoreSnapshot};
use crate::matcher::MatchResult;
use crate::observability::{
    log_event_with_fields, EngineMetrics, Event, MetricsSnapshot, ObservationScope,
};
use crate::scoring::{
    BoundedCaller, ScoringContext, ScoringIntegrator, SymbolicCollaborator, TrustCollaborator,
};
use crate::suggest::{submit_bounded, ApprovalHook, FingerprintSuggester};
use crate::tracer::{CancellationToken, ChainTracer};
use crate::world::{compute_delta_with_epsilon, Delta, WorldStateSnapshot};

use super::errors::{RetroError, RetroResult};
use super::report::RetrodictionReport;

/// Collects collaborators for a [`ReverseRuleEngine`]
pub struct EngineBuilder {
    store: Arc<dyn FingerprintStore>,
    config: EngineConfig,
    trust: Option<Arc<dyn TrustCollaborator>>,
    symbolic: Option<Arc<dyn SymbolicCollaborator>>,
    approval: Option<Arc<dyn ApprovalHook>>,
}

impl EngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn trust(mut self, trust: Arc<dyn TrustCollaborator>) -> Self {
        self.trust = Some(trust);
        self
    }

    pub fn symbolic(mut self, symbolic: Arc<dyn SymbolicCollaborator>) -> Self {
        self.symbolic = Some(symbolic);
        self
    }

    pub fn approval_hook(mut self, hook: Arc<dyn ApprovalHook>) -> Self {
        self.approval = Some(hook);
        self
    }

    /// Validates the configuration and builds the engine
    pub fn build(self) -> RetroResult<ReverseRuleEngine> {
        self.config.validate()?;

        let timeout = self.config.collaborator_timeout();
        let retries = self.config.collaborator_retries;

        let approval_caller = match &self.approval {
            Some(_) => BoundedCaller::new(timeout, retries).ok(),
            None => None,
        };

        Ok(ReverseRuleEngine {
            tracer: self.config.tracer(),
            suggester: self.config.suggester(),
            integrator: ScoringIntegrator::with_bounds(self.trust, self.symbolic, timeout, retries),
            store: self.store,
            approval: self.approval,
            approval_caller,
            metrics: EngineMetrics::new(),
            config: self.config,
        })
    }
}

/// Retrodiction facade: explains observed changes with known rules
pub struct ReverseRuleEngine {
    store: Arc<dyn FingerprintStore>,
    config: EngineConfig,
    tracer: ChainTracer,
    suggester: FingerprintSuggester,
    integrator: ScoringIntegrator,
    approval: Option<Arc<dyn ApprovalHook>>,
    approval_caller: Option<BoundedCaller>,
    metrics: EngineMetrics,
}

impl ReverseRuleEngine {
    pub fn builder(store: Arc<dyn FingerprintStore>) -> EngineBuilder {
        EngineBuilder {
            store,
            config: EngineConfig::default(),
            trust: None,
            symbolic: None,
            approval: None,
        }
    }

    /// Engine with no collaborators; rankings are similarity-only
    pub fn new(store: Arc<dyn FingerprintStore>, config: EngineConfig) -> RetroResult<Self> {
        Self::builder(store).config(config).build()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Delta between two snapshots with the configured epsilon
    pub fn compute_delta(
        &self,
        before: &WorldStateSnapshot,
        after: &WorldStateSnapshot,
    ) -> RetroResult<Delta> {
        compute_delta_with_epsilon(before, after, self.config.epsilon).map_err(|e| {
            log_event_with_fields(
                Event::SnapshotRejected,
                &[("code", e.code()), ("reason", &e.to_string())],
            );
            RetroError::from(e)
        })
    }

    /// Single-step matches of `delta` against a fresh store snapshot
    pub fn match_delta(&self, delta: &Delta) -> Vec<MatchResult> {
        let snapshot = self.snapshot_store().0;
        let matches = self.config.matcher().match_delta(delta, &snapshot);
        self.metrics.add_fingerprints_scored(snapshot.len() as u64);
        matches
    }

    /// Runs the full pipeline for one snapshot pair
    pub fn retrodict(
        &self,
        before: &WorldStateSnapshot,
        after: &WorldStateSnapshot,
    ) -> RetroResult<RetrodictionReport> {
        self.retrodict_with_cancel(before, after, &CancellationToken::new())
    }

    /// Like [`Self::retrodict`], checking `cancel` between branch expansions.
    ///
    /// # Errors
    ///
    /// - [`RetroError::MalformedSnapshot`] if either snapshot is unusable
    /// - [`RetroError::Cancelled`] if `cancel` fires; nothing partial is returned
    pub fn retrodict_with_cancel(
        &self,
        before: &WorldStateSnapshot,
        after: &WorldStateSnapshot,
        cancel: &CancellationToken,
    ) -> RetroResult<RetrodictionReport> {
        self.metrics.increment_requests();
        let trace_id = Uuid::new_v4();
        let trace = trace_id.to_string();
        let scope = ObservationScope::with_fields("RETRODICTION", &[("trace_id", &trace)]);

        let delta = match self.compute_delta(before, after) {
            Ok(delta) => delta,
            Err(e) => {
                self.metrics.increment_rejected();
                scope.fail(e.code(), &e.to_string());
                return Err(e);
            }
        };
        log_event_with_fields(
            Event::DeltaComputed,
            &[
                ("fields", &delta.len().to_string()),
                ("magnitude", &format!("{:.6}", delta.magnitude())),
                ("trace_id", &trace),
            ],
        );

        let (snapshot, empty_store) = self.snapshot_store();

        let traced = match self.tracer.trace(&delta, &snapshot, cancel) {
            Ok(traced) => traced,
            Err(e) => {
                self.metrics.increment_cancelled();
                scope.fail(e.code(), &e.to_string());
                return Err(e.into());
            }
        };
        self.metrics
            .add_fingerprints_scored(traced.stats.fingerprints_scored as u64);
        self.metrics
            .add_chains(traced.stats.complete as u64, traced.stats.abandoned as u64);
        log_event_with_fields(
            Event::TraceComplete,
            &[
                ("chains", &traced.chains.len().to_string()),
                ("outcome", traced.outcome.as_str()),
                ("states", &traced.stats.states.to_string()),
                ("trace_id", &trace),
            ],
        );

        let context = ScoringContext::new(trace_id, delta.clone());
        let ranked = self.integrator.rank_chains(traced.chains, &context);
        self.metrics
            .add_collaborator_timeouts(u64::from(ranked.collaborator_timeouts));
        if ranked.is_degraded() {
            self.metrics.increment_degraded();
        }

        let mut suggestion = if delta.is_empty() {
            None
        } else {
            self.suggester
                .suggest_for(&delta, &ranked.chains, trace_id, self.store.as_ref())
        };

        if let Some(result) = suggestion.as_mut() {
            self.metrics.increment_candidates_proposed();
            if result.schema_valid() {
                result.submitted = self.submit(&result.candidate);
                if result.submitted == Some(true) {
                    self.metrics.increment_candidates_submitted();
                }
            }
        }

        let report = RetrodictionReport {
            trace_id,
            generated_at: Utc::now(),
            delta,
            outcome: traced.outcome,
            chains: ranked.chains,
            closure_threshold: traced.closure_threshold,
            stats: traced.stats,
            empty_store,
            unscored_by_trust: ranked.unscored_by_trust,
            unscored_by_symbolic: ranked.unscored_by_symbolic,
            suggestion,
        };

        scope.complete_with_fields(&[
            ("chains", &report.chains.len().to_string()),
            ("outcome", report.outcome.as_str()),
            ("suggested", if report.suggestion.is_some() { "true" } else { "false" }),
        ]);

        Ok(report)
    }

    /// Retrodicts every consecutive pair of `history`, oldest first.
    ///
    /// Fewer than two snapshots yields no reports. Stops at the first error.
    pub fn retrodict_history(
        &self,
        history: &[WorldStateSnapshot],
    ) -> RetroResult<Vec<RetrodictionReport>> {
        history
            .windows(2)
            .map(|pair| self.retrodict(&pair[0], &pair[1]))
            .collect()
    }

    fn snapshot_store(&self) -> (StoreSnapshot, bool) {
        let snapshot = StoreSnapshot::capture(self.store.as_ref());
        log_event_with_fields(
            Event::StoreSnapshotTaken,
            &[("fingerprints", &snapshot.len().to_string())],
        );
        let empty = match snapshot.require_non_empty() {
            Ok(()) => false,
            Err(e) => {
                log_event_with_fields(Event::StoreEmpty, &[("code", e.code())]);
                true
            }
        };
        (snapshot, empty)
    }

    fn submit(&self, candidate: &crate::suggest::FingerprintCandidate) -> Option<bool> {
        let hook = self.approval.as_ref()?;
        let caller = self.approval_caller.as_ref()?;
        submit_bounded(caller, hook, candidate, self.config.approver.as_deref())
    }
}

impl std::fmt::Debug for ReverseRuleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReverseRuleEngine")
            .field("config", &self.config)
            .field("integrator", &self.integrator)
            .field("approval", &self.approval.is_some())
            .finish()
    }
}
