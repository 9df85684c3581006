//! Chain tracer invariants
//!
//! Properties every traced chain must satisfy regardless of the library:
//!
//! 1. Complete chains close the delta within the closure threshold
//! 2. Residual magnitude never grows along a chain
//! 3. A chain's residual is the delta minus its composed effects
//! 4. Bounds (depth, branching, expansion budget) are respected
//! 5. Cancellation returns nothing

use std::collections::BTreeSet;
use std::thread;
use std::time::Duration;

use retrorule::fingerprint::{RuleFingerprint, StoreSnapshot};
use retrorule::matcher::FingerprintMatcher;
use retrorule::tracer::{
    trace_chains, AbandonReason, CancellationToken, ChainStatus, ChainTracer, TraceError,
    TraceLimits, TraceOutcome,
};
use retrorule::world::{Delta, DEFAULT_EPSILON};

fn library() -> StoreSnapshot {
    StoreSnapshot::from_fingerprints(vec![
        RuleFingerprint::new("A", [("a", 3.0)]),
        RuleFingerprint::new("B", [("b", 2.0)]),
        RuleFingerprint::new("C", [("c", 1.0)]),
        RuleFingerprint::new("AB", [("a", 3.0), ("b", 2.0)]),
        RuleFingerprint::new("N", [("a", 2.5)]),
    ])
}

fn observation() -> Delta {
    Delta::from_changes([("a", 0.0, 3.0), ("b", 0.0, 2.0), ("c", 0.0, 1.0)])
}

fn tracer(limits: TraceLimits) -> ChainTracer {
    ChainTracer::new(FingerprintMatcher::default(), limits)
}

// =============================================================================
// CLOSURE AND RESIDUALS
// =============================================================================

#[test]
fn test_chains_close_or_are_abandoned() {
    let delta = observation();
    for max_depth in 1..=4 {
        let report = trace_chains(&delta, &library(), max_depth, 3);

        for chain in &report.chains {
            assert!(!chain.is_empty());
            assert!(chain.len() <= max_depth);
            match chain.status {
                ChainStatus::Complete => assert!(
                    chain.residual_magnitude() <= report.closure_threshold + DEFAULT_EPSILON,
                    "complete chain {:?} left {}",
                    chain.rule_ids(),
                    chain.residual_magnitude()
                ),
                ChainStatus::Abandoned => assert!(chain.abandon_reason.is_some()),
            }
        }
    }
}

#[test]
fn test_residual_never_grows_along_a_chain() {
    let delta = observation();
    let report = trace_chains(&delta, &library(), 4, 3);
    assert_eq!(report.outcome, TraceOutcome::Complete);

    for chain in &report.chains {
        let mut previous = delta.magnitude();
        for step in &chain.steps {
            let magnitude = step.residual.magnitude();
            assert!(magnitude <= previous, "{:?} grew the residual", chain.rule_ids());
            previous = magnitude;
        }
    }
}

#[test]
fn test_residual_equals_delta_minus_composed_effects() {
    let delta = observation();
    for max_depth in [1, 2, 3] {
        let report = trace_chains(&delta, &library(), max_depth, 3);
        for chain in &report.chains {
            let composed = delta.residual_after(&chain.composed_effects(), DEFAULT_EPSILON);
            assert!((composed.magnitude() - chain.residual_magnitude()).abs() < 1e-9);
        }
    }
}

#[test]
fn test_abandoned_chains_ordered_by_residual() {
    let report = trace_chains(&observation(), &library(), 1, 3);
    assert_eq!(report.outcome, TraceOutcome::Abandoned);

    let residuals: Vec<f64> = report.chains.iter().map(|c| c.residual_magnitude()).collect();
    assert!(residuals.windows(2).all(|w| w[0] <= w[1]), "{:?}", residuals);
    assert_eq!(report.chains[0].rule_ids(), vec!["AB"]);
    assert!(report
        .chains
        .iter()
        .all(|c| c.abandon_reason == Some(AbandonReason::DepthLimit)));
}

// =============================================================================
// SEARCH BOUNDS
// =============================================================================

#[test]
fn test_no_duplicate_rule_sets() {
    let report = trace_chains(&observation(), &library(), 4, 3);

    let mut seen = BTreeSet::new();
    for chain in &report.chains {
        let mut ids: Vec<&str> = chain.rule_ids();
        ids.sort();
        assert!(seen.insert(ids), "duplicate chain {:?}", chain.rule_ids());
    }
}

#[test]
fn test_state_count_within_worst_case() {
    for (depth, branching) in [(1, 1), (2, 2), (3, 3), (5, 3)] {
        let limits = TraceLimits {
            max_depth: depth,
            max_branching: branching,
            ..TraceLimits::default()
        };
        let report = tracer(limits)
            .trace(&observation(), &library(), &CancellationToken::new())
            .unwrap();
        assert!(report.stats.states <= limits.worst_case_states());
    }
}

#[test]
fn test_expansion_budget_abandons_remaining_branches() {
    let limits = TraceLimits {
        max_expansions: 2,
        ..TraceLimits::default()
    };
    let report = tracer(limits)
        .trace(&observation(), &library(), &CancellationToken::new())
        .unwrap();

    assert!(report.stats.expansion_limited);
    assert!(report.stats.states <= 2);
    assert_eq!(report.outcome, TraceOutcome::Abandoned);
    assert!(report
        .chains
        .iter()
        .any(|c| c.abandon_reason == Some(AbandonReason::ExpansionLimit)));
}

#[test]
fn test_trace_is_deterministic() {
    let delta = observation();
    let first = trace_chains(&delta, &library(), 4, 3);
    let second = trace_chains(&delta, &library(), 4, 3);

    let ids = |r: &retrorule::tracer::TraceReport| -> Vec<Vec<String>> {
        r.chains
            .iter()
            .map(|c| c.rule_ids().into_iter().map(String::from).collect())
            .collect()
    };
    assert_eq!(ids(&first), ids(&second));
    assert_eq!(first.stats, second.stats);
}

// =============================================================================
// CANCELLATION
// =============================================================================

#[test]
fn test_cancelled_trace_returns_no_chains() {
    let cancel = CancellationToken::new();
    let handle = cancel.clone();
    handle.cancel();

    let result = ChainTracer::default().trace(&observation(), &library(), &cancel);
    assert!(matches!(result, Err(TraceError::Cancelled { .. })));
}

/// A trace cancelled while branches are being expanded discards them all.
#[test]
fn test_cancel_during_expansion_discards_partial_chains() {
    // Twelve independent single-field rules: every ordering is a branch, so the
    // search cannot finish before the cancel lands.
    let keys: Vec<String> = (0..12).map(|i| format!("k{:02}", i)).collect();
    let wide = StoreSnapshot::from_fingerprints(
        keys.iter()
            .map(|k| RuleFingerprint::new(k.clone(), [(k.as_str(), 1.0)])),
    );
    let delta = Delta::from_changes(keys.iter().map(|k| (k.as_str(), 0.0, 1.0)));

    let limits = TraceLimits {
        max_depth: 12,
        max_branching: 12,
        max_expansions: 50_000_000,
        ..TraceLimits::default()
    };

    let cancel = CancellationToken::new();
    let handle = cancel.clone();
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        handle.cancel();
    });

    let result = tracer(limits).trace(&delta, &wide, &cancel);
    canceller.join().unwrap();

    match result {
        Err(TraceError::Cancelled { expansions }) => {
            assert!(expansions > 1, "cancelled before any expansion");
        }
        Err(other) => panic!("unexpected error {:?}", other),
        Ok(report) => panic!("trace finished with {} chains", report.chains.len()),
    }
}

#[test]
fn test_empty_store_has_no_explanation() {
    let report = trace_chains(&observation(), &StoreSnapshot::default(), 5, 3);
    assert_eq!(report.outcome, TraceOutcome::NoExplanation);
    assert!(report.chains.is_empty());
}
