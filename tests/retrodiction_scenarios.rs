//! End-to-end retrodiction scenarios
//!
//! Each test runs a concrete observation through the public API and checks
//! the matches, chains and suggestions it produces.

use std::sync::Arc;

use serde_json::json;

use retrorule::engine::{RetroError, ReverseRuleEngine};
use retrorule::fingerprint::{FingerprintStore, InMemoryFingerprintStore, RuleFingerprint, StoreSnapshot};
use retrorule::matcher::match_fingerprints;
use retrorule::scoring::{FingerprintTrust, OverlayTagger};
use retrorule::suggest::{suggest_fingerprint, RecordingApprovalHook, SuggestionBasis};
use retrorule::tracer::{trace_chains, ChainStatus, TraceOutcome};
use retrorule::world::{compute_delta, Delta, WorldStateSnapshot};
use retrorule::EngineConfig;

fn store(fingerprints: Vec<RuleFingerprint>) -> Arc<dyn FingerprintStore> {
    Arc::new(InMemoryFingerprintStore::from_fingerprints(fingerprints).unwrap())
}

fn snapshot(value: serde_json::Value) -> WorldStateSnapshot {
    WorldStateSnapshot::from_value(&value).unwrap()
}

// =============================================================================
// SINGLE-RULE EXPLANATIONS
// =============================================================================

/// An inflation rise of 0.5 is explained by exactly one rule predicting it.
#[test]
fn test_inflation_rise_matches_single_rule() {
    let delta = Delta::from_changes([("inflation", 1.0, 1.5)]);
    let snapshot = StoreSnapshot::from_fingerprints(vec![RuleFingerprint::new(
        "R1",
        [("inflation", 0.5)],
    )]);

    let matches = match_fingerprints(&delta, &snapshot, 0.7);
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].rule_id, "R1");
    assert_eq!(matches[0].similarity, 1.0);

    let report = trace_chains(&delta, &snapshot, 5, 3);
    assert_eq!(report.outcome, TraceOutcome::Complete);
    assert_eq!(report.chains.len(), 1);
    assert_eq!(report.chains[0].status, ChainStatus::Complete);
    assert_eq!(report.chains[0].len(), 1);
}

/// Exact effects score exactly the fingerprint's trust weight.
#[test]
fn test_exact_match_similarity_is_trust_weight() {
    let delta = Delta::from_changes([("gdp", 2.0, 1.0), ("unrest", 0.0, 2.0)]);
    let snapshot = StoreSnapshot::from_fingerprints(vec![
        RuleFingerprint::new("recession", [("gdp", -1.0), ("unrest", 2.0)]).with_trust_weight(0.75),
        RuleFingerprint::new("riot", [("unrest", 4.0)]),
    ]);

    let matches = match_fingerprints(&delta, &snapshot, 0.0);
    assert_eq!(matches[0].rule_id, "recession");
    assert_eq!(matches[0].similarity, 0.75);
}

// =============================================================================
// UNEXPLAINED OBSERVATIONS
// =============================================================================

/// Nothing covers the delta: no matches, no chains, and a valid candidate
/// carrying the whole delta.
#[test]
fn test_uncovered_delta_yields_full_candidate() {
    let delta = Delta::from_changes([("gdp", 1.0, 2.0), ("unrest", 3.0, 1.0)]);
    let snapshot = StoreSnapshot::from_fingerprints(vec![RuleFingerprint::new(
        "R1",
        [("inflation", 0.5)],
    )]);

    assert!(match_fingerprints(&delta, &snapshot, 0.7).is_empty());

    let report = trace_chains(&delta, &snapshot, 5, 3);
    assert!(report.chains.is_empty());
    assert_eq!(report.outcome, TraceOutcome::NoExplanation);

    let candidate = suggest_fingerprint(&delta);
    assert!(candidate.schema_valid);
    assert!(candidate.validation_errors.is_empty());
    assert_eq!(candidate.effects, delta.changes());
}

/// A delta needing two rules cannot close within one step.
#[test]
fn test_depth_one_leaves_only_abandoned_chains() {
    let delta = Delta::from_changes([("a", 0.0, 1.0), ("b", 0.0, 1.0)]);
    let snapshot = StoreSnapshot::from_fingerprints(vec![
        RuleFingerprint::new("A", [("a", 1.0)]),
        RuleFingerprint::new("B", [("b", 1.0)]),
    ]);

    let shallow = trace_chains(&delta, &snapshot, 1, 3);
    assert_eq!(shallow.outcome, TraceOutcome::Abandoned);
    assert!(!shallow.chains.is_empty());
    for chain in &shallow.chains {
        assert_eq!(chain.status, ChainStatus::Abandoned);
        assert!(chain.residual_magnitude() > 0.0);
    }

    let deep = trace_chains(&delta, &snapshot, 2, 3);
    assert_eq!(deep.outcome, TraceOutcome::Complete);
    assert_eq!(deep.chains.len(), 1);
    assert_eq!(deep.chains[0].len(), 2);
}

// =============================================================================
// ENGINE PIPELINE
// =============================================================================

#[test]
fn test_engine_explains_overlay_shift_with_tags() {
    let engine = ReverseRuleEngine::builder(store(vec![RuleFingerprint::new(
        "propaganda",
        [("hope", 0.25)],
    )]))
    .trust(Arc::new(FingerprintTrust))
    .symbolic(Arc::new(OverlayTagger))
    .build()
    .unwrap();

    let before = snapshot(json!({
        "turn": 4,
        "variables": { "gdp": 1.0 },
        "overlays": { "hope": 0.25 },
        "capital": {}
    }));
    let after = snapshot(json!({
        "turn": 5,
        "variables": { "gdp": 1.0 },
        "overlays": { "hope": 0.5 },
        "capital": {}
    }));

    let report = engine.retrodict(&before, &after).unwrap();

    assert!(report.is_explained());
    assert!(!report.is_degraded());
    let best = report.best_chain().unwrap();
    assert_eq!(best.rule_ids(), vec!["propaganda"]);
    assert_eq!(best.confidence, 1.0);
    assert_eq!(best.trust_score, Some(1.0));
    assert!(best.symbolic_tags.contains("overlay:hope"));
}

#[test]
fn test_engine_suggests_from_abandoned_residual() {
    let config = EngineConfig {
        max_depth: 1,
        ..Default::default()
    };
    let engine = ReverseRuleEngine::builder(store(vec![
        RuleFingerprint::new("A", [("a", 1.0)]),
        RuleFingerprint::new("B", [("b", 1.0)]),
    ]))
    .config(config)
    .build()
    .unwrap();

    let before = WorldStateSnapshot::new(1).with_variable("a", 0.0).with_variable("b", 0.0);
    let after = WorldStateSnapshot::new(2).with_variable("a", 1.0).with_variable("b", 1.0);

    let report = engine.retrodict(&before, &after).unwrap();
    assert_eq!(report.outcome, TraceOutcome::Abandoned);

    let suggestion = report.suggestion.as_ref().unwrap();
    assert_eq!(suggestion.basis, SuggestionBasis::AbandonedResidual);
    assert_eq!(suggestion.candidate.effects, Delta::from_changes([("b", 0.0, 1.0)]).changes());
    assert!(suggestion.schema_valid());
    assert_eq!(suggestion.submitted, None);
}

#[test]
fn test_empty_store_flags_report_and_submits_candidate() {
    let recorder = Arc::new(RecordingApprovalHook::new());
    let mut config = EngineConfig::default();
    config.approver = Some("curator".into());

    let engine = ReverseRuleEngine::builder(store(vec![]))
        .config(config)
        .approval_hook(recorder.clone())
        .build()
        .unwrap();

    let before = WorldStateSnapshot::new(1).with_capital("treasury", 100.0);
    let after = WorldStateSnapshot::new(2).with_capital("treasury", 80.0);
    let report = engine.retrodict(&before, &after).unwrap();

    assert!(report.empty_store);
    assert!(report.chains.is_empty());
    let suggestion = report.suggestion.as_ref().unwrap();
    assert_eq!(suggestion.candidate.effects["treasury"], -20.0);
    assert_eq!(suggestion.submitted, Some(true));

    let submissions = recorder.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].0.proposed_rule_id, suggestion.candidate.proposed_rule_id);
    assert_eq!(submissions[0].1.as_deref(), Some("curator"));
}

#[test]
fn test_low_confidence_complete_chain_still_suggests() {
    let engine = ReverseRuleEngine::builder(store(vec![
        RuleFingerprint::new("weak", [("x", 1.0)]).with_trust_weight(0.5),
    ]))
    .config(EngineConfig {
        min_similarity: 0.25,
        ..Default::default()
    })
    .trust(Arc::new(FingerprintTrust))
    .build()
    .unwrap();

    let before = WorldStateSnapshot::new(1).with_variable("x", 0.0);
    let after = WorldStateSnapshot::new(2).with_variable("x", 1.0);
    let report = engine.retrodict(&before, &after).unwrap();

    assert_eq!(report.outcome, TraceOutcome::Complete);
    // exact match, so confidence is the trust weight
    assert_eq!(report.best_chain().unwrap().confidence, 0.5);
    let suggestion = report.suggestion.as_ref().unwrap();
    assert_eq!(suggestion.basis, SuggestionBasis::OriginalDelta);
    assert!(!report.is_explained());
}

/// A trusted rule that matches exactly is not proposed again.
#[test]
fn test_exact_match_of_weighted_rule_needs_no_suggestion() {
    let engine = ReverseRuleEngine::builder(store(vec![
        RuleFingerprint::new("R1", [("inflation", 0.5)]).with_trust_weight(0.8),
    ]))
    .trust(Arc::new(FingerprintTrust))
    .symbolic(Arc::new(OverlayTagger))
    .build()
    .unwrap();

    let before = WorldStateSnapshot::new(1).with_variable("inflation", 1.0);
    let after = WorldStateSnapshot::new(2).with_variable("inflation", 1.5);
    let report = engine.retrodict(&before, &after).unwrap();

    let best = report.best_chain().unwrap();
    assert_eq!(best.rule_ids(), vec!["R1"]);
    assert_eq!(best.trust_score, Some(1.0));
    assert_eq!(best.confidence, 0.8);
    assert!(report.suggestion.is_none());
    assert!(report.is_explained());
}

// =============================================================================
// MALFORMED INPUT
// =============================================================================

#[test]
fn test_missing_key_is_fatal() {
    let result = WorldStateSnapshot::from_value(&json!({
        "turn": 1,
        "variables": {},
        "overlays": {}
    }));
    let err = RetroError::from(result.unwrap_err());
    assert_eq!(err.code(), "RETRO_MALFORMED_SNAPSHOT");
    assert!(err.is_fatal());
}

#[test]
fn test_field_changing_kind_is_rejected() {
    let before = WorldStateSnapshot::new(1).with_variable("stability", 0.5);
    let after = WorldStateSnapshot::new(2).with_overlay("stability", 0.5);
    assert!(compute_delta(&before, &after).is_err());

    let engine = ReverseRuleEngine::new(store(vec![]), EngineConfig::default()).unwrap();
    let err = engine.retrodict(&before, &after).unwrap_err();
    assert!(matches!(err, RetroError::MalformedSnapshot(_)));
}

// =============================================================================
// EXPLAIN OUTPUT
// =============================================================================

#[test]
fn test_explain_output_lists_chain_and_delta() {
    let engine = ReverseRuleEngine::new(
        store(vec![RuleFingerprint::new("R1", [("inflation", 0.5)])]),
        EngineConfig::default(),
    )
    .unwrap();
    let before = WorldStateSnapshot::new(1).with_variable("inflation", 1.0);
    let after = WorldStateSnapshot::new(2).with_variable("inflation", 1.5);

    let text = engine.retrodict(&before, &after).unwrap().to_string();

    assert!(text.starts_with("=== RETRODICTION ==="));
    assert!(text.contains("Status: COMPLETE"));
    assert!(text.contains("inflation [variable]: 1 -> 1.5 (+0.5)"));
    assert!(text.contains("1. R1 confidence=1.000 [COMPLETE]"));
    assert!(text.contains("Flags: unscored_by_trust, unscored_by_symbolic"));
    assert!(!text.contains("Suggested Fingerprint"));
}
