//! Causal chain model

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::matcher::MatchResult;
use crate::world::Delta;

/// Terminal state of a traced branch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChainStatus {
    /// Residual fell to or below the closure threshold
    Complete,
    /// Branch stopped before explaining the delta
    Abandoned,
}

impl ChainStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainStatus::Complete => "COMPLETE",
            ChainStatus::Abandoned => "ABANDONED",
        }
    }
}

impl fmt::Display for ChainStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a branch was abandoned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbandonReason {
    /// `max_depth` reached with residual above closure
    DepthLimit,
    /// No match reduced the residual
    Stuck,
    /// Per-request branch budget exhausted
    ExpansionLimit,
}

impl AbandonReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AbandonReason::DepthLimit => "depth_limit",
            AbandonReason::Stuck => "stuck",
            AbandonReason::ExpansionLimit => "expansion_limit",
        }
    }
}

/// Ordered sequence of matched fingerprints proposed to explain a delta
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CausalChain {
    pub steps: Vec<MatchResult>,
    pub status: ChainStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abandon_reason: Option<AbandonReason>,
    /// Residual after the last step
    pub residual: Delta,
    /// Mean step similarity until ranked, final confidence afterwards
    pub confidence: f64,
    #[serde(default)]
    pub symbolic_tags: BTreeSet<String>,
    /// `None` until a trust collaborator has scored the chain
    #[serde(default)]
    pub trust_score: Option<f64>,
    #[serde(default)]
    pub unscored_by_trust: bool,
    #[serde(default)]
    pub unscored_by_symbolic: bool,
}

impl CausalChain {
    /// Chain built from steps, confidence set to the mean step similarity
    pub fn new(
        steps: Vec<MatchResult>,
        status: ChainStatus,
        abandon_reason: Option<AbandonReason>,
        residual: Delta,
    ) -> Self {
        let mut chain = Self {
            steps,
            status,
            abandon_reason,
            residual,
            confidence: 0.0,
            symbolic_tags: BTreeSet::new(),
            trust_score: None,
            unscored_by_trust: false,
            unscored_by_symbolic: false,
        };
        chain.confidence = chain.mean_similarity();
        chain
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.status == ChainStatus::Complete
    }

    pub fn rule_ids(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.rule_id.as_str()).collect()
    }

    /// Mean similarity over steps; zero for an empty chain
    pub fn mean_similarity(&self) -> f64 {
        if self.steps.is_empty() {
            return 0.0;
        }
        self.steps.iter().map(|s| s.similarity).sum::<f64>() / self.steps.len() as f64
    }

    pub fn residual_magnitude(&self) -> f64 {
        self.residual.magnitude()
    }

    /// Sum of every step's effects, per field
    pub fn composed_effects(&self) -> BTreeMap<String, f64> {
        let mut total: BTreeMap<String, f64> = BTreeMap::new();
        for step in &self.steps {
            for (field, effect) in &step.effects {
                *total.entry(field.clone()).or_insert(0.0) += effect;
            }
        }
        total
    }

    /// Rule ids sorted, used to detect the same explanation reached in a
    /// different order
    pub(crate) fn rule_set_key(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.steps.iter().map(|s| s.rule_id.clone()).collect();
        ids.sort();
        ids
    }
}
