//! Rule fingerprint definition
//!
//! A fingerprint is the expected-effect signature of a causal rule: the delta
//! one application of the rule is expected to produce.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Expected-effect signature of a causal rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleFingerprint {
    pub rule_id: String,
    pub effects: BTreeMap<String, f64>,
    #[serde(default = "default_trust_weight")]
    pub trust_weight: f64,
}

fn default_trust_weight() -> f64 {
    1.0
}

impl RuleFingerprint {
    /// Fingerprint with full trust
    pub fn new<'a>(
        rule_id: impl Into<String>,
        effects: impl IntoIterator<Item = (&'a str, f64)>,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            effects: effects
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            trust_weight: default_trust_weight(),
        }
    }

    pub fn with_trust_weight(mut self, trust_weight: f64) -> Self {
        self.trust_weight = trust_weight;
        self
    }

    /// Sum of `|effect|` over every field
    pub fn effect_magnitude(&self) -> f64 {
        self.effects.values().map(|v| v.abs()).sum()
    }
}
