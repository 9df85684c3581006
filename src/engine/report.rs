//! Retrodiction report and explain output

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::suggest::SuggestionResult;
use crate::tracer::{CausalChain, TraceOutcome, TraceStats};
use crate::world::Delta;

/// Everything one retrodiction request produced
#[derive(Debug, Clone, Serialize)]
pub struct RetrodictionReport {
    pub trace_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub delta: Delta,
    pub outcome: TraceOutcome,
    /// Ranked, best first
    pub chains: Vec<CausalChain>,
    pub closure_threshold: f64,
    pub stats: TraceStats,
    /// The store had no usable fingerprints
    pub empty_store: bool,
    pub unscored_by_trust: bool,
    pub unscored_by_symbolic: bool,
    /// Present when the chains do not explain the delta well enough
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<SuggestionResult>,
}

impl RetrodictionReport {
    pub fn best_chain(&self) -> Option<&CausalChain> {
        self.chains.first()
    }

    /// A complete chain exists and no suggestion was needed
    pub fn is_explained(&self) -> bool {
        self.outcome == TraceOutcome::Complete && self.suggestion.is_none()
    }

    pub fn is_degraded(&self) -> bool {
        self.empty_store || self.unscored_by_trust || self.unscored_by_symbolic
    }
}

impl fmt::Display for RetrodictionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== RETRODICTION ===")?;
        writeln!(f, "Trace: {}", self.trace_id)?;
        writeln!(f, "Status: {}", self.outcome.as_str())?;

        if self.delta.is_empty() {
            writeln!(f, "Delta: (no change)")?;
        } else {
            writeln!(f, "Delta:")?;
            for (field, change) in self.delta.iter() {
                writeln!(
                    f,
                    "  {} [{}]: {} -> {} ({:+})",
                    field,
                    change.kind,
                    change.from,
                    change.to,
                    change.change()
                )?;
            }
        }

        let mut flags = Vec::new();
        if self.empty_store {
            flags.push("empty_store");
        }
        if self.unscored_by_trust {
            flags.push("unscored_by_trust");
        }
        if self.unscored_by_symbolic {
            flags.push("unscored_by_symbolic");
        }
        if self.stats.expansion_limited {
            flags.push("expansion_limited");
        }
        if !flags.is_empty() {
            writeln!(f, "Flags: {}", flags.join(", "))?;
        }

        if !self.chains.is_empty() {
            writeln!(f, "Chains:")?;
        }
        for (rank, chain) in self.chains.iter().enumerate() {
            write!(
                f,
                "  {}. {} confidence={:.3} [{}]",
                rank + 1,
                chain.rule_ids().join(" -> "),
                chain.confidence,
                chain.status
            )?;
            if let Some(reason) = chain.abandon_reason {
                write!(f, " ({})", reason.as_str())?;
            }
            writeln!(f)?;
            if !chain.residual.is_empty() {
                writeln!(f, "     residual: {:.6}", chain.residual_magnitude())?;
            }
            if !chain.symbolic_tags.is_empty() {
                let tags: Vec<&str> = chain.symbolic_tags.iter().map(String::as_str).collect();
                writeln!(f, "     tags: {}", tags.join(", "))?;
            }
        }

        if let Some(suggestion) = &self.suggestion {
            let candidate = &suggestion.candidate;
            writeln!(f, "Suggested Fingerprint: {}", candidate.proposed_rule_id)?;
            for (field, effect) in &candidate.effects {
                writeln!(f, "  {}: {:+}", field, effect)?;
            }
            if candidate.schema_valid {
                writeln!(f, "Schema: VALID")?;
            } else {
                writeln!(f, "Schema: INVALID")?;
                for error in &candidate.validation_errors {
                    writeln!(f, "  - {}", error)?;
                }
            }
        }

        Ok(())
    }
}
