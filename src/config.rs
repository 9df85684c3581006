//! Engine configuration
//!
//! Read from a JSON file. Every field is optional; missing fields take the
//! defaults below. A loaded configuration is always validated.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::matcher::{FingerprintMatcher, DEFAULT_MIN_SIMILARITY};
use crate::scoring::{DEFAULT_RETRIES, DEFAULT_TIMEOUT_MS};
use crate::suggest::{FingerprintSuggester, DEFAULT_MIN_CONFIDENCE};
use crate::tracer::{
    ChainTracer, TraceLimits, DEFAULT_CLOSURE_RATIO, DEFAULT_MAX_BRANCHING, DEFAULT_MAX_DEPTH,
    DEFAULT_MAX_EXPANSIONS,
};
use crate::world::DEFAULT_EPSILON;

/// Result type for configuration
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration could not be read or is out of range
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {reason}")]
    Io { path: String, reason: String },

    #[error("invalid config JSON: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn code(&self) -> &'static str {
        "RETRO_INVALID_CONFIG"
    }
}

/// Tunables for one engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Changes at or below this are treated as no change
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,

    /// Similarity floor for a fingerprint match
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f64,

    /// Maximum steps per chain
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Matches expanded per branch
    #[serde(default = "default_max_branching")]
    pub max_branching: usize,

    /// Residual fraction of the original delta at which a chain closes
    #[serde(default = "default_closure_ratio")]
    pub closure_ratio: f64,

    /// Best-chain confidence below which a fingerprint is suggested
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,

    /// Branch states per request
    #[serde(default = "default_max_expansions")]
    pub max_expansions: usize,

    #[serde(default = "default_collaborator_timeout_ms")]
    pub collaborator_timeout_ms: u64,

    /// Retries after a failed collaborator call
    #[serde(default = "default_collaborator_retries")]
    pub collaborator_retries: u32,

    /// Passed to the approval hook with every submitted candidate
    #[serde(default)]
    pub approver: Option<String>,
}

fn default_epsilon() -> f64 {
    DEFAULT_EPSILON
}
fn default_min_similarity() -> f64 {
    DEFAULT_MIN_SIMILARITY
}
fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}
fn default_max_branching() -> usize {
    DEFAULT_MAX_BRANCHING
}
fn default_closure_ratio() -> f64 {
    DEFAULT_CLOSURE_RATIO
}
fn default_min_confidence() -> f64 {
    DEFAULT_MIN_CONFIDENCE
}
fn default_max_expansions() -> usize {
    DEFAULT_MAX_EXPANSIONS
}
fn default_collaborator_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}
fn default_collaborator_retries() -> u32 {
    DEFAULT_RETRIES
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            epsilon: default_epsilon(),
            min_similarity: default_min_similarity(),
            max_depth: default_max_depth(),
            max_branching: default_max_branching(),
            closure_ratio: default_closure_ratio(),
            min_confidence: default_min_confidence(),
            max_expansions: default_max_expansions(),
            collaborator_timeout_ms: default_collaborator_timeout_ms(),
            collaborator_retries: default_collaborator_retries(),
            approver: None,
        }
    }
}

impl EngineConfig {
    /// Load and validate configuration from a JSON file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let config: EngineConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.epsilon.is_finite() && self.epsilon > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "epsilon must be > 0, got {}",
                self.epsilon
            )));
        }

        for (name, value) in [
            ("min_similarity", self.min_similarity),
            ("closure_ratio", self.closure_ratio),
            ("min_confidence", self.min_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }

        if self.max_depth == 0 {
            return Err(ConfigError::Invalid("max_depth must be > 0".into()));
        }
        if self.max_branching == 0 {
            return Err(ConfigError::Invalid("max_branching must be > 0".into()));
        }
        if self.max_expansions == 0 {
            return Err(ConfigError::Invalid("max_expansions must be > 0".into()));
        }
        if self.collaborator_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "collaborator_timeout_ms must be > 0".into(),
            ));
        }

        Ok(())
    }

    pub fn matcher(&self) -> FingerprintMatcher {
        FingerprintMatcher::new(self.min_similarity, self.epsilon)
    }

    pub fn limits(&self) -> TraceLimits {
        TraceLimits {
            max_depth: self.max_depth,
            max_branching: self.max_branching,
            closure_ratio: self.closure_ratio,
            max_expansions: self.max_expansions,
        }
    }

    pub fn tracer(&self) -> ChainTracer {
        ChainTracer::new(self.matcher(), self.limits())
    }

    pub fn suggester(&self) -> FingerprintSuggester {
        FingerprintSuggester::new(self.min_confidence)
    }

    pub fn collaborator_timeout(&self) -> Duration {
        Duration::from_millis(self.collaborator_timeout_ms)
    }
}
