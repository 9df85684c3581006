//! Suggester error types

use thiserror::Error;

/// A candidate that failed schema validation.
///
/// Recoverable: it is reported alongside the candidate, never raised.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("candidate '{rule_id}' violates the fingerprint schema: {}", errors.join("; "))]
pub struct InvalidCandidateSchema {
    pub rule_id: String,
    pub errors: Vec<String>,
}

impl InvalidCandidateSchema {
    pub fn code(&self) -> &'static str {
        "RETRO_INVALID_CANDIDATE_SCHEMA"
    }
}
