//! Fingerprint store error types

use thiserror::Error;

/// Result type for fingerprint store operations
pub type FingerprintResult<T> = Result<T, FingerprintError>;

/// Failures loading or populating a fingerprint store
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FingerprintError {
    #[error("failed to read fingerprint file '{path}': {reason}")]
    Io { path: String, reason: String },

    #[error("invalid fingerprint JSON in '{path}': {reason}")]
    InvalidJson { path: String, reason: String },

    #[error("fingerprint '{rule_id}' violates schema: {}", .errors.join("; "))]
    InvalidFingerprint { rule_id: String, errors: Vec<String> },

    #[error("duplicate rule_id '{0}'")]
    DuplicateRuleId(String),

    #[error("fingerprint store is empty")]
    EmptyStore,
}

impl FingerprintError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            FingerprintError::EmptyStore => "RETRO_EMPTY_FINGERPRINT_STORE",
            _ => "RETRO_FINGERPRINT_LOAD_FAILED",
        }
    }

    /// An empty store is recoverable; the request falls through to suggestion
    pub fn is_recoverable(&self) -> bool {
        matches!(self, FingerprintError::EmptyStore)
    }
}
