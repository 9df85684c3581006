//! Collaborator error types
//!
//! Collaborator failures are always recoverable: ranking degrades to
//! similarity-only and flags the result.

use thiserror::Error;

/// Result type for collaborator calls
pub type CollaboratorResult<T> = Result<T, CollaboratorError>;

/// Failure of an external Trust, Symbolic or Approval collaborator
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CollaboratorError {
    #[error("{collaborator} collaborator did not respond within {timeout_ms}ms")]
    Timeout {
        collaborator: &'static str,
        timeout_ms: u64,
    },

    #[error("{collaborator} collaborator unavailable: {reason}")]
    Unavailable {
        collaborator: &'static str,
        reason: String,
    },

    #[error("{collaborator} collaborator returned an invalid response: {reason}")]
    InvalidResponse {
        collaborator: &'static str,
        reason: String,
    },
}

impl CollaboratorError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            CollaboratorError::Timeout { .. } => "RETRO_COLLABORATOR_TIMEOUT",
            CollaboratorError::Unavailable { .. } => "RETRO_COLLABORATOR_UNAVAILABLE",
            CollaboratorError::InvalidResponse { .. } => "RETRO_COLLABORATOR_INVALID_RESPONSE",
        }
    }

    pub fn collaborator(&self) -> &'static str {
        match self {
            CollaboratorError::Timeout { collaborator, .. }
            | CollaboratorError::Unavailable { collaborator, .. }
            | CollaboratorError::InvalidResponse { collaborator, .. } => collaborator,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, CollaboratorError::Timeout { .. })
    }

    /// Shorthand for collaborators reporting they cannot serve the call
    pub fn unavailable(collaborator: &'static str, reason: impl Into<String>) -> Self {
        CollaboratorError::Unavailable {
            collaborator,
            reason: reason.into(),
        }
    }
}
