//! Request-level errors
//!
//! Only two things end a retrodiction request early: a malformed snapshot and
//! cancellation. Everything else (empty store, collaborator failures, invalid
//! candidates) is reported in the [`super::RetrodictionReport`].

use thiserror::Error;

use crate::config::ConfigError;
use crate::fingerprint::FingerprintError;
use crate::tracer::TraceError;
use crate::world::SnapshotError;

/// Result type for engine operations
pub type RetroResult<T> = Result<T, RetroError>;

/// Whether an error ends the request or only degrades it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Fatal,
    Recoverable,
}

impl ErrorSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorSeverity::Fatal => "FATAL",
            ErrorSeverity::Recoverable => "RECOVERABLE",
        }
    }
}

/// Any error the engine facade can return
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RetroError {
    #[error("malformed snapshot: {0}")]
    MalformedSnapshot(#[from] SnapshotError),

    #[error(transparent)]
    Cancelled(#[from] TraceError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fingerprint(#[from] FingerprintError),
}

impl RetroError {
    pub fn code(&self) -> &'static str {
        match self {
            RetroError::MalformedSnapshot(e) => e.code(),
            RetroError::Cancelled(e) => e.code(),
            RetroError::Config(e) => e.code(),
            RetroError::Fingerprint(e) => e.code(),
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            RetroError::Fingerprint(e) if e.is_recoverable() => ErrorSeverity::Recoverable,
            RetroError::Cancelled(_) => ErrorSeverity::Recoverable,
            _ => ErrorSeverity::Fatal,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == ErrorSeverity::Fatal
    }
}
