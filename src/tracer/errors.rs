//! Tracer error types

use thiserror::Error;

/// Result type for chain tracing
pub type TracerResult<T> = Result<T, TraceError>;

/// The only way tracing fails. Branch-level dead ends are outcomes, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TraceError {
    #[error("request cancelled after {expansions} branch expansions")]
    Cancelled { expansions: usize },
}

impl TraceError {
    pub fn code(&self) -> &'static str {
        "RETRO_REQUEST_CANCELLED"
    }
}
