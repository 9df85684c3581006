//! Snapshot error types
//!
//! Every variant maps to `RETRO_MALFORMED_SNAPSHOT` and is fatal for the
//! request that produced it.

use thiserror::Error;

use super::delta::FieldKind;

/// Result type for snapshot and delta operations
pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// A world-state snapshot that cannot be used for retrodiction
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SnapshotError {
    #[error("snapshot must be a JSON object")]
    NotAnObject,

    #[error("missing required key '{0}'")]
    MissingKey(&'static str),

    #[error("key '{key}' must be {expected}")]
    WrongType { key: String, expected: &'static str },

    #[error("field '{field}' is not a finite number")]
    NonFinite { field: String },

    #[error("overlay '{field}' = {value} is outside [0, 1]")]
    OverlayOutOfRange { field: String, value: f64 },

    #[error("field '{field}' appears as both {first} and {second}")]
    AmbiguousField {
        field: String,
        first: FieldKind,
        second: FieldKind,
    },
}

impl SnapshotError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        "RETRO_MALFORMED_SNAPSHOT"
    }

    /// Malformed snapshots abort the request
    pub fn is_fatal(&self) -> bool {
        true
    }
}
