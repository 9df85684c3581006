//! World state and deltas
//!
//! Snapshots are borrowed from the forward simulation. The delta calculator is
//! a pure function over two snapshots; it fails only on malformed input.

mod delta;
mod errors;
mod snapshot;

pub use delta::{compute_delta, compute_delta_with_epsilon, Delta, FieldChange, FieldKind};
pub use errors::{SnapshotError, SnapshotResult};
pub use snapshot::{WorldStateSnapshot, REQUIRED_KEYS};

/// Tolerance below which two values are considered equal
pub const DEFAULT_EPSILON: f64 = 1e-6;
