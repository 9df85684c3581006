//! Engine counters
//!
//! - Counters only
//! - Monotonic increase
//! - Thread-safe, lock-free

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Operational counters shared by every request an engine serves.
///
/// Relaxed ordering is used throughout; counters are not used for control flow.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    requests: AtomicU64,
    requests_rejected: AtomicU64,
    requests_cancelled: AtomicU64,
    fingerprints_scored: AtomicU64,
    chains_complete: AtomicU64,
    chains_abandoned: AtomicU64,
    collaborator_timeouts: AtomicU64,
    rankings_degraded: AtomicU64,
    candidates_proposed: AtomicU64,
    candidates_submitted: AtomicU64,
}

impl EngineMetrics {
    /// Create a registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_requests(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rejected(&self) {
        self.requests_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_cancelled(&self) {
        self.requests_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_fingerprints_scored(&self, n: u64) {
        self.fingerprints_scored.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_chains(&self, complete: u64, abandoned: u64) {
        self.chains_complete.fetch_add(complete, Ordering::Relaxed);
        self.chains_abandoned.fetch_add(abandoned, Ordering::Relaxed);
    }

    pub fn add_collaborator_timeouts(&self, n: u64) {
        self.collaborator_timeouts.fetch_add(n, Ordering::Relaxed);
    }

    pub fn increment_degraded(&self) {
        self.rankings_degraded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_candidates_proposed(&self) {
        self.candidates_proposed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_candidates_submitted(&self) {
        self.candidates_submitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            requests_rejected: self.requests_rejected.load(Ordering::Relaxed),
            requests_cancelled: self.requests_cancelled.load(Ordering::Relaxed),
            fingerprints_scored: self.fingerprints_scored.load(Ordering::Relaxed),
            chains_complete: self.chains_complete.load(Ordering::Relaxed),
            chains_abandoned: self.chains_abandoned.load(Ordering::Relaxed),
            collaborator_timeouts: self.collaborator_timeouts.load(Ordering::Relaxed),
            rankings_degraded: self.rankings_degraded.load(Ordering::Relaxed),
            candidates_proposed: self.candidates_proposed.load(Ordering::Relaxed),
            candidates_submitted: self.candidates_submitted.load(Ordering::Relaxed),
        }
    }
}

/// Immutable copy of [`EngineMetrics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub requests_rejected: u64,
    pub requests_cancelled: u64,
    pub fingerprints_scored: u64,
    pub chains_complete: u64,
    pub chains_abandoned: u64,
    pub collaborator_timeouts: u64,
    pub rankings_degraded: u64,
    pub candidates_proposed: u64,
    pub candidates_submitted: u64,
}
