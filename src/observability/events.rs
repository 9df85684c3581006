//! Observable events of a retrodiction request
//!
//! Events are explicit and typed.

use std::fmt;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    /// Engine configuration loaded
    ConfigLoaded,
    /// Fingerprint file loaded
    FingerprintsLoaded,

    // Request lifecycle
    /// Fingerprint store copied for the request
    StoreSnapshotTaken,
    /// Store had no fingerprints to match against
    StoreEmpty,
    /// Delta computed from the snapshot pair
    DeltaComputed,
    /// Snapshot pair rejected
    SnapshotRejected,

    // Tracing
    /// Chain tracing finished
    TraceComplete,
    /// A branch was abandoned
    ChainAbandoned,
    /// Branch budget exhausted
    ExpansionLimitReached,
    /// Request cancelled between expansions
    RequestCancelled,

    // Scoring
    /// A collaborator call timed out
    CollaboratorTimeout,
    /// A collaborator call failed
    CollaboratorFailed,
    /// Ranking finished without one of the collaborators
    RankingDegraded,
    /// Ranking finished
    RankingComplete,

    // Suggestion
    /// A new fingerprint candidate was built
    CandidateProposed,
    /// A candidate failed schema validation
    CandidateRejected,
    /// A candidate was handed to the approval hook
    CandidateSubmitted,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::FingerprintsLoaded => "FINGERPRINTS_LOADED",

            Event::StoreSnapshotTaken => "STORE_SNAPSHOT_TAKEN",
            Event::StoreEmpty => "FINGERPRINT_STORE_EMPTY",
            Event::DeltaComputed => "DELTA_COMPUTED",
            Event::SnapshotRejected => "SNAPSHOT_REJECTED",

            Event::TraceComplete => "TRACE_COMPLETE",
            Event::ChainAbandoned => "CHAIN_ABANDONED",
            Event::ExpansionLimitReached => "EXPANSION_LIMIT_REACHED",
            Event::RequestCancelled => "REQUEST_CANCELLED",

            Event::CollaboratorTimeout => "COLLABORATOR_TIMEOUT",
            Event::CollaboratorFailed => "COLLABORATOR_FAILED",
            Event::RankingDegraded => "RANKING_DEGRADED",
            Event::RankingComplete => "RANKING_COMPLETE",

            Event::CandidateProposed => "CANDIDATE_PROPOSED",
            Event::CandidateRejected => "CANDIDATE_REJECTED",
            Event::CandidateSubmitted => "CANDIDATE_SUBMITTED",
        }
    }

    /// Returns true if this event ends the request
    pub fn is_fatal(&self) -> bool {
        matches!(self, Event::SnapshotRejected)
    }

    /// Returns true if this event marks degraded but continuing operation
    pub fn is_degraded(&self) -> bool {
        matches!(
            self,
            Event::StoreEmpty
                | Event::CollaboratorTimeout
                | Event::CollaboratorFailed
                | Event::RankingDegraded
                | Event::ExpansionLimitReached
                | Event::CandidateRejected
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
