//! Fingerprint suggestion
//!
//! Turns an unexplained observation into a validated [`FingerprintCandidate`]
//! and, optionally, hands it to an external [`ApprovalHook`]. Candidates are
//! proposals only; nothing here writes to the fingerprint library.

mod approval;
mod candidate;
mod errors;
mod suggester;

pub use approval::{submit_bounded, ApprovalHook, RecordingApprovalHook};
pub use candidate::{proposed_rule_id, FingerprintCandidate};
pub use errors::InvalidCandidateSchema;
pub use suggester::{
    needs_suggestion, suggest_fingerprint, unexplained_delta, FingerprintSuggester,
    SuggestionBasis, SuggestionResult, DEFAULT_MIN_CONFIDENCE,
};
