//! Scoring
//!
//! Ranks traced chains by combining step similarity with the external Trust
//! and Symbolic collaborators. Collaborator calls are bounded in time; an
//! unavailable collaborator degrades the ranking instead of failing it.

mod bounded;
mod collaborators;
mod errors;
mod integrator;

pub use bounded::{BoundedCaller, DEFAULT_MAX_STRANDED, DEFAULT_RETRIES, DEFAULT_TIMEOUT_MS};
pub use collaborators::{
    FingerprintTrust, OverlayTagger, ScoringContext, SymbolicAssessment, SymbolicCollaborator,
    TrustCollaborator,
};
pub use errors::{CollaboratorError, CollaboratorResult};
pub use integrator::{chain_rank_cmp, rank_chains, sort_chains, RankedChains, ScoringIntegrator};
