//! Chain tracer
//!
//! Composes single-step fingerprint matches into multi-step causal chains that
//! together explain an observed delta.
//!
//! # Bounds
//!
//! - `max_depth`: steps per chain
//! - `max_branching`: best reducing matches expanded per branch
//! - `max_expansions`: branch states per request
//!
//! # Outcomes
//!
//! Complete chains are returned when any exist; otherwise the best-effort
//! abandoned chains, ordered by remaining residual. The two cases are told
//! apart by [`TraceOutcome`] and by each chain's [`ChainStatus`].

mod cancel;
mod chain;
mod errors;
mod tracer;

pub use cancel::CancellationToken;
pub use chain::{AbandonReason, CausalChain, ChainStatus};
pub use errors::{TraceError, TracerResult};
pub use tracer::{
    trace_chains, ChainTracer, TraceLimits, TraceOutcome, TraceReport, TraceStats,
    DEFAULT_CLOSURE_RATIO, DEFAULT_MAX_BRANCHING, DEFAULT_MAX_DEPTH, DEFAULT_MAX_EXPANSIONS,
};
