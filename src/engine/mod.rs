//! Retrodiction engine
//!
//! Wires delta computation, tracing, ranking and suggestion into one request
//! and reports the result.

mod engine;
mod errors;
mod report;

pub use engine::{EngineBuilder, ReverseRuleEngine};
pub use errors::{ErrorSeverity, RetroError, RetroResult};
pub use report::RetrodictionReport;
