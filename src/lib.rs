//! retrorule - a reverse rule engine
//!
//! Given two world-state snapshots, infers which known causal rules most
//! plausibly produced the observed change:
//!
//! 1. compute the field-wise [`world::Delta`]
//! 2. match it against rule fingerprints
//! 3. compose matches into multi-step causal chains
//! 4. rank chains with external trust and symbolic scoring
//! 5. propose a new fingerprint when nothing explains the change
//!
//! [`engine::ReverseRuleEngine`] runs the whole pipeline; every stage is
//! also usable on its own.

pub mod cli;
pub mod config;
pub mod engine;
pub mod fingerprint;
pub mod matcher;
pub mod observability;
pub mod scoring;
pub mod suggest;
pub mod tracer;
pub mod world;

pub use config::EngineConfig;
pub use engine::{RetroError, RetroResult, RetrodictionReport, ReverseRuleEngine};
