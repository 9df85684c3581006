//! Rule fingerprint library access
//!
//! The library itself is curated elsewhere. This module provides:
//!
//! - the [`RuleFingerprint`] type and its schema
//! - the [`FingerprintStore`] read interface
//! - [`StoreSnapshot`], the per-request copy-on-read view matching runs on
//! - a JSON file loader and an in-memory store

mod errors;
mod loader;
mod store;
mod types;
mod validator;

pub use errors::{FingerprintError, FingerprintResult};
pub use loader::FingerprintLoader;
pub use store::{FingerprintStore, InMemoryFingerprintStore, StoreSnapshot};
pub use types::RuleFingerprint;
pub use validator::{is_valid_rule_id, validate_fingerprint, validate_fingerprint_value};
