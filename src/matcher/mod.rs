//! Fingerprint matcher
//!
//! Scores a delta against every fingerprint of a store snapshot and returns
//! ranked single-step matches. Deterministic: same delta and snapshot, same
//! list in the same order.

mod matcher;

pub use matcher::{match_fingerprints, FingerprintMatcher, MatchResult, DEFAULT_MIN_SIMILARITY};
