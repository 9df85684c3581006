//! CLI module for retrorule
//!
//! Provides command-line access to:
//! - trace: full retrodiction for a snapshot pair
//! - match: single-step fingerprint matches
//! - suggest: fingerprint candidate for an unexplained delta
//! - history: retrodiction over a snapshot sequence

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, Library, SnapshotPair};
pub use commands::{history, match_rules, run, run_command, suggest, trace};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_json_file, write_error, write_response};
