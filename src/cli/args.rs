//! CLI argument definitions using clap
//!
//! Commands:
//! - retrorule trace --before <path> --after <path> --fingerprints <path>
//! - retrorule match --before <path> --after <path> --fingerprints <path>
//! - retrorule suggest --before <path> --after <path> --fingerprints <path>
//! - retrorule history --snapshots <path> --fingerprints <path>

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// retrorule - explain observed world-state changes with known causal rules
#[derive(Parser, Debug)]
#[command(name = "retrorule")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Only log errors
    #[arg(long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Files shared by every command
#[derive(Args, Debug, Clone)]
pub struct Library {
    /// Fingerprint library (JSON array, or object keyed by rule id)
    #[arg(long)]
    pub fingerprints: PathBuf,

    /// Engine configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// A before/after snapshot pair
#[derive(Args, Debug, Clone)]
pub struct SnapshotPair {
    /// Snapshot before the change
    #[arg(long)]
    pub before: PathBuf,

    /// Snapshot after the change
    #[arg(long)]
    pub after: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Trace and rank causal chains for a snapshot pair
    Trace {
        #[command(flatten)]
        pair: SnapshotPair,

        #[command(flatten)]
        library: Library,

        /// Print a human-readable explanation instead of JSON
        #[arg(long)]
        explain: bool,
    },

    /// Score single fingerprints against the delta of a snapshot pair
    Match {
        #[command(flatten)]
        pair: SnapshotPair,

        #[command(flatten)]
        library: Library,
    },

    /// Propose a fingerprint for the delta of a snapshot pair
    Suggest {
        #[command(flatten)]
        pair: SnapshotPair,

        #[command(flatten)]
        library: Library,
    },

    /// Trace every consecutive pair of a snapshot history
    History {
        /// JSON array of snapshots, oldest first
        #[arg(long)]
        snapshots: PathBuf,

        #[command(flatten)]
        library: Library,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
