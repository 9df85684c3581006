//! CLI command implementations
//!
//! Each command loads its inputs, runs one engine operation and writes one
//! JSON response. The CLI wires in the built-in [`FingerprintTrust`] and
//! [`OverlayTagger`] collaborators.

use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::engine::ReverseRuleEngine;
use crate::fingerprint::{FingerprintLoader, InMemoryFingerprintStore};
use crate::observability::{log_event_with_fields, Event, Logger, Severity};
use crate::scoring::{FingerprintTrust, OverlayTagger};
use crate::world::WorldStateSnapshot;

use super::args::{Cli, Command, Library, SnapshotPair};
use super::errors::{CliError, CliResult};
use super::io::{read_json_file, write_error, write_response, write_text};

/// Parse arguments and run the selected command.
///
/// Failures are written as an error response before being returned.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    if cli.quiet {
        Logger::set_min_severity(Severity::Error);
    }

    match run_command(cli.command) {
        Ok(()) => Ok(()),
        Err(e) => {
            write_error(e.code_str(), e.message())?;
            Err(e)
        }
    }
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Trace {
            pair,
            library,
            explain,
        } => trace(&pair, &library, explain),
        Command::Match { pair, library } => match_rules(&pair, &library),
        Command::Suggest { pair, library } => suggest(&pair, &library),
        Command::History { snapshots, library } => history(&snapshots, &library),
    }
}

/// Full retrodiction for one snapshot pair
pub fn trace(pair: &SnapshotPair, library: &Library, explain: bool) -> CliResult<()> {
    let (engine, _) = load_engine(library)?;
    let (before, after) = load_pair(pair)?;

    let report = engine.retrodict(&before, &after)?;

    if explain {
        write_text(&report.to_string())
    } else {
        write_response(serde_json::to_value(&report)?)
    }
}

/// Single-step matches for one snapshot pair
pub fn match_rules(pair: &SnapshotPair, library: &Library) -> CliResult<()> {
    let (engine, _) = load_engine(library)?;
    let (before, after) = load_pair(pair)?;

    let delta = engine.compute_delta(&before, &after)?;
    let matches = engine.match_delta(&delta);

    write_response(json!({
        "delta": delta,
        "matches": matches,
    }))
}

/// Candidate fingerprint for the whole delta of one snapshot pair
pub fn suggest(pair: &SnapshotPair, library: &Library) -> CliResult<()> {
    let (engine, store) = load_engine(library)?;
    let (before, after) = load_pair(pair)?;

    let delta = engine.compute_delta(&before, &after)?;
    let candidate = engine
        .config()
        .suggester()
        .suggest(&delta, Uuid::new_v4(), store.as_ref());

    write_response(json!({
        "delta": delta,
        "candidate": candidate,
    }))
}

/// Retrodiction for every consecutive pair of a snapshot history
pub fn history(snapshots: &Path, library: &Library) -> CliResult<()> {
    let (engine, _) = load_engine(library)?;

    let value = read_json_file(snapshots)?;
    let entries = value
        .as_array()
        .ok_or_else(|| CliError::invalid_snapshot("history must be a JSON array of snapshots"))?;
    let history = entries
        .iter()
        .map(WorldStateSnapshot::from_value)
        .collect::<Result<Vec<_>, _>>()?;

    let reports = engine.retrodict_history(&history)?;
    write_response(serde_json::to_value(&reports)?)
}

fn load_engine(library: &Library) -> CliResult<(ReverseRuleEngine, Arc<InMemoryFingerprintStore>)> {
    let config = match &library.config {
        Some(path) => {
            let config = EngineConfig::load(path)?;
            log_event_with_fields(
                Event::ConfigLoaded,
                &[("path", &path.display().to_string())],
            );
            config
        }
        None => EngineConfig::default(),
    };

    let store = Arc::new(FingerprintLoader::load_file(&library.fingerprints)?);

    let engine = ReverseRuleEngine::builder(store.clone())
        .config(config)
        .trust(Arc::new(FingerprintTrust))
        .symbolic(Arc::new(OverlayTagger))
        .build()?;

    Ok((engine, store))
}

fn load_pair(pair: &SnapshotPair) -> CliResult<(WorldStateSnapshot, WorldStateSnapshot)> {
    Ok((load_snapshot(&pair.before)?, load_snapshot(&pair.after)?))
}

fn load_snapshot(path: &Path) -> CliResult<WorldStateSnapshot> {
    let value: Value = read_json_file(path)?;
    WorldStateSnapshot::from_value(&value).map_err(|e| {
        CliError::invalid_snapshot(format!("'{}': {}", path.display(), e))
    })
}
