//! World-state snapshots
//!
//! A snapshot is owned by the forward simulation; retrodiction only reads it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::delta::FieldKind;
use super::errors::{SnapshotError, SnapshotResult};

/// Required top-level keys of a serialized snapshot
pub const REQUIRED_KEYS: [&str; 4] = ["turn", "variables", "overlays", "capital"];

/// Immutable record of the world at one turn.
///
/// Overlays are bounded symbolic intensities in `[0, 1]`; capital exposures are
/// unbounded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldStateSnapshot {
    pub turn: i64,
    pub variables: BTreeMap<String, f64>,
    pub overlays: BTreeMap<String, f64>,
    pub capital: BTreeMap<String, f64>,
}

impl WorldStateSnapshot {
    /// Empty snapshot at `turn`
    pub fn new(turn: i64) -> Self {
        Self {
            turn,
            ..Self::default()
        }
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: f64) -> Self {
        self.variables.insert(name.into(), value);
        self
    }

    pub fn with_overlay(mut self, name: impl Into<String>, value: f64) -> Self {
        self.overlays.insert(name.into(), value);
        self
    }

    pub fn with_capital(mut self, name: impl Into<String>, value: f64) -> Self {
        self.capital.insert(name.into(), value);
        self
    }

    /// The map holding fields of `kind`
    pub fn map(&self, kind: FieldKind) -> &BTreeMap<String, f64> {
        match kind {
            FieldKind::Variable => &self.variables,
            FieldKind::Overlay => &self.overlays,
            FieldKind::Capital => &self.capital,
        }
    }

    /// Every field with its kind, variables first, then overlays, then capital
    pub fn fields(&self) -> impl Iterator<Item = (&str, FieldKind, f64)> + '_ {
        FieldKind::ALL.into_iter().flat_map(move |kind| {
            self.map(kind)
                .iter()
                .map(move |(name, value)| (name.as_str(), kind, *value))
        })
    }

    /// Parses a snapshot from JSON, naming the first key that is missing or
    /// mistyped.
    pub fn from_value(value: &Value) -> SnapshotResult<Self> {
        let obj = value.as_object().ok_or(SnapshotError::NotAnObject)?;

        for key in REQUIRED_KEYS {
            if !obj.contains_key(key) {
                return Err(SnapshotError::MissingKey(key));
            }
        }

        let turn = obj["turn"].as_i64().ok_or_else(|| SnapshotError::WrongType {
            key: "turn".into(),
            expected: "an integer",
        })?;

        let snapshot = Self {
            turn,
            variables: numeric_map(obj, "variables")?,
            overlays: numeric_map(obj, "overlays")?,
            capital: numeric_map(obj, "capital")?,
        };
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Checks the numeric invariants of the snapshot.
    ///
    /// - every value is finite
    /// - every overlay is within `[0, 1]`
    /// - no field name is used by more than one map
    pub fn validate(&self) -> SnapshotResult<()> {
        let mut seen: BTreeMap<&str, FieldKind> = BTreeMap::new();

        for (name, kind, value) in self.fields() {
            if !value.is_finite() {
                return Err(SnapshotError::NonFinite { field: name.into() });
            }
            if kind == FieldKind::Overlay && !(0.0..=1.0).contains(&value) {
                return Err(SnapshotError::OverlayOutOfRange {
                    field: name.into(),
                    value,
                });
            }
            if let Some(first) = seen.insert(name, kind) {
                return Err(SnapshotError::AmbiguousField {
                    field: name.into(),
                    first,
                    second: kind,
                });
            }
        }

        Ok(())
    }
}

fn numeric_map(
    obj: &serde_json::Map<String, Value>,
    key: &str,
) -> SnapshotResult<BTreeMap<String, f64>> {
    let inner = obj[key].as_object().ok_or_else(|| SnapshotError::WrongType {
        key: key.into(),
        expected: "an object of numbers",
    })?;

    inner
        .iter()
        .map(|(name, v)| {
            v.as_f64()
                .map(|n| (name.clone(), n))
                .ok_or_else(|| SnapshotError::WrongType {
                    key: format!("{}.{}", key, name),
                    expected: "a number",
                })
        })
        .collect()
}
