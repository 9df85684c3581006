//! Field-wise deltas between world-state snapshots
//!
//! A [`Delta`] only ever holds fields whose value changed by more than the
//! epsilon it was built with. It is the sole unit consumed by matching.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::errors::{SnapshotError, SnapshotResult};
use super::snapshot::WorldStateSnapshot;
use super::DEFAULT_EPSILON;

/// Which snapshot map a field belongs to
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    #[default]
    Variable,
    Overlay,
    Capital,
}

impl FieldKind {
    pub const ALL: [FieldKind; 3] = [FieldKind::Variable, FieldKind::Overlay, FieldKind::Capital];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Variable => "variable",
            FieldKind::Overlay => "overlay",
            FieldKind::Capital => "capital",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Observed change of one field
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub from: f64,
    pub to: f64,
    #[serde(default)]
    pub kind: FieldKind,
}

impl FieldChange {
    pub fn new(from: f64, to: f64, kind: FieldKind) -> Self {
        Self { from, to, kind }
    }

    /// `to - from`
    pub fn change(&self) -> f64 {
        self.to - self.from
    }
}

/// Map of changed fields, ordered by field name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Delta {
    entries: BTreeMap<String, FieldChange>,
}

impl Delta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a delta of variable changes from `(name, from, to)` triples,
    /// dropping unchanged fields.
    pub fn from_changes<'a>(changes: impl IntoIterator<Item = (&'a str, f64, f64)>) -> Self {
        let mut delta = Self::new();
        for (name, from, to) in changes {
            delta.insert_if_changed(
                name,
                FieldChange::new(from, to, FieldKind::Variable),
                DEFAULT_EPSILON,
            );
        }
        delta
    }

    /// Inserts `change` unless `|to - from| <= epsilon`. Returns whether it was kept.
    pub fn insert_if_changed(
        &mut self,
        name: impl Into<String>,
        change: FieldChange,
        epsilon: f64,
    ) -> bool {
        if change.change().abs() > epsilon {
            self.entries.insert(name.into(), change);
            true
        } else {
            false
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldChange> {
        self.entries.get(name)
    }

    /// Change of `name`, zero when the field did not move
    pub fn change_of(&self, name: &str) -> f64 {
        self.entries.get(name).map_or(0.0, FieldChange::change)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldChange)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total magnitude: sum of `|to - from|` over every field
    pub fn magnitude(&self) -> f64 {
        self.entries.values().map(|c| c.change().abs()).sum()
    }

    /// Per-field numeric change
    pub fn changes(&self) -> BTreeMap<String, f64> {
        self.entries
            .iter()
            .map(|(k, v)| (k.clone(), v.change()))
            .collect()
    }

    /// True if any key of `effects` is a changed field of this delta
    pub fn shares_keys_with(&self, effects: &BTreeMap<String, f64>) -> bool {
        effects.keys().any(|k| self.entries.contains_key(k))
    }

    /// What is left of this delta once `effects` is taken as explained.
    ///
    /// Explained fields move their `from` forward by the effect. An effect on a
    /// field this delta never touched is an unobserved prediction and shows up
    /// as a change of `-effect` from a zero base.
    pub fn residual_after(&self, effects: &BTreeMap<String, f64>, epsilon: f64) -> Delta {
        let mut residual = Delta::new();

        for (name, change) in &self.entries {
            let explained = effects.get(name).copied().unwrap_or(0.0);
            residual.insert_if_changed(
                name.clone(),
                FieldChange::new(change.from + explained, change.to, change.kind),
                epsilon,
            );
        }

        for (name, effect) in effects {
            if !self.entries.contains_key(name) {
                residual.insert_if_changed(
                    name.clone(),
                    FieldChange::new(*effect, 0.0, FieldKind::Variable),
                    epsilon,
                );
            }
        }

        residual
    }
}

/// Computes the delta between two snapshots with [`DEFAULT_EPSILON`].
pub fn compute_delta(
    before: &WorldStateSnapshot,
    after: &WorldStateSnapshot,
) -> SnapshotResult<Delta> {
    compute_delta_with_epsilon(before, after, DEFAULT_EPSILON)
}

/// Computes the delta between two snapshots.
///
/// A field missing from one side counts as zero on that side. Fields whose
/// change is within `epsilon` are left out.
///
/// # Errors
///
/// Returns [`SnapshotError`] if either snapshot is malformed or a field name
/// changes kind between the two snapshots.
pub fn compute_delta_with_epsilon(
    before: &WorldStateSnapshot,
    after: &WorldStateSnapshot,
    epsilon: f64,
) -> SnapshotResult<Delta> {
    before.validate()?;
    after.validate()?;

    let mut kinds: BTreeMap<&str, FieldKind> = BTreeMap::new();
    for (name, kind, _) in before.fields().chain(after.fields()) {
        if let Some(first) = kinds.insert(name, kind) {
            if first != kind {
                return Err(SnapshotError::AmbiguousField {
                    field: name.into(),
                    first,
                    second: kind,
                });
            }
        }
    }

    let mut delta = Delta::new();
    for (name, kind) in kinds {
        let from = before.map(kind).get(name).copied().unwrap_or(0.0);
        let to = after.map(kind).get(name).copied().unwrap_or(0.0);
        delta.insert_if_changed(name, FieldChange::new(from, to, kind), epsilon);
    }

    Ok(delta)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn effects(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_compute_delta_basic() {
        let before = WorldStateSnapshot::new(1)
            .with_variable("inflation", 1.0)
            .with_overlay("hope", 0.5)
            .with_capital("spy", 100.0);
        let after = WorldStateSnapshot::new(2)
            .with_variable("inflation", 1.5)
            .with_overlay("hope", 0.5)
            .with_capital("spy", 80.0);

        let delta = compute_delta(&before, &after).unwrap();
        assert_eq!(delta.len(), 2);
        assert_eq!(delta.change_of("inflation"), 0.5);
        assert_eq!(delta.change_of("spy"), -20.0);
        assert_eq!(delta.get("spy").unwrap().kind, FieldKind::Capital);
        assert!(!delta.contains("hope"));
    }

    #[test]
    fn test_missing_fields_count_as_zero() {
        let before = WorldStateSnapshot::new(1).with_variable("gdp", 2.0);
        let after = WorldStateSnapshot::new(2).with_overlay("fear", 0.3);

        let delta = compute_delta(&before, &after).unwrap();
        assert_eq!(delta.get("gdp"), Some(&FieldChange::new(2.0, 0.0, FieldKind::Variable)));
        assert_eq!(delta.get("fear"), Some(&FieldChange::new(0.0, 0.3, FieldKind::Overlay)));
    }

    #[test]
    fn test_sub_epsilon_changes_dropped() {
        let before = WorldStateSnapshot::new(1).with_variable("gdp", 1.0);
        let after = WorldStateSnapshot::new(2).with_variable("gdp", 1.0 + 1e-9);
        assert!(compute_delta(&before, &after).unwrap().is_empty());
    }

    #[test]
    fn test_kind_change_between_snapshots_rejected() {
        let before = WorldStateSnapshot::new(1).with_variable("trust", 0.2);
        let after = WorldStateSnapshot::new(2).with_overlay("trust", 0.4);
        assert!(matches!(
            compute_delta(&before, &after),
            Err(SnapshotError::AmbiguousField { .. })
        ));
    }

    #[test]
    fn test_magnitude_is_l1() {
        let delta = Delta::from_changes([("a", 0.0, 1.0), ("b", 2.0, 1.5)]);
        assert!((delta.magnitude() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_residual_after_exact_effects_is_empty() {
        let delta = Delta::from_changes([("inflation", 1.0, 1.5)]);
        let residual = delta.residual_after(&effects(&[("inflation", 0.5)]), DEFAULT_EPSILON);
        assert!(residual.is_empty());
    }

    #[test]
    fn test_residual_keeps_unexplained_part() {
        let delta = Delta::from_changes([("inflation", 1.0, 2.0), ("gdp", 3.0, 2.0)]);
        let residual = delta.residual_after(&effects(&[("inflation", 0.6)]), DEFAULT_EPSILON);

        assert!((residual.change_of("inflation") - 0.4).abs() < 1e-12);
        assert!((residual.get("inflation").unwrap().from - 1.6).abs() < 1e-12);
        assert_eq!(residual.change_of("gdp"), -1.0);
    }

    #[test]
    fn test_residual_counts_unobserved_predictions() {
        let delta = Delta::from_changes([("inflation", 1.0, 1.5)]);
        let residual = delta.residual_after(
            &effects(&[("inflation", 0.5), ("unemployment", 0.2)]),
            DEFAULT_EPSILON,
        );
        assert_eq!(residual.len(), 1);
        assert!((residual.change_of("unemployment") + 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_delta_serializes_as_plain_map() {
        let delta = Delta::from_changes([("inflation", 1.0, 1.5)]);
        let value = serde_json::to_value(&delta).unwrap();
        assert_eq!(value["inflation"]["from"], 1.0);
        assert_eq!(value["inflation"]["to"], 1.5);
        assert_eq!(value["inflation"]["kind"], "variable");
    }
}
