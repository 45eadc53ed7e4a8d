//! The normalised, schemaless per-device state map.
//!
//! Keys are discovered by handlers at runtime, so the map is not a fixed
//! struct: `HashMap<String, StateValue>` with an untagged `StateValue` is
//! the typed stand-in for the source's dynamic `map<string, Variant>`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single state value. Untagged on the wire so JSON output reads as a
/// plain scalar (`"on": true`, `"power": 234.5`) rather than a tagged enum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl StateValue {
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Text(s) if s.eq_ignore_ascii_case("true") => Some(true),
            Self::Text(s) if s.eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Text(s) => s.parse().ok(),
            Self::Bool(_) => None,
        }
    }
}

impl From<bool> for StateValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}
impl From<i64> for StateValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}
impl From<f64> for StateValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}
impl From<String> for StateValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}
impl From<&str> for StateValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

/// The per-device state map. A thin wrapper rather than a bare `HashMap` so
/// the rounding/keying/delta rules in the data model live in one place.
pub type StateMap = HashMap<String, StateValue>;

/// Round a raw scaled measurement to the decimal precision the data model
/// assigns to its unit: power and voltage to 1 dp, current and energy to 3.
#[must_use]
pub fn round_measurement(kind: MeasurementKind, value: f64) -> f64 {
    let scale = match kind {
        MeasurementKind::Power | MeasurementKind::Voltage => 10.0,
        MeasurementKind::Current | MeasurementKind::Energy => 1000.0,
    };
    (value * scale).round() / scale
}

#[derive(Debug, Clone, Copy)]
pub enum MeasurementKind {
    Power,
    Voltage,
    Current,
    Energy,
}

/// Key a per-endpoint attribute name per the data model's suffixing rule:
/// endpoint 1 mirrors unsuffixed as the device default, every endpoint
/// (including 1) also gets the `_<endpoint_id>` suffixed key.
#[must_use]
pub fn keyed_names(name: &str, endpoint_id: u8) -> Vec<String> {
    let mut keys = vec![format!("{name}_{endpoint_id}")];
    if endpoint_id == 1 {
        keys.push(name.to_string());
    }
    keys
}

/// Merge `partial` into `state`, returning the delta: only keys whose value
/// actually changed (or is newly present). `state` is updated in place.
#[must_use]
pub fn merge_and_delta(state: &mut StateMap, partial: &StateMap) -> StateMap {
    let mut delta = StateMap::new();
    for (key, value) in partial {
        match state.get(key) {
            Some(existing) if existing == value => {}
            _ => {
                state.insert(key.clone(), value.clone());
                delta.insert(key.clone(), value.clone());
            }
        }
    }
    delta
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_only_contains_changed_keys() {
        let mut state = StateMap::new();
        state.insert("occupancy".into(), StateValue::Bool(false));
        state.insert("temperature".into(), StateValue::Float(20.0));

        let mut partial = StateMap::new();
        partial.insert("occupancy".into(), StateValue::Bool(false)); // unchanged
        partial.insert("temperature".into(), StateValue::Float(21.5)); // changed

        let delta = merge_and_delta(&mut state, &partial);
        assert_eq!(delta.len(), 1);
        assert_eq!(delta.get("temperature"), Some(&StateValue::Float(21.5)));
    }

    #[test]
    fn rounding_matches_unit_precision() {
        assert_eq!(round_measurement(MeasurementKind::Voltage, 230.5), 230.5);
        assert_eq!(round_measurement(MeasurementKind::Current, 1.2345), 1.235);
        assert_eq!(round_measurement(MeasurementKind::Power, 234.49), 234.5);
    }

    #[test]
    fn endpoint_one_mirrors_unsuffixed() {
        let keys = keyed_names("position", 1);
        assert!(keys.contains(&"position_1".to_string()));
        assert!(keys.contains(&"position".to_string()));

        let keys2 = keyed_names("position", 2);
        assert_eq!(keys2, vec!["position_2".to_string()]);
    }
}
