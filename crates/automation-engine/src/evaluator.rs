//! Per-condition evaluation: resolve a condition's current value,
//! normalise both sides, apply the operator, and short-circuit the
//! enclosing AND on the first non-pass.

use crate::model::{Condition, Operator};
use zigbee_core::{StateMap, StateValue};

/// The outcome of evaluating one condition. `Error` carries the message
/// used for the rule's ERROR trace: an exception evaluating a condition
/// becomes an ERROR result, not a panic.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionOutcome {
    Pass,
    Fail,
    Error(String),
}

/// The result of evaluating a rule's full, ordered condition list.
pub struct EvaluationResult {
    pub outcome: ConditionOutcome,
    /// How many conditions were actually evaluated before short-circuit —
    /// conditions after the first failure are never touched.
    pub conditions_checked: usize,
}

/// Evaluate `conditions` in order against `delta` (preferred) falling back
/// to `state`. Stops at the first `Fail`/`Error` (short-circuit AND).
#[must_use]
pub fn evaluate_conditions(conditions: &[Condition], delta: &StateMap, state: &StateMap) -> EvaluationResult {
    let mut checked = 0;
    for condition in conditions {
        checked += 1;
        match evaluate_condition(condition, delta, state) {
            ConditionOutcome::Pass => continue,
            other => {
                return EvaluationResult { outcome: other, conditions_checked: checked };
            }
        }
    }
    EvaluationResult { outcome: ConditionOutcome::Pass, conditions_checked: checked }
}

/// Evaluate a single condition. A missing attribute (absent from both
/// `delta` and `state`) fails immediately rather than erroring.
#[must_use]
pub fn evaluate_condition(condition: &Condition, delta: &StateMap, state: &StateMap) -> ConditionOutcome {
    let Some(observed) = delta.get(&condition.attribute).or_else(|| state.get(&condition.attribute)) else {
        return ConditionOutcome::Fail;
    };
    match compare(observed, condition.operator, &condition.value) {
        Ok(true) => ConditionOutcome::Pass,
        Ok(false) => ConditionOutcome::Fail,
        Err(msg) => ConditionOutcome::Error(msg),
    }
}

/// Normalise both sides and apply `operator`. Booleans (including the
/// string forms `"true"`/`"false"`) only support eq/neq; numerics (including
/// numeric strings) support the full ordering set; strings fall back to
/// eq/neq. Incomparable sides (e.g. a bool against a number) are an error.
fn compare(observed: &StateValue, operator: Operator, expected: &StateValue) -> Result<bool, String> {
    if let (Some(a), Some(b)) = (observed.as_bool(), expected.as_bool()) {
        return match operator {
            Operator::Eq => Ok(a == b),
            Operator::Neq => Ok(a != b),
            _ => Err(format!("operator {operator:?} is not valid for a boolean comparison")),
        };
    }
    if let (Some(a), Some(b)) = (observed.as_f64(), expected.as_f64()) {
        return Ok(match operator {
            Operator::Eq => (a - b).abs() < f64::EPSILON,
            Operator::Neq => (a - b).abs() >= f64::EPSILON,
            Operator::Gt => a > b,
            Operator::Lt => a < b,
            Operator::Gte => a >= b,
            Operator::Lte => a <= b,
        });
    }
    if let (Some(a), Some(b)) = (observed.as_str(), expected.as_str()) {
        return match operator {
            Operator::Eq => Ok(a == b),
            Operator::Neq => Ok(a != b),
            _ => Err(format!("operator {operator:?} is not valid for a string comparison")),
        };
    }
    Err(format!("{observed:?} and {expected:?} are not comparable"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta_of(pairs: &[(&str, StateValue)]) -> StateMap {
        pairs.iter().cloned().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn prefers_delta_over_state() {
        let condition = Condition { attribute: "occupancy".into(), operator: Operator::Eq, value: true.into() };
        let delta = delta_of(&[("occupancy", true.into())]);
        let state = delta_of(&[("occupancy", false.into())]);
        assert_eq!(evaluate_condition(&condition, &delta, &state), ConditionOutcome::Pass);
    }

    #[test]
    fn falls_back_to_state_when_absent_from_delta() {
        let condition = Condition { attribute: "illuminance".into(), operator: Operator::Lt, value: 50.0.into() };
        let delta = delta_of(&[("occupancy", true.into())]);
        let state = delta_of(&[("illuminance", 30.0.into())]);
        assert_eq!(evaluate_condition(&condition, &delta, &state), ConditionOutcome::Pass);
    }

    #[test]
    fn missing_attribute_fails_not_errors() {
        let condition = Condition { attribute: "humidity".into(), operator: Operator::Gt, value: 10.0.into() };
        assert_eq!(
            evaluate_condition(&condition, &StateMap::new(), &StateMap::new()),
            ConditionOutcome::Fail
        );
    }

    #[test]
    fn string_true_false_normalises_to_boolean() {
        let condition = Condition { attribute: "on".into(), operator: Operator::Eq, value: true.into() };
        let state = delta_of(&[("on", StateValue::Text("true".into()))]);
        assert_eq!(evaluate_condition(&condition, &StateMap::new(), &state), ConditionOutcome::Pass);
    }

    #[test]
    fn numeric_string_compares_against_threshold() {
        let condition = Condition { attribute: "illuminance".into(), operator: Operator::Lt, value: 50.0.into() };
        let state = delta_of(&[("illuminance", StateValue::Text("30".into()))]);
        assert_eq!(evaluate_condition(&condition, &StateMap::new(), &state), ConditionOutcome::Pass);
    }

    #[test]
    fn incomparable_types_become_error() {
        let condition = Condition { attribute: "mode".into(), operator: Operator::Gt, value: true.into() };
        let state = delta_of(&[("mode", StateValue::Text("auto".into()))]);
        assert!(matches!(
            evaluate_condition(&condition, &StateMap::new(), &state),
            ConditionOutcome::Error(_)
        ));
    }

    #[test]
    fn short_circuit_stops_at_first_failure() {
        let conditions = vec![
            Condition { attribute: "illuminance".into(), operator: Operator::Lt, value: 50.0.into() },
            Condition { attribute: "occupancy".into(), operator: Operator::Eq, value: true.into() },
        ];
        let delta = delta_of(&[("illuminance", 120.0.into())]);
        let result = evaluate_conditions(&conditions, &delta, &StateMap::new());
        assert_eq!(result.outcome, ConditionOutcome::Fail);
        assert_eq!(result.conditions_checked, 1);
    }

    #[test]
    fn all_pass_checks_every_condition() {
        let conditions = vec![
            Condition { attribute: "illuminance".into(), operator: Operator::Lt, value: 50.0.into() },
            Condition { attribute: "occupancy".into(), operator: Operator::Eq, value: true.into() },
        ];
        let delta = delta_of(&[("occupancy", true.into())]);
        let state = delta_of(&[("illuminance", 30.0.into())]);
        let result = evaluate_conditions(&conditions, &delta, &state);
        assert_eq!(result.outcome, ConditionOutcome::Pass);
        assert_eq!(result.conditions_checked, 2);
    }
}
