//! The rule data model: a rule watches a source device's state delta,
//! evaluates an ordered list of conditions, and — respecting cooldown —
//! dispatches a single command to a target device.

use serde::{Deserialize, Serialize};
use zigbee_core::StateValue;

/// Conditions are capped per rule, and rules per source.
pub const MIN_CONDITIONS: usize = 1;
pub const MAX_CONDITIONS: usize = 5;
pub const MAX_RULES_PER_SOURCE: usize = 10;

/// Commands a rule's action may issue. Mirrors the command surface
/// `DeviceStateEngine::send_command` accepts.
pub const VALID_COMMANDS: &[&str] = &[
    "on",
    "off",
    "toggle",
    "brightness",
    "color_temp",
    "open",
    "close",
    "stop",
    "position",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Eq,
    Neq,
    Gt,
    Lt,
    Gte,
    Lte,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub attribute: String,
    pub operator: Operator,
    pub value: StateValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub value: Option<StateValue>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub endpoint_id: Option<u8>,
}

/// A supplemental trigger alongside the primary delta-driven evaluation:
/// a rule with a `schedule` is re-evaluated against the source device's
/// current state on the given cadence, in addition to (not instead of)
/// firing on a matching state delta.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ScheduleSpec {
    Interval { seconds: u64 },
    TimeOfDay { time: String, days: Vec<u8> },
    Cron { expression: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub enabled: bool,
    pub source_ieee: [u8; 8],
    pub conditions: Vec<Condition>,
    pub target_ieee: [u8; 8],
    pub action: Action,
    #[serde(default = "default_cooldown")]
    pub cooldown: u64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub schedule: Option<ScheduleSpec>,
    pub created_at: String,
    pub updated_at: String,
}

fn default_cooldown() -> u64 {
    5
}

impl Rule {
    #[must_use]
    pub fn watched_attributes(&self) -> Vec<&str> {
        self.conditions.iter().map(|c| c.attribute.as_str()).collect()
    }
}

/// The shape read off disk. `threshold` is a legacy single-condition field
/// from an earlier revision of this schema; if present and `conditions` is
/// absent or empty, it is migrated to a one-element `conditions` list and
/// the store is rewritten.
#[derive(Debug, Clone, Deserialize)]
pub struct StoredRule {
    pub id: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub source_ieee: [u8; 8],
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub threshold: Option<Condition>,
    pub target_ieee: [u8; 8],
    pub action: Action,
    #[serde(default = "default_cooldown")]
    pub cooldown: u64,
    #[serde(default)]
    pub schedule: Option<ScheduleSpec>,
    #[serde(default = "default_timestamp")]
    pub created_at: String,
    #[serde(default = "default_timestamp")]
    pub updated_at: String,
}

fn default_true() -> bool {
    true
}

fn default_timestamp() -> String {
    String::new()
}

impl StoredRule {
    /// Apply the legacy-`threshold`-field migration.
    #[must_use]
    pub fn migrate(self) -> Rule {
        let conditions = if self.conditions.is_empty() {
            self.threshold.into_iter().collect()
        } else {
            self.conditions
        };
        Rule {
            id: self.id,
            enabled: self.enabled,
            source_ieee: self.source_ieee,
            conditions,
            target_ieee: self.target_ieee,
            action: self.action,
            cooldown: self.cooldown,
            schedule: self.schedule,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl From<&Rule> for StoredRule {
    fn from(rule: &Rule) -> Self {
        Self {
            id: rule.id.clone(),
            enabled: rule.enabled,
            source_ieee: rule.source_ieee,
            conditions: rule.conditions.clone(),
            threshold: None,
            target_ieee: rule.target_ieee,
            action: rule.action.clone(),
            cooldown: rule.cooldown,
            schedule: rule.schedule.clone(),
            created_at: rule.created_at.clone(),
            updated_at: rule.updated_at.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRuleRequest {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub source_ieee: [u8; 8],
    pub conditions: Vec<Condition>,
    pub target_ieee: [u8; 8],
    pub action: Action,
    #[serde(default = "default_cooldown")]
    pub cooldown: u64,
    #[serde(default)]
    pub schedule: Option<ScheduleSpec>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateRuleRequest {
    pub enabled: Option<bool>,
    pub conditions: Option<Vec<Condition>>,
    pub target_ieee: Option<[u8; 8]>,
    pub action: Option<Action>,
    pub cooldown: Option<u64>,
    pub schedule: Option<Option<ScheduleSpec>>,
}

/// Trace levels: DEBUG for no-overlap/disabled, INFO for no-match/
/// firing/success/blocked, WARNING for capability mismatches, ERROR for a
/// missing target or a dispatch exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TraceLevel {
    Debug,
    Info,
    Warning,
    Error,
}

/// Which step of rule evaluation produced the trace entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TracePhase {
    Relevance,
    Match,
    Cooldown,
    Target,
    Dispatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TraceResult {
    NotRelevant,
    NoMatch,
    Blocked,
    Firing,
    Success,
    CommandFailed,
    Exception,
}

/// One entry in the bounded trace ring. Every rule evaluation records at
/// least one entry, even when nothing fires, so operators can explain
/// *why*.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    pub rule_id: String,
    pub level: TraceLevel,
    pub phase: TracePhase,
    pub result: TraceResult,
    pub message: String,
    pub timestamp: u64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub payload: Option<serde_json::Value>,
}

/// How many `TraceEntry` values the ring retains.
pub const TRACE_RING_CAPACITY: usize = 100;

#[derive(Debug, Clone, Default, Serialize)]
pub struct EngineStats {
    pub rules_evaluated: u64,
    pub rules_fired: u64,
    pub rules_blocked: u64,
    pub rules_no_match: u64,
    pub commands_failed: u64,
}
