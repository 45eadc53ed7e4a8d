//! The automation engine: rule CRUD and persistence, the indexed
//! evaluation algorithm, cooldown enforcement, and the bounded trace
//! ring that lets an operator see *why* a rule did or didn't fire.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{broadcast, Mutex};

use crate::error::AutomationError;
use crate::evaluator::{evaluate_conditions, ConditionOutcome};
use crate::executor;
use crate::model::{
    Condition, CreateRuleRequest, EngineStats, Rule, TraceEntry, TraceLevel, TracePhase, TraceResult,
    UpdateRuleRequest, MAX_CONDITIONS, MAX_RULES_PER_SOURCE, MIN_CONDITIONS, TRACE_RING_CAPACITY, VALID_COMMANDS,
};
use crate::persistence;
use crate::scheduler::Scheduler;
use zigbee_core::{AutomationSink, DeviceStateEngine, StateMap};

/// Forwarded to the (out-of-scope) WebSocket emitter, if one subscribes;
/// the engine itself never blocks on there being a listener.
#[derive(Debug, Clone)]
pub enum AutomationEvent {
    RuleCreated(String),
    RuleUpdated(String),
    RuleDeleted(String),
    Trace(TraceEntry),
}

/// Rule CRUD, the indexed evaluator, and the trace ring.
/// Cheap to clone the `Arc`s it holds; construct once behind an `Arc` and
/// call `start()` to spin up the scheduler-forwarding task.
pub struct AutomationEngine {
    rules: DashMap<String, Rule>,
    source_index: DashMap<[u8; 8], Vec<String>>,
    cooldowns: DashMap<String, u64>,
    trace_ring: Arc<Mutex<VecDeque<TraceEntry>>>,
    stats: Arc<Mutex<EngineStats>>,
    devices: Arc<DeviceStateEngine>,
    scheduler: Scheduler,
    data_path: PathBuf,
    event_tx: broadcast::Sender<AutomationEvent>,
}

impl AutomationEngine {
    /// Load persisted rules (migrating the legacy `threshold` field if
    /// present) and register their schedules, if any.
    pub async fn new(devices: Arc<DeviceStateEngine>, data_dir: &Path) -> Result<Self, AutomationError> {
        let data_path = data_dir.join("automations.json");
        let (loaded, needs_rewrite) = persistence::load_rules(&data_path).await;

        let rules = DashMap::new();
        let source_index: DashMap<[u8; 8], Vec<String>> = DashMap::new();
        let scheduler = Scheduler::new();
        for rule in loaded {
            scheduler.register(&rule)?;
            source_index.entry(rule.source_ieee).or_default().push(rule.id.clone());
            rules.insert(rule.id.clone(), rule);
        }

        let (event_tx, _) = broadcast::channel(128);
        let engine = Self {
            rules,
            source_index,
            cooldowns: DashMap::new(),
            trace_ring: Arc::new(Mutex::new(VecDeque::with_capacity(TRACE_RING_CAPACITY))),
            stats: Arc::new(Mutex::new(EngineStats::default())),
            devices,
            scheduler,
            data_path,
            event_tx,
        };

        if needs_rewrite {
            engine.persist().await?;
        }
        Ok(engine)
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AutomationEvent> {
        self.event_tx.subscribe()
    }

    /// Spawn the task that forwards scheduler ticks into a rule
    /// re-evaluation against the source device's current state. Requires
    /// the engine already be behind an `Arc` (needed to outlive this call).
    pub fn start(self: &Arc<Self>) {
        let engine = Arc::clone(self);
        let mut rx = engine.scheduler.subscribe();
        tokio::spawn(async move {
            while let Ok(event) = rx.recv().await {
                engine.reevaluate_scheduled(&event.rule_id).await;
            }
        });
    }

    #[must_use]
    pub fn list(&self) -> Vec<Rule> {
        self.rules.iter().map(|e| e.value().clone()).collect()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<Rule> {
        self.rules.get(id).map(|e| e.value().clone())
    }

    /// Create a rule after validating it: 1-5 conditions, a known
    /// command, a resolvable source and target, and a per-source cap.
    pub async fn create(&self, req: CreateRuleRequest) -> Result<Rule, AutomationError> {
        validate_conditions(&req.conditions)?;
        validate_command(&req.action.command)?;
        self.devices
            .device(req.source_ieee)
            .ok_or_else(|| AutomationError::DeviceNotFound(hex_ieee(req.source_ieee)))?;
        self.devices
            .device(req.target_ieee)
            .ok_or_else(|| AutomationError::DeviceNotFound(hex_ieee(req.target_ieee)))?;

        let existing = self.source_index.get(&req.source_ieee).map(|e| e.value().len()).unwrap_or(0);
        if existing >= MAX_RULES_PER_SOURCE {
            return Err(AutomationError::RuleValidation(format!(
                "source {} already has the maximum of {} rules",
                hex_ieee(req.source_ieee),
                MAX_RULES_PER_SOURCE
            )));
        }

        let now = now_rfc3339();
        let rule = Rule {
            id: uuid::Uuid::new_v4().to_string(),
            enabled: req.enabled,
            source_ieee: req.source_ieee,
            conditions: req.conditions,
            target_ieee: req.target_ieee,
            action: req.action,
            cooldown: req.cooldown,
            schedule: req.schedule,
            created_at: now.clone(),
            updated_at: now,
        };

        self.scheduler.register(&rule)?;
        self.source_index.entry(rule.source_ieee).or_default().push(rule.id.clone());
        self.rules.insert(rule.id.clone(), rule.clone());
        self.persist().await?;
        let _ = self.event_tx.send(AutomationEvent::RuleCreated(rule.id.clone()));
        Ok(rule)
    }

    pub async fn update(&self, id: &str, req: UpdateRuleRequest) -> Result<Rule, AutomationError> {
        if let Some(conditions) = &req.conditions {
            validate_conditions(conditions)?;
        }
        if let Some(action) = &req.action {
            validate_command(&action.command)?;
        }
        if let Some(target_ieee) = req.target_ieee {
            self.devices
                .device(target_ieee)
                .ok_or_else(|| AutomationError::DeviceNotFound(hex_ieee(target_ieee)))?;
        }

        let mut rule = self.rules.get(id).map(|e| e.value().clone()).ok_or_else(|| AutomationError::NotFound(id.to_string()))?;
        if let Some(enabled) = req.enabled {
            rule.enabled = enabled;
        }
        if let Some(conditions) = req.conditions {
            rule.conditions = conditions;
        }
        if let Some(target_ieee) = req.target_ieee {
            rule.target_ieee = target_ieee;
        }
        if let Some(action) = req.action {
            rule.action = action;
        }
        if let Some(cooldown) = req.cooldown {
            rule.cooldown = cooldown;
        }
        if let Some(schedule) = req.schedule {
            rule.schedule = schedule;
        }
        rule.updated_at = now_rfc3339();

        self.scheduler.register(&rule)?;
        self.rules.insert(rule.id.clone(), rule.clone());
        self.persist().await?;
        let _ = self.event_tx.send(AutomationEvent::RuleUpdated(rule.id.clone()));
        Ok(rule)
    }

    pub async fn delete(&self, id: &str) -> Result<(), AutomationError> {
        let rule = self.rules.remove(id).ok_or_else(|| AutomationError::NotFound(id.to_string()))?.1;
        self.scheduler.remove(id);
        self.cooldowns.remove(id);
        if let Some(mut ids) = self.source_index.get_mut(&rule.source_ieee) {
            ids.retain(|r| r != id);
        }
        self.persist().await?;
        let _ = self.event_tx.send(AutomationEvent::RuleDeleted(id.to_string()));
        Ok(())
    }

    pub async fn set_enabled(&self, id: &str, enabled: bool) -> Result<Rule, AutomationError> {
        self.update(id, UpdateRuleRequest { enabled: Some(enabled), ..Default::default() }).await
    }

    #[must_use]
    pub async fn stats(&self) -> EngineStats {
        self.stats.lock().await.clone()
    }

    #[must_use]
    pub async fn traces(&self) -> Vec<TraceEntry> {
        self.trace_ring.lock().await.iter().cloned().collect()
    }

    /// Looks up rules by source and evaluates each independently; a rule
    /// with no overlap between its watched attributes and `delta` is
    /// skipped with a DEBUG trace so that an operator can always see why
    /// a rule did not fire.
    pub async fn evaluate(&self, source_ieee: [u8; 8], delta: &StateMap) {
        let Some(rule_ids) = self.source_index.get(&source_ieee).map(|e| e.value().clone()) else {
            return;
        };
        for rule_id in rule_ids {
            let Some(rule) = self.rules.get(&rule_id).map(|e| e.value().clone()) else {
                continue;
            };
            self.evaluate_rule(&rule, delta).await;
        }
    }

    async fn reevaluate_scheduled(&self, rule_id: &str) {
        let Some(rule) = self.rules.get(rule_id).map(|e| e.value().clone()) else {
            return;
        };
        let Some(device) = self.devices.device(rule.source_ieee) else {
            return;
        };
        // Schedule-driven re-checks have no "delta": treat the source
        // device's full current state as though every attribute just
        // changed, so the relevance/condition steps see it uniformly.
        self.evaluate_rule(&rule, &device.state).await;
    }

    async fn evaluate_rule(&self, rule: &Rule, delta: &StateMap) {
        {
            let mut stats = self.stats.lock().await;
            stats.rules_evaluated += 1;
        }

        if !rule.enabled {
            self.trace(rule, TraceLevel::Debug, TracePhase::Relevance, TraceResult::NotRelevant, "rule is disabled")
                .await;
            return;
        }

        let watched = rule.watched_attributes();
        if !watched.iter().any(|a| delta.contains_key(*a)) {
            self.trace(
                rule,
                TraceLevel::Debug,
                TracePhase::Relevance,
                TraceResult::NotRelevant,
                "no watched attribute changed",
            )
            .await;
            return;
        }

        let source_state = self.devices.device(rule.source_ieee).map(|d| d.state).unwrap_or_default();
        let result = evaluate_conditions(&rule.conditions, delta, &source_state);
        match result.outcome {
            ConditionOutcome::Fail => {
                let mut stats = self.stats.lock().await;
                stats.rules_no_match += 1;
                drop(stats);
                self.trace(
                    rule,
                    TraceLevel::Info,
                    TracePhase::Match,
                    TraceResult::NoMatch,
                    format!("condition {} of {} did not match", result.conditions_checked, rule.conditions.len()),
                )
                .await;
                return;
            }
            ConditionOutcome::Error(msg) => {
                self.trace(rule, TraceLevel::Error, TracePhase::Match, TraceResult::Exception, msg).await;
                return;
            }
            ConditionOutcome::Pass => {}
        }

        let now = now_millis();
        let cooldown_ms = rule.cooldown.saturating_mul(1000);
        let blocked = {
            let mut last_fired = self.cooldowns.entry(rule.id.clone()).or_insert(0);
            let elapsed = now.saturating_sub(*last_fired);
            if *last_fired > 0 && elapsed < cooldown_ms {
                Some(elapsed)
            } else {
                *last_fired = now; // set before dispatch: at-most-one in-flight fire per window
                None
            }
        };
        if let Some(elapsed) = blocked {
            let mut stats = self.stats.lock().await;
            stats.rules_blocked += 1;
            drop(stats);
            self.trace(
                rule,
                TraceLevel::Info,
                TracePhase::Cooldown,
                TraceResult::Blocked,
                format!("blocked: {:.1}s elapsed, cooldown is {}s", elapsed as f64 / 1000.0, rule.cooldown),
            )
            .await;
            return;
        }

        let Some(target) = self.devices.device(rule.target_ieee) else {
            self.trace(rule, TraceLevel::Error, TracePhase::Target, TraceResult::Exception, "target device not found")
                .await;
            return;
        };
        if target.is_unreachable() {
            self.trace(
                rule,
                TraceLevel::Error,
                TracePhase::Target,
                TraceResult::Exception,
                "target device has no live endpoints",
            )
            .await;
            return;
        }
        if !executor::capability_matches(&target, &rule.action.command) {
            self.trace(
                rule,
                TraceLevel::Warning,
                TracePhase::Target,
                TraceResult::Firing,
                format!("target may not support '{}', dispatching anyway", rule.action.command),
            )
            .await;
        }

        {
            let mut stats = self.stats.lock().await;
            stats.rules_fired += 1;
        }
        self.trace(rule, TraceLevel::Info, TracePhase::Dispatch, TraceResult::Firing, "dispatching action").await;
        self.dispatch(rule.clone()).await;
    }

    /// Fire-and-forget dispatch task. Spawned so that a rule toggling a
    /// device's own state cannot re-enter `evaluate` through the same
    /// call stack.
    async fn dispatch(&self, rule: Rule) {
        let devices = Arc::clone(&self.devices);
        let trace_ring = Arc::clone(&self.trace_ring);
        let stats = Arc::clone(&self.stats);
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            let outcome = executor::dispatch(&devices, rule.target_ieee, &rule.action).await;
            let entry = if outcome.success {
                TraceEntry {
                    rule_id: rule.id.clone(),
                    level: TraceLevel::Info,
                    phase: TracePhase::Dispatch,
                    result: TraceResult::Success,
                    message: "command dispatched successfully".to_string(),
                    timestamp: now_millis(),
                    payload: None,
                }
            } else {
                {
                    let mut stats = stats.lock().await;
                    stats.commands_failed += 1;
                }
                TraceEntry {
                    rule_id: rule.id.clone(),
                    level: TraceLevel::Error,
                    phase: TracePhase::Dispatch,
                    result: TraceResult::CommandFailed,
                    message: outcome.error.clone().unwrap_or_else(|| "command failed".to_string()),
                    timestamp: now_millis(),
                    payload: None,
                }
            };
            push_trace(&trace_ring, &event_tx, entry).await;
        });
    }

    async fn trace(
        &self,
        rule: &Rule,
        level: TraceLevel,
        phase: TracePhase,
        result: TraceResult,
        message: impl Into<String>,
    ) {
        let entry = TraceEntry {
            rule_id: rule.id.clone(),
            level,
            phase,
            result,
            message: message.into(),
            timestamp: now_millis(),
            payload: None,
        };
        push_trace(&self.trace_ring, &self.event_tx, entry).await;
    }

    async fn persist(&self) -> Result<(), AutomationError> {
        let snapshot: Vec<Rule> = self.rules.iter().map(|e| e.value().clone()).collect();
        persistence::save_rules(&self.data_path, &snapshot).await.map_err(AutomationError::Io)
    }
}

async fn push_trace(
    ring: &Mutex<VecDeque<TraceEntry>>,
    event_tx: &broadcast::Sender<AutomationEvent>,
    entry: TraceEntry,
) {
    let mut guard = ring.lock().await;
    if guard.len() >= TRACE_RING_CAPACITY {
        guard.pop_front();
    }
    guard.push_back(entry.clone());
    drop(guard);
    let _ = event_tx.send(AutomationEvent::Trace(entry));
}

fn validate_conditions(conditions: &[Condition]) -> Result<(), AutomationError> {
    if conditions.len() < MIN_CONDITIONS || conditions.len() > MAX_CONDITIONS {
        return Err(AutomationError::RuleValidation(format!(
            "a rule must have between {MIN_CONDITIONS} and {MAX_CONDITIONS} conditions, got {}",
            conditions.len()
        )));
    }
    Ok(())
}

fn validate_command(command: &str) -> Result<(), AutomationError> {
    if !VALID_COMMANDS.contains(&command) {
        return Err(AutomationError::RuleValidation(format!("unknown command: {command}")));
    }
    Ok(())
}

fn hex_ieee(ieee: [u8; 8]) -> String {
    ieee.iter().map(|b| format!("{b:02x}")).collect()
}

fn now_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

fn now_rfc3339() -> String {
    chrono::Local::now().to_rfc3339()
}

#[async_trait]
impl AutomationSink for AutomationEngine {
    async fn on_device_delta(&self, source_ieee: [u8; 8], delta: StateMap) {
        self.evaluate(source_ieee, &delta).await;
    }
}
