//! Optional time-based re-evaluation for rules carrying a `schedule`, a
//! supplemental trigger alongside the primary delta-driven evaluation.
//!
//! A rule with no `schedule` is never registered here; it fires purely
//! off state deltas via `AutomationEngine::evaluate`.

use crate::error::AutomationError;
use crate::model::{Rule, ScheduleSpec};
use chrono::{Datelike, Local, NaiveTime};
use cron::Schedule;
use dashmap::DashMap;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Emitted each time a rule's schedule fires; the engine re-evaluates the
/// rule's conditions against the source device's *current* state.
#[derive(Debug, Clone)]
pub struct SchedulerEvent {
    pub rule_id: String,
}

/// Manages one background timer task per scheduled rule.
pub struct Scheduler {
    timers: Arc<DashMap<String, JoinHandle<()>>>,
    event_tx: broadcast::Sender<SchedulerEvent>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            timers: Arc::new(DashMap::new()),
            event_tx,
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.event_tx.subscribe()
    }

    /// (Re-)register a rule's schedule. A rule with no `schedule`, or that
    /// is disabled, has any existing timer removed and nothing scheduled.
    pub fn register(&self, rule: &Rule) -> Result<(), AutomationError> {
        self.remove(&rule.id);

        let Some(schedule) = &rule.schedule else {
            return Ok(());
        };
        if !rule.enabled {
            return Ok(());
        }

        match schedule {
            ScheduleSpec::Interval { seconds } => self.schedule_interval(&rule.id, *seconds),
            ScheduleSpec::TimeOfDay { time, days } => {
                self.schedule_time_of_day(&rule.id, time, days)?;
            }
            ScheduleSpec::Cron { expression } => self.schedule_cron(&rule.id, expression)?,
        }
        Ok(())
    }

    pub fn remove(&self, rule_id: &str) {
        if let Some((_, handle)) = self.timers.remove(rule_id) {
            handle.abort();
            tracing::debug!(rule_id, "removed scheduler timer");
        }
    }

    fn schedule_interval(&self, rule_id: &str, seconds: u64) {
        let id = rule_id.to_string();
        let event_tx = self.event_tx.clone();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(seconds.max(1)));
            interval.tick().await; // skip the immediate first tick
            loop {
                interval.tick().await;
                let _ = event_tx.send(SchedulerEvent { rule_id: id.clone() });
            }
        });

        self.timers.insert(rule_id.to_string(), handle);
        tracing::info!(rule_id, seconds, "scheduled interval re-evaluation");
    }

    fn schedule_time_of_day(&self, rule_id: &str, time_str: &str, days: &[u8]) -> Result<(), AutomationError> {
        let target_time = NaiveTime::parse_from_str(time_str, "%H:%M")
            .map_err(|_| AutomationError::InvalidTimeFormat(time_str.to_string()))?;

        let id = rule_id.to_string();
        let event_tx = self.event_tx.clone();
        let days_filter = days.to_vec();

        let handle = tokio::spawn(async move {
            loop {
                let now = Local::now();
                let today = now.date_naive();
                let mut target_datetime = today.and_time(target_time);
                if target_datetime <= now.naive_local() {
                    target_datetime += chrono::Duration::days(1);
                }
                if !days_filter.is_empty() {
                    let mut dt = target_datetime;
                    let mut attempts = 0;
                    while !days_filter.contains(&(dt.weekday().num_days_from_sunday() as u8)) && attempts < 7 {
                        dt += chrono::Duration::days(1);
                        attempts += 1;
                    }
                    target_datetime = dt;
                }
                let Some(target_instant) = target_datetime.and_local_timezone(Local).single() else {
                    break;
                };
                let duration = (target_instant - now)
                    .to_std()
                    .unwrap_or(std::time::Duration::from_secs(1));
                tokio::time::sleep(duration).await;
                let _ = event_tx.send(SchedulerEvent { rule_id: id.clone() });
                tokio::time::sleep(std::time::Duration::from_secs(1)).await;
            }
        });

        self.timers.insert(rule_id.to_string(), handle);
        tracing::info!(rule_id, time = time_str, "scheduled time-of-day re-evaluation");
        Ok(())
    }

    fn schedule_cron(&self, rule_id: &str, expression: &str) -> Result<(), AutomationError> {
        let schedule = Schedule::from_str(expression)
            .map_err(|e| AutomationError::InvalidCron(format!("{expression}: {e}")))?;

        let id = rule_id.to_string();
        let event_tx = self.event_tx.clone();

        let handle = tokio::spawn(async move {
            loop {
                let now = Local::now();
                let Some(next_time) = schedule.upcoming(Local).next() else {
                    tracing::warn!(rule_id = %id, "no upcoming cron time");
                    break;
                };
                let duration = (next_time - now)
                    .to_std()
                    .unwrap_or(std::time::Duration::from_secs(60));
                tokio::time::sleep(duration).await;
                let _ = event_tx.send(SchedulerEvent { rule_id: id.clone() });
                tokio::time::sleep(std::time::Duration::from_secs(1)).await;
            }
        });

        self.timers.insert(rule_id.to_string(), handle);
        tracing::info!(rule_id, expression, "scheduled cron re-evaluation");
        Ok(())
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.timers.len()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        for entry in self.timers.iter() {
            entry.value().abort();
        }
    }
}
