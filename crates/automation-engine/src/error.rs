//! Error types for the automation engine.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("rule not found: {0}")]
    NotFound(String),

    #[error("rule validation failed: {0}")]
    RuleValidation(String),

    #[error("device not found: {0}")]
    DeviceNotFound(String),

    #[error("device control failed: {0}")]
    DeviceControlFailed(String),

    #[error("invalid cron expression: {0}")]
    InvalidCron(String),

    #[error("invalid time format: {0}")]
    InvalidTimeFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
