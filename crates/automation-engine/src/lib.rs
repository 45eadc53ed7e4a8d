//! Threshold-rule automation: watch a source device's state deltas,
//! evaluate an ordered condition list, and dispatch a command to a
//! target device on a cooldown.

pub mod engine;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod model;
pub mod persistence;
pub mod scheduler;

pub use engine::{AutomationEngine, AutomationEvent};
pub use error::AutomationError;
pub use model::*;
