//! Error taxonomy for the gateway core.
//!
//! Mirrors the kinds named in the error-handling design: handler and
//! persistence failures are logged and swallowed by their callers, so most
//! of these variants surface as a structured `{success, error}` value
//! rather than propagating across the public boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("transport timed out")]
    TransportTimeout,

    #[error("coordinator unavailable")]
    CoordinatorUnavailable,

    #[error("device {0} unreachable")]
    DeviceUnreachable(String),

    #[error("unknown cluster 0x{0:04x}")]
    UnknownCluster(u16),

    #[error("unknown attribute 0x{0:04x}")]
    UnknownAttribute(u16),

    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    #[error("capability mismatch: {0}")]
    CapabilityMismatch(String),

    #[error("persistence failure: {0}")]
    PersistenceFailure(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// The outcome of a command dispatch, returned across the public boundary
/// instead of an exception. Automation traces fold this into a trace entry.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CommandOutcome {
    pub success: bool,
    pub error: Option<String>,
}

impl CommandOutcome {
    #[must_use]
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    #[must_use]
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

impl From<Error> for CommandOutcome {
    fn from(e: Error) -> Self {
        Self::fail(e.to_string())
    }
}
