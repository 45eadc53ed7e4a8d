//! Protocol-level errors: frame decode failures and transport faults.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    #[error("frame too short: {0} bytes")]
    FrameTooShort(usize),

    #[error("unknown data type: {0:#04X}")]
    UnknownDataType(u8),

    #[error("serial port error: {0}")]
    SerialError(#[from] std::io::Error),

    #[error("request timed out")]
    Timeout,

    #[error("transport not connected")]
    NotConnected,
}
