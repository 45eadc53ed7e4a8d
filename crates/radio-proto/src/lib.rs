//! Radio-facing protocol layer: the `ControllerApplication` abstraction the
//! core consumes, the ZCL/Tuya wire codecs, the ZNP Touchlink wire format,
//! and a generic SLIP-framed serial transport.

pub mod controller;
pub mod error;
pub mod slip;
pub mod touchlink;
pub mod transport;
pub mod tuya;
pub mod zcl;

pub use controller::{ControllerApplication, EnergyScanResult, NodeInfo, Packet, ReportConfig};
pub use error::ProtocolError;
pub use slip::{SlipDecoder, SlipEncoder};
pub use transport::SerialLink;
pub use zcl::ZclFrame;
