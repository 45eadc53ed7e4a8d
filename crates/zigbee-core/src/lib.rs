//! Zigbee abstraction layer
//!
//! Device and endpoint modeling, cluster handlers, the debounced device
//! state engine, and JSON persistence for a Zigbee gateway core. Talks to
//! the radio only through `radio_proto::ControllerApplication`.

pub mod cluster;
pub mod device;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod fast_path;
pub mod handler;
pub mod link_quality;
pub mod matter;
pub mod mqtt;
pub mod persistence;
pub mod state;
pub mod stats;

pub use device::{
    Cluster, ClusterDirection, DeviceCategory, DeviceType, Endpoint, EndpointRole, PowerSource,
    ZigbeeDevice, DEFAULT_MAX_REPORT_INTERVAL_SECS,
};
pub use dispatch::handle_packet;
pub use engine::{AutomationSink, DeviceStateEngine, HandlerState, NullAutomationSink};
pub use error::{CommandOutcome, Error, Result};
pub use link_quality::{LinkQualityIntake, LinkSample, RouteEdge};
pub use matter::{MatterAdapter, MatterFabric};
pub use mqtt::{MqttPublisher, NullPublisher};
pub use state::{round_measurement, MeasurementKind, StateMap, StateValue};
pub use stats::{PacketCounters, PacketStatsTracker};
