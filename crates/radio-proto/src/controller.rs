//! The radio abstraction the core consumes.
//!
//! `ControllerApplication` is the boundary between the gateway core and the
//! Zigbee stack proper: the core does not implement the 802.15.4 MAC, the
//! network layer, or APS security, it only depends on this trait. Both an
//! EZSP backend and a ZNP backend can satisfy it; neither is implemented
//! here — only the Touchlink wire format (see `touchlink.rs`) has a
//! concrete implementation in this crate.

use crate::error::ProtocolError;
use async_trait::async_trait;
use std::time::Duration;

/// A received radio packet, as delivered to the `packet_received`
/// callback. `rssi`/`lqi` are optional because not every backend surfaces
/// both for every packet.
#[derive(Debug, Clone)]
pub struct Packet {
    pub src_ieee: [u8; 8],
    pub src_nwk: u16,
    pub src_endpoint: u8,
    pub dst_endpoint: u8,
    pub profile_id: u16,
    pub cluster_id: u16,
    pub asdu: Vec<u8>,
    pub rssi: Option<i8>,
    pub lqi: Option<u8>,
}

/// Coordinator node info, exposed by the radio backend at startup.
#[derive(Debug, Clone)]
pub struct NodeInfo {
    pub ieee: [u8; 8],
    pub nwk: u16,
    pub channel: u8,
}

/// A `(min_interval, max_interval, reportable_change)` reporting
/// configuration request, per the glossary's "Reporting configuration".
#[derive(Debug, Clone, Copy)]
pub struct ReportConfig {
    pub attr_id: u16,
    pub min_interval: u16,
    pub max_interval: u16,
    pub reportable_change: u32,
}

#[derive(Debug, Clone)]
pub struct EnergyScanResult {
    pub channel: u8,
    pub energy: u8,
}

/// Default timeouts for radio operations.
pub const READ_TIMEOUT: Duration = Duration::from_secs(10);
pub const CONFIGURE_TIMEOUT: Duration = Duration::from_secs(10);
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// The controller abstraction the core requires from a radio backend.
///
/// Every method that talks to the radio is `async` and is expected to be
/// wrapped by the caller in a `tokio::time::timeout` using the constants
/// above — the trait itself does not embed timeouts so that a backend can
/// be exercised directly in tests without a runtime-imposed deadline.
#[async_trait]
pub trait ControllerApplication: Send + Sync {
    /// The coordinator's own node info, including its IEEE (used for IAS
    /// Zone CIE enrollment and LightLink group-join).
    fn node_info(&self) -> NodeInfo;

    async fn read_attributes(
        &self,
        ieee: [u8; 8],
        endpoint: u8,
        cluster: u16,
        attrs: &[u16],
    ) -> Result<Vec<(u16, Vec<u8>)>, ProtocolError>;

    async fn write_attributes(
        &self,
        ieee: [u8; 8],
        endpoint: u8,
        cluster: u16,
        attrs: &[(u16, u8, Vec<u8>)],
    ) -> Result<(), ProtocolError>;

    async fn configure_reporting(
        &self,
        ieee: [u8; 8],
        endpoint: u8,
        cluster: u16,
        configs: &[ReportConfig],
    ) -> Result<(), ProtocolError>;

    async fn bind(&self, ieee: [u8; 8], endpoint: u8, cluster: u16) -> Result<(), ProtocolError>;

    async fn send_command(
        &self,
        ieee: [u8; 8],
        endpoint: u8,
        cluster: u16,
        command_id: u8,
        payload: &[u8],
    ) -> Result<(), ProtocolError>;

    async fn energy_scan(&self, channels: &[u8]) -> Result<Vec<EnergyScanResult>, ProtocolError>;

    async fn add_to_group(&self, group_id: u16, name: Option<&str>) -> Result<(), ProtocolError>;

    /// LightLink group-identifier query: the set of group IDs the
    /// device already reports membership in. An empty result (not an
    /// error) means the device has no groups yet.
    async fn get_group_identifiers(
        &self,
        ieee: [u8; 8],
        endpoint: u8,
    ) -> Result<Vec<u16>, ProtocolError>;
}
