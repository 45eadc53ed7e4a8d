//! Zigbee device representation: the data model's `Device`, `Endpoint`,
//! and `Cluster` types.

use crate::state::StateMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Zigbee device types (network role).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Coordinator,
    Router,
    EndDevice,
}

/// User-facing device category, independent of the derived endpoint role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeviceCategory {
    Light,
    Outlet,
    Switch,
    Sensor,
    Lock,
    Thermostat,
    Fan,
    Blinds,
    #[default]
    Other,
}

/// Basic cluster power source, mapped from the 7-value ZCL enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerSource {
    Unknown,
    MainsSinglePhase,
    MainsThreePhase,
    Battery,
    Dc,
    EmergencyMainsPrimary,
    EmergencyMainsAndBattery,
}

impl PowerSource {
    #[must_use]
    pub fn from_zcl(value: u8) -> Self {
        match value & 0x7F {
            0x01 => Self::MainsSinglePhase,
            0x02 => Self::MainsThreePhase,
            0x03 => Self::Battery,
            0x04 => Self::Dc,
            0x05 => Self::EmergencyMainsPrimary,
            0x06 => Self::EmergencyMainsAndBattery,
            _ => Self::Unknown,
        }
    }

    /// Inverse of the `format!("{self:?}").to_lowercase()` label the Basic
    /// handler writes into state (`BasicHandler::attribute_updated`).
    #[must_use]
    pub fn from_state_label(label: &str) -> Option<Self> {
        match label {
            "unknown" => Some(Self::Unknown),
            "mainssinglephase" => Some(Self::MainsSinglePhase),
            "mainsthreephase" => Some(Self::MainsThreePhase),
            "battery" => Some(Self::Battery),
            "dc" => Some(Self::Dc),
            "emergencymainsprimary" => Some(Self::EmergencyMainsPrimary),
            "emergencymainsandbattery" => Some(Self::EmergencyMainsAndBattery),
            _ => None,
        }
    }
}

/// Direction of a cluster within an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterDirection {
    /// Server-side (input) cluster: the device hosts attributes/commands.
    Input,
    /// Client-side (output) cluster: the device issues commands.
    Output,
}

/// A single ZCL cluster scoped to an endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    pub id: u16,
    pub direction: ClusterDirection,
}

/// The derived role of an endpoint, computed from its cluster mix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointRole {
    Actuator,
    Sensor,
    Controller,
    Mixed,
    Passive,
}

/// Cluster families whose presence as an *input* implies controllable
/// (actuator) behavior; as an *output* implies a remote-control endpoint.
const CONTROL_CLUSTERS: [u16; 4] = [0x0006, 0x0008, 0x0300, 0x0102];

/// A device endpoint (1-254).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: u8,
    pub profile_id: u16,
    pub device_id: u16,
    pub in_clusters: Vec<u16>,
    pub out_clusters: Vec<u16>,
}

impl Endpoint {
    #[must_use]
    pub fn has_cluster(&self, cluster_id: u16) -> bool {
        self.in_clusters.contains(&cluster_id) || self.out_clusters.contains(&cluster_id)
    }

    #[must_use]
    pub fn has_in_cluster(&self, cluster_id: u16) -> bool {
        self.in_clusters.contains(&cluster_id)
    }

    #[must_use]
    pub fn is_light(&self) -> bool {
        self.has_cluster(0x0006) || self.has_cluster(0x0008)
    }

    #[must_use]
    pub fn is_color_light(&self) -> bool {
        self.has_in_cluster(0x0300)
    }

    #[must_use]
    pub fn has_temperature(&self) -> bool {
        self.has_in_cluster(0x0402)
    }

    #[must_use]
    pub fn has_humidity(&self) -> bool {
        self.has_in_cluster(0x0405)
    }

    #[must_use]
    pub fn is_occupancy_sensor(&self) -> bool {
        self.has_in_cluster(0x0406)
    }

    /// Derive the endpoint's role per the data model: *actuator* has a
    /// control-family input and no matching control-family output,
    /// *controller* is the mirror image, *sensor* has measurement inputs
    /// only, *mixed* has both, *passive* has neither.
    #[must_use]
    pub fn role(&self) -> EndpointRole {
        let control_in = self
            .in_clusters
            .iter()
            .any(|c| CONTROL_CLUSTERS.contains(c));
        let control_out = self
            .out_clusters
            .iter()
            .any(|c| CONTROL_CLUSTERS.contains(c));

        match (control_in, control_out) {
            (true, false) => EndpointRole::Actuator,
            (false, true) => EndpointRole::Controller,
            (true, true) => EndpointRole::Mixed,
            (false, false) if self.in_clusters.is_empty() && self.out_clusters.is_empty() => {
                EndpointRole::Passive
            }
            (false, false) => EndpointRole::Sensor,
        }
    }

    /// Home-Assistant-discovery light-vs-switch heuristic: Electrical
    /// Measurement or Level without Color/LightLink (or a multistate/Sonoff
    /// input cluster) is forced to a switch; otherwise LightLink, Opple,
    /// Color, or Level input clusters imply a light.
    #[must_use]
    pub fn looks_like_light(&self) -> bool {
        let has_lightlink = self.has_in_cluster(0x1000);
        let has_opple = self.has_in_cluster(0xFCC0);
        let has_color = self.has_in_cluster(0x0300);
        let has_level = self.has_in_cluster(0x0008);
        let has_electrical = self.has_in_cluster(0x0B04);
        let has_multi_state = self.has_in_cluster(0x0012);
        let has_sonoff = self.has_in_cluster(0xFC11);

        if (has_electrical && has_level || has_multi_state || has_sonoff)
            && !(has_color || has_lightlink)
        {
            return false;
        }
        has_lightlink || has_opple || has_color || has_level
    }
}

/// A Zigbee device on the network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZigbeeDevice {
    pub ieee_address: [u8; 8],
    pub nwk_address: u16,
    pub device_type: DeviceType,
    #[serde(default)]
    pub category: DeviceCategory,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub sw_version: Option<String>,
    pub power_source: Option<PowerSource>,
    pub friendly_name: Option<String>,
    pub endpoints: Vec<Endpoint>,
    /// Unix epoch milliseconds of the last received packet from this
    /// device.
    pub last_seen: Option<u64>,
    pub lqi: Option<u8>,
    pub available: bool,
    /// Normalised state map; schemaless, keys discovered by handlers.
    #[serde(default)]
    pub state: StateMap,
    /// Largest `max_interval` any handler has successfully configured
    /// reporting with; drives the availability timeout.
    #[serde(default)]
    pub max_report_interval_secs: Option<u32>,
    #[serde(default)]
    pub consecutive_failed_commands: u8,
}

/// Availability timeout floor used until a handler configures reporting.
pub const DEFAULT_MAX_REPORT_INTERVAL_SECS: u32 = 300;

impl ZigbeeDevice {
    #[must_use]
    pub fn new(ieee_address: [u8; 8], nwk_address: u16) -> Self {
        Self {
            ieee_address,
            nwk_address,
            device_type: DeviceType::EndDevice,
            category: DeviceCategory::default(),
            manufacturer: None,
            model: None,
            sw_version: None,
            power_source: None,
            friendly_name: None,
            endpoints: Vec::new(),
            last_seen: None,
            lqi: None,
            available: true,
            state: StateMap::new(),
            max_report_interval_secs: None,
            consecutive_failed_commands: 0,
        }
    }

    #[must_use]
    pub fn ieee_address_string(&self) -> String {
        self.ieee_address
            .iter()
            .rev()
            .map(|b| format!("{b:02x}"))
            .collect::<Vec<_>>()
            .join(":")
    }

    /// IEEE address with no separators, as used by the data model's
    /// canonical 16-lowercase-hex-character device identity.
    #[must_use]
    pub fn ieee_address_compact(&self) -> String {
        self.ieee_address
            .iter()
            .rev()
            .map(|b| format!("{b:02x}"))
            .collect::<String>()
    }

    #[must_use]
    pub fn display_name(&self) -> String {
        self.friendly_name
            .clone()
            .or_else(|| self.model.clone())
            .unwrap_or_else(|| self.ieee_address_string())
    }

    /// The availability timeout in milliseconds:
    /// `3 × max_report_interval + 60s`.
    #[must_use]
    pub fn availability_timeout_ms(&self) -> u64 {
        let interval = self
            .max_report_interval_secs
            .unwrap_or(DEFAULT_MAX_REPORT_INTERVAL_SECS) as u64;
        (3 * interval + 60) * 1000
    }

    /// A device with no live endpoints is unreachable, not deleted: other
    /// than reporting it as such, the registry never removes it.
    #[must_use]
    pub fn is_unreachable(&self) -> bool {
        self.endpoints.is_empty()
    }

    #[must_use]
    pub fn endpoint(&self, id: u8) -> Option<&Endpoint> {
        self.endpoints.iter().find(|e| e.id == id)
    }

    /// First endpoint whose role permits the given command, used by
    /// `send_command` when the caller does not specify an endpoint.
    #[must_use]
    pub fn endpoint_for_command(&self, required_cluster: u16) -> Option<&Endpoint> {
        self.endpoints
            .iter()
            .find(|e| e.has_in_cluster(required_cluster))
    }
}

/// A device identity map alias used by the engine and persistence layer.
pub type DeviceMap = HashMap<[u8; 8], ZigbeeDevice>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ieee_string_is_reversed_and_colon_joined() {
        let dev = ZigbeeDevice::new([0xaa, 0xbb, 0xcc, 0, 0, 0, 0, 0x01], 1);
        assert_eq!(dev.ieee_address_string(), "01:00:00:00:00:cc:bb:aa");
    }

    #[test]
    fn role_derivation_matches_data_model() {
        let actuator = Endpoint {
            id: 1,
            profile_id: 0x0104,
            device_id: 0,
            in_clusters: vec![0x0000, 0x0006],
            out_clusters: vec![],
        };
        assert_eq!(actuator.role(), EndpointRole::Actuator);

        let sensor = Endpoint {
            id: 1,
            profile_id: 0x0104,
            device_id: 0,
            in_clusters: vec![0x0406],
            out_clusters: vec![],
        };
        assert_eq!(sensor.role(), EndpointRole::Sensor);

        let controller = Endpoint {
            id: 1,
            profile_id: 0x0104,
            device_id: 0,
            in_clusters: vec![],
            out_clusters: vec![0x0006],
        };
        assert_eq!(controller.role(), EndpointRole::Controller);
    }

    #[test]
    fn availability_timeout_uses_default_floor() {
        let dev = ZigbeeDevice::new([0; 8], 0);
        assert_eq!(dev.availability_timeout_ms(), (3 * 300 + 60) * 1000);
    }
}
