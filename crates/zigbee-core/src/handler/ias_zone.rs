//! IAS Zone (0x0500) handler: the canonical motion/contact/leak/smoke
//! handler. Zone type is read once on configure; the CIE address is
//! written to enroll the coordinator. Alarm state arrives as a *cluster
//! command* (0x00 Zone Status Change Notification), not an attribute
//! report.

use super::{ClusterHandler, ConfigureOutcome, DiscoveryConfig};
use crate::cluster::ias_zone_attrs as attrs;
use crate::cluster::ias_zone_status_bits as bits;
use crate::cluster::{ias_zone_type_name, id};
use crate::state::StateMap;
use async_trait::async_trait;
use radio_proto::ControllerApplication;

/// Zone Status Change Notification command ID.
pub const CMD_STATUS_CHANGE_NOTIFICATION: u8 = 0x00;
/// Enroll Request command ID.
pub const CMD_ENROLL_REQUEST: u8 = 0x01;

#[derive(Debug, Default)]
pub struct IasZoneHandler {
    zone_type: Option<u16>,
    coordinator_ieee: Option<[u8; 8]>,
}

/// Decode a 16-bit Zone Status bitmap into its zone-type-dependent state
/// keys. Tolerates trailing bytes from vendors that append extended
/// status, zone ID, or delay fields — only the first two status bytes
/// are consulted.
#[must_use]
pub fn decode_status(zone_type: Option<u16>, status: u16) -> StateMap {
    let mut out = StateMap::new();
    let alarm1 = status & bits::ALARM1 != 0;
    let alarm2 = status & bits::ALARM2 != 0;
    let tamper = status & bits::TAMPER != 0;
    let battery_low = status & bits::BATTERY_LOW != 0;

    match zone_type.map(|t| ias_zone_type_name(t)) {
        Some("contact_switch") => {
            // Contact switches invert alarm1: bit set means "open".
            out.insert("contact".into(), (!alarm1).into());
            out.insert("is_open".into(), alarm1.into());
        }
        Some("motion_sensor") | Some("standard_cie") => {
            out.insert("occupancy".into(), alarm1.into());
            out.insert("motion".into(), alarm1.into());
            out.insert("presence".into(), alarm1.into());
        }
        Some("water_sensor") => {
            out.insert("leak".into(), alarm1.into());
        }
        Some("fire_sensor") => {
            out.insert("smoke".into(), alarm1.into());
        }
        Some("co_sensor") => {
            out.insert("carbon_monoxide".into(), alarm1.into());
        }
        Some("vibration_sensor") => {
            out.insert("vibration".into(), alarm1.into());
        }
        _ => {
            // Unknown zone type: still surface the raw alarm bit so the
            // device is not silently mute.
            out.insert("alarm".into(), alarm1.into());
            out.insert("occupancy".into(), alarm1.into());
            out.insert("motion".into(), alarm1.into());
        }
    }
    out.insert("alarm2".into(), alarm2.into());
    out.insert("tamper".into(), tamper.into());
    out.insert("battery_low".into(), battery_low.into());
    out
}

#[async_trait]
impl ClusterHandler for IasZoneHandler {
    fn cluster_id(&self) -> u16 {
        id::IAS_ZONE
    }

    fn attribute_updated(&mut self, attr_id: u16, _data_type: u8, data: &[u8]) -> StateMap {
        let mut out = StateMap::new();
        if attr_id == attrs::ZONE_TYPE {
            if let Some(raw) = data.get(0..2).map(|b| u16::from_le_bytes([b[0], b[1]])) {
                self.zone_type = Some(raw);
                // Cached so the fast-path decoder, which has no handler
                // instance of its own, can resolve the zone-type-dependent
                // status bitmap from the device's state map.
                out.insert("zone_type_code".into(), i64::from(raw).into());
            }
        }
        out
    }

    fn cluster_command(&mut self, _tsn: u8, command_id: u8, args: &[u8]) -> StateMap {
        if command_id == CMD_STATUS_CHANGE_NOTIFICATION && args.len() >= 2 {
            let status = u16::from_le_bytes([args[0], args[1]]);
            return decode_status(self.zone_type, status);
        }
        StateMap::new()
    }

    async fn configure(
        &mut self,
        radio: &dyn ControllerApplication,
        ieee: [u8; 8],
        endpoint: u8,
    ) -> (ConfigureOutcome, StateMap) {
        // The zone type read is the only way `zone_type_code` ever reaches
        // device state: it's a one-time metadata read, never reported
        // unsolicited, and the fast-path decoder depends on it being there.
        let mut metadata = StateMap::new();
        match radio
            .read_attributes(ieee, endpoint, self.cluster_id(), &[attrs::ZONE_TYPE])
            .await
        {
            Ok(results) => {
                if let Some((_, data)) = results.into_iter().next() {
                    metadata.extend(self.attribute_updated(attrs::ZONE_TYPE, 0, &data));
                }
            }
            Err(e) => {
                tracing::warn!("ias zone type read failed: {e}");
            }
        }

        let coordinator_ieee = self.coordinator_ieee.unwrap_or_else(|| radio.node_info().ieee);
        self.coordinator_ieee = Some(coordinator_ieee);
        let cie_value: Vec<u8> = coordinator_ieee.to_vec();
        match radio
            .write_attributes(
                ieee,
                endpoint,
                self.cluster_id(),
                &[(attrs::CIE_ADDR, 0xF0, cie_value)],
            )
            .await
        {
            Ok(()) => (ConfigureOutcome::Ok, metadata),
            Err(e) => {
                tracing::warn!("ias zone CIE enrollment failed: {e}");
                (ConfigureOutcome::Failed, metadata)
            }
        }
    }

    fn poll_attributes(&self) -> Vec<u16> {
        vec![attrs::ZONE_STATUS]
    }

    fn discovery_configs(&self, endpoint_id: u8) -> Vec<DiscoveryConfig> {
        let device_class = match self.zone_type.map(ias_zone_type_name) {
            Some("contact_switch") => "door",
            Some("motion_sensor") => "motion",
            Some("water_sensor") => "moisture",
            Some("fire_sensor") | Some("co_sensor") => "smoke",
            _ => "safety",
        };
        vec![DiscoveryConfig {
            component: "binary_sensor".into(),
            object_id: format!("ias_{endpoint_id}"),
            config: serde_json::json!({"device_class": device_class}),
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contact_switch_open_bit_sets_is_open() {
        let delta = decode_status(Some(0x0015), 0x0001);
        assert_eq!(delta.get("contact").and_then(|v| v.as_bool()), Some(false));
        assert_eq!(delta.get("is_open").and_then(|v| v.as_bool()), Some(true));
    }

    #[test]
    fn contact_switch_status_0000_restores() {
        let delta = decode_status(Some(0x0015), 0x0000);
        assert_eq!(delta.get("contact").and_then(|v| v.as_bool()), Some(true));
        assert_eq!(delta.get("is_open").and_then(|v| v.as_bool()), Some(false));
    }

    #[test]
    fn motion_sensor_sets_three_aliases() {
        let delta = decode_status(Some(0x000D), 0x0001);
        assert_eq!(delta.get("occupancy").and_then(|v| v.as_bool()), Some(true));
        assert_eq!(delta.get("motion").and_then(|v| v.as_bool()), Some(true));
        assert_eq!(delta.get("presence").and_then(|v| v.as_bool()), Some(true));
    }

    #[test]
    fn standard_cie_zone_type_aliases_like_motion_sensor() {
        let delta = decode_status(Some(0x0000), 0x0001);
        assert_eq!(delta.get("occupancy").and_then(|v| v.as_bool()), Some(true));
        assert_eq!(delta.get("motion").and_then(|v| v.as_bool()), Some(true));
        assert_eq!(delta.get("presence").and_then(|v| v.as_bool()), Some(true));
    }

    #[test]
    fn unrecognized_zone_type_falls_back_to_alarm_triple() {
        let delta = decode_status(Some(0xFFFF), 0x0001);
        assert_eq!(delta.get("alarm").and_then(|v| v.as_bool()), Some(true));
        assert_eq!(delta.get("occupancy").and_then(|v| v.as_bool()), Some(true));
        assert_eq!(delta.get("motion").and_then(|v| v.as_bool()), Some(true));
        assert!(delta.get("presence").is_none());
    }

    #[test]
    fn trailing_bytes_are_tolerated() {
        let mut h = IasZoneHandler {
            zone_type: Some(0x000D),
            coordinator_ieee: None,
        };
        // Vendor payload with extended status/zone-id/delay appended.
        let delta = h.cluster_command(1, CMD_STATUS_CHANGE_NOTIFICATION, &[0x01, 0x00, 0x00, 0x12, 0x34, 0x56]);
        assert_eq!(delta.get("occupancy").and_then(|v| v.as_bool()), Some(true));
    }

    #[test]
    fn tamper_and_battery_low_bits_decode() {
        let delta = decode_status(Some(0x000D), bits::TAMPER | bits::BATTERY_LOW);
        assert_eq!(delta.get("tamper").and_then(|v| v.as_bool()), Some(true));
        assert_eq!(delta.get("battery_low").and_then(|v| v.as_bool()), Some(true));
    }
}
