//! The fast-path frame decoder: a raw-bytes ZCL parser for
//! latency-critical events — occupancy, on/off, IAS zone, Tuya radar —
//! that mutates device state directly instead of going through the
//! debounced engine, so motion-triggered automations see the change
//! within milliseconds instead of inside the 50 ms coalescing window.
//!
//! Invoked on every received packet *before* normal dispatch runs. Normal
//! dispatch still processes the same frame afterwards (for logging and
//! handler bookkeeping such as the IAS zone-type cache); `apply_immediately`
//! merges by value, so a repeat of an already-applied delta produces an
//! empty delta and publishes nothing — the two pipelines compose without
//! double-firing automations.

use crate::cluster::id;
use crate::engine::{expand_keyed, DeviceStateEngine};
use crate::handler::{decode_ias_zone_status, decode_occupancy};
use crate::state::StateMap;
use radio_proto::tuya;
use radio_proto::zcl::{scan_attribute_records, DataType, GlobalCommand, ZclFrame};
use radio_proto::Packet;

const CMD_ZONE_STATUS_CHANGE_NOTIFICATION: u8 = 0x00;

/// Attempt to decode `packet` on the fast path. Returns `true` on a
/// recognised hit (state was mutated and published); `false` means normal
/// dispatch is the only pipeline that will see this packet. Never panics
/// and never returns an error: a malformed frame on a fast-path cluster is
/// simply not a hit, and falls through to the normal pipeline.
pub async fn try_decode(engine: &DeviceStateEngine, packet: &Packet) -> bool {
    // Profile 0x0104 (Home Automation) only.
    if packet.profile_id != 0x0104 {
        return false;
    }
    match packet.cluster_id {
        id::OCCUPANCY_SENSING | id::ON_OFF => report_attributes_hit(engine, packet).await,
        id::IAS_ZONE => ias_zone_hit(engine, packet).await,
        id::TUYA => tuya_hit(engine, packet).await,
        _ => false,
    }
}

async fn report_attributes_hit(engine: &DeviceStateEngine, packet: &Packet) -> bool {
    let Ok(frame) = ZclFrame::parse(&packet.asdu) else {
        return false;
    };
    if frame.command_id != GlobalCommand::ReportAttributes as u8 {
        return false;
    }

    let mut partial = StateMap::new();
    for record in scan_attribute_records(&frame.payload) {
        if record.attr_id != 0x0000 {
            continue;
        }
        let is_bool_like =
            record.data_type == DataType::Boolean as u8 || record.data_type == DataType::Bitmap8 as u8;
        if !is_bool_like {
            continue;
        }
        let Some(&raw) = record.data.first() else {
            continue;
        };
        if packet.cluster_id == id::OCCUPANCY_SENSING {
            partial.extend(decode_occupancy(raw));
        } else {
            let on = raw & 0x01 != 0;
            partial.insert("state_on".into(), on.into());
            partial.insert("on".into(), on.into());
        }
    }
    if partial.is_empty() {
        return false;
    }

    let keyed = expand_keyed(&partial, packet.dst_endpoint);
    engine.apply_immediately(packet.src_ieee, keyed).await;
    true
}

async fn ias_zone_hit(engine: &DeviceStateEngine, packet: &Packet) -> bool {
    let Ok(frame) = ZclFrame::parse(&packet.asdu) else {
        return false;
    };
    if !frame.is_cluster_specific() || frame.command_id != CMD_ZONE_STATUS_CHANGE_NOTIFICATION {
        return false;
    }
    if frame.payload.len() < 2 {
        return false;
    }
    let status = u16::from_le_bytes([frame.payload[0], frame.payload[1]]);

    // The fast path has no handler instance to consult for the cached zone
    // type, so it reads it back out of the device's own state (see
    // `IasZoneHandler::attribute_updated`, which stashes it there for
    // exactly this purpose).
    let zone_type = engine
        .device(packet.src_ieee)
        .and_then(|d| d.state.get("zone_type_code").cloned())
        .and_then(|v| v.as_f64())
        .map(|f| f as u16);

    let decoded = decode_ias_zone_status(zone_type, status);
    let keyed = expand_keyed(&decoded, packet.dst_endpoint);
    engine.apply_immediately(packet.src_ieee, keyed).await;
    true
}

async fn tuya_hit(engine: &DeviceStateEngine, packet: &Packet) -> bool {
    let Ok(frame) = ZclFrame::parse(&packet.asdu) else {
        return false;
    };
    if !tuya::command_carries_dps(frame.command_id) {
        return false;
    }
    let dps = tuya::parse_body(&frame.payload);
    let mut partial = StateMap::new();
    for dp in &dps {
        if let Some(presence) = tuya::presence_from_dp(dp) {
            partial.insert("presence".into(), presence.into());
        }
    }
    if partial.is_empty() {
        return false;
    }

    let keyed = expand_keyed(&partial, packet.dst_endpoint);
    engine.apply_immediately(packet.src_ieee, keyed).await;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Endpoint, ZigbeeDevice};
    use crate::handler::HandlerRegistry;
    use crate::mqtt::NullPublisher;
    use crate::engine::NullAutomationSink;
    use async_trait::async_trait;
    use radio_proto::{ControllerApplication, EnergyScanResult, NodeInfo, ProtocolError, ReportConfig};
    use std::path::PathBuf;
    use std::sync::Arc;

    struct FakeRadio;

    #[async_trait]
    impl ControllerApplication for FakeRadio {
        fn node_info(&self) -> NodeInfo {
            NodeInfo { ieee: [0; 8], nwk: 0, channel: 11 }
        }
        async fn read_attributes(
            &self,
            _ieee: [u8; 8],
            _endpoint: u8,
            _cluster: u16,
            _attrs: &[u16],
        ) -> Result<Vec<(u16, Vec<u8>)>, ProtocolError> {
            Ok(Vec::new())
        }
        async fn write_attributes(
            &self,
            _ieee: [u8; 8],
            _endpoint: u8,
            _cluster: u16,
            _attrs: &[(u16, u8, Vec<u8>)],
        ) -> Result<(), ProtocolError> {
            Ok(())
        }
        async fn configure_reporting(
            &self,
            _ieee: [u8; 8],
            _endpoint: u8,
            _cluster: u16,
            _configs: &[ReportConfig],
        ) -> Result<(), ProtocolError> {
            Ok(())
        }
        async fn bind(&self, _ieee: [u8; 8], _endpoint: u8, _cluster: u16) -> Result<(), ProtocolError> {
            Ok(())
        }
        async fn send_command(
            &self,
            _ieee: [u8; 8],
            _endpoint: u8,
            _cluster: u16,
            _command_id: u8,
            _payload: &[u8],
        ) -> Result<(), ProtocolError> {
            Ok(())
        }
        async fn energy_scan(&self, _channels: &[u8]) -> Result<Vec<EnergyScanResult>, ProtocolError> {
            Ok(Vec::new())
        }
        async fn add_to_group(&self, _group_id: u16, _name: Option<&str>) -> Result<(), ProtocolError> {
            Ok(())
        }
        async fn get_group_identifiers(
            &self,
            _ieee: [u8; 8],
            _endpoint: u8,
        ) -> Result<Vec<u16>, ProtocolError> {
            Ok(Vec::new())
        }
    }

    fn test_engine(path: &str) -> DeviceStateEngine {
        DeviceStateEngine::new(
            Arc::new(HandlerRegistry::with_defaults()),
            Arc::new(FakeRadio),
            Arc::new(NullPublisher),
            Arc::new(NullAutomationSink),
            PathBuf::from(path),
        )
    }

    fn occupancy_device(ieee: [u8; 8]) -> ZigbeeDevice {
        let mut device = ZigbeeDevice::new(ieee, 0x1234);
        device.endpoints.push(Endpoint {
            id: 1,
            profile_id: 0x0104,
            device_id: 0,
            in_clusters: vec![id::OCCUPANCY_SENSING],
            out_clusters: vec![],
        });
        device
    }

    fn occupancy_packet(src_ieee: [u8; 8], asdu: Vec<u8>) -> Packet {
        Packet {
            src_ieee,
            src_nwk: 0x1234,
            src_endpoint: 1,
            dst_endpoint: 1,
            profile_id: 0x0104,
            cluster_id: id::OCCUPANCY_SENSING,
            asdu,
            rssi: None,
            lqi: None,
        }
    }

    #[tokio::test]
    async fn occupancy_report_sets_three_aliases() {
        let engine = test_engine("/tmp/zigbee-core-fast-path-test-1.json");
        let ieee = [7; 8];
        engine.register_device(occupancy_device(ieee));

        // Frame control 0x18 (global, server-to-client), tsn 0x01, command
        // 0x0A (ReportAttributes), attr 0x0000 bitmap8 value 0x01.
        let asdu = vec![0x18, 0x01, 0x0A, 0x00, 0x00, 0x18, 0x01];
        let packet = occupancy_packet(ieee, asdu);
        assert!(try_decode(&engine, &packet).await);

        let device = engine.device(ieee).unwrap();
        assert_eq!(device.state.get("occupancy").and_then(|v| v.as_bool()), Some(true));
        assert_eq!(device.state.get("motion").and_then(|v| v.as_bool()), Some(true));
        assert_eq!(device.state.get("presence").and_then(|v| v.as_bool()), Some(true));
        assert!(device.last_seen.is_some());
    }

    #[tokio::test]
    async fn subsequent_zero_frame_clears_occupancy() {
        let engine = test_engine("/tmp/zigbee-core-fast-path-test-2.json");
        let ieee = [8; 8];
        engine.register_device(occupancy_device(ieee));

        let set_asdu = vec![0x18, 0x01, 0x0A, 0x00, 0x00, 0x18, 0x01];
        try_decode(&engine, &occupancy_packet(ieee, set_asdu)).await;

        let clear_asdu = vec![0x18, 0x02, 0x0A, 0x00, 0x00, 0x18, 0x00];
        assert!(try_decode(&engine, &occupancy_packet(ieee, clear_asdu)).await);

        let device = engine.device(ieee).unwrap();
        assert_eq!(device.state.get("occupancy").and_then(|v| v.as_bool()), Some(false));
    }

    #[tokio::test]
    async fn non_home_automation_profile_is_not_a_hit() {
        let engine = test_engine("/tmp/zigbee-core-fast-path-test-3.json");
        let ieee = [9; 8];
        engine.register_device(occupancy_device(ieee));

        let mut packet = occupancy_packet(ieee, vec![0x18, 0x01, 0x0A, 0x00, 0x00, 0x18, 0x01]);
        packet.profile_id = 0xC05E;
        assert!(!try_decode(&engine, &packet).await);
    }

    #[tokio::test]
    async fn ias_zone_contact_switch_opens_on_fast_path() {
        let engine = test_engine("/tmp/zigbee-core-fast-path-test-4.json");
        let ieee = [10; 8];
        let mut device = occupancy_device(ieee);
        device.endpoints[0].in_clusters = vec![id::IAS_ZONE];
        device.state.insert("zone_type_code".into(), 0x0015i64.into());
        engine.register_device(device);

        // Cluster-specific frame control (0x01), tsn 1, command 0x00,
        // status 0x0001 (alarm1 set -> contact switch "open").
        let asdu = vec![0x01, 0x01, 0x00, 0x01, 0x00];
        let packet = Packet {
            cluster_id: id::IAS_ZONE,
            ..occupancy_packet(ieee, asdu)
        };
        assert!(try_decode(&engine, &packet).await);

        let device = engine.device(ieee).unwrap();
        assert_eq!(device.state.get("contact").and_then(|v| v.as_bool()), Some(false));
        assert_eq!(device.state.get("is_open").and_then(|v| v.as_bool()), Some(true));
    }

    #[tokio::test]
    async fn tuya_dp104_bool_maps_to_presence() {
        let engine = test_engine("/tmp/zigbee-core-fast-path-test-5.json");
        let ieee = [11; 8];
        let mut device = occupancy_device(ieee);
        device.endpoints[0].in_clusters = vec![id::TUYA];
        engine.register_device(device);

        // ZCL header (global, tsn 1, command 0x01 data-report), then
        // status:1, transaction:2, DP(104, bool, len=1, value=1).
        let asdu = vec![0x00, 0x01, 0x01, 0x00, 0x00, 0x00, 104, 0x01, 0x00, 0x01, 0x01];
        let packet = Packet {
            cluster_id: id::TUYA,
            ..occupancy_packet(ieee, asdu)
        };
        assert!(try_decode(&engine, &packet).await);

        let device = engine.device(ieee).unwrap();
        assert_eq!(device.state.get("presence").and_then(|v| v.as_bool()), Some(true));
    }

    #[tokio::test]
    async fn unrecognised_cluster_is_not_a_hit() {
        let engine = test_engine("/tmp/zigbee-core-fast-path-test-6.json");
        let ieee = [12; 8];
        engine.register_device(occupancy_device(ieee));
        let packet = Packet {
            cluster_id: id::BASIC,
            ..occupancy_packet(ieee, vec![0x18, 0x01, 0x0A])
        };
        assert!(!try_decode(&engine, &packet).await);
    }
}
