//! Link-quality intake: wraps the radio's packet arrival path to
//! record RSSI/LQI samples and topology edges, and drives the
//! aggressive/baseline reporting-cadence switch used while a device is
//! under active diagnostic attention (e.g. a user watching its live
//! signal in the UI). Purely observational — nothing here may fail or
//! slow the packet path it taps, so every public function swallows and
//! logs its own errors rather than returning a `Result`.

use crate::cluster::{diagnostics_attrs, id};
use crate::device::{DeviceType, ZigbeeDevice};
use crate::engine::DeviceStateEngine;
use dashmap::DashMap;
use radio_proto::{ControllerApplication, Packet, ReportConfig};

/// Default LQI assigned to a route-record edge when the radio did not
/// supply one.
pub const DEFAULT_ROUTE_LQI: u8 = 200;

pub const AGGRESSIVE_MIN_INTERVAL: u16 = 1;
pub const AGGRESSIVE_MAX_INTERVAL: u16 = 5;

/// Linear RSSI/LQI conversion constants: `rssi = -100 + (lqi/255)*70`.
const RSSI_FLOOR: f64 = -100.0;
const RSSI_SPAN: f64 = 70.0;

/// Fill in whichever of `rssi`/`lqi` is missing via the linear
/// approximation. If both or neither are present, returns them unchanged.
#[must_use]
pub fn interpolate(rssi: Option<i8>, lqi: Option<u8>) -> (Option<i8>, Option<u8>) {
    match (rssi, lqi) {
        (Some(r), None) => {
            let derived = ((f64::from(r) + 100.0) * 255.0 / RSSI_SPAN).clamp(0.0, 255.0);
            (Some(r), Some(derived.round() as u8))
        }
        (None, Some(l)) => {
            let derived = RSSI_FLOOR + (f64::from(l) / 255.0) * RSSI_SPAN;
            (Some(derived.round() as i8), Some(l))
        }
        (r, l) => (r, l),
    }
}

/// One recorded link-quality sample, keyed by `(coordinator_ieee,
/// device_ieee)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkSample {
    pub rssi: Option<i8>,
    pub lqi: Option<u8>,
}

/// A topology edge contributed by a neighbor-table response or a route
/// record.
#[derive(Debug, Clone, Copy)]
pub struct RouteEdge {
    pub src: [u8; 8],
    pub dst: [u8; 8],
    pub lqi: u8,
}

/// Fold a route record with `n` relays into `n` edges along `source ->
/// relay1 -> ... -> coordinator`.
#[must_use]
pub fn route_record_edges(source: [u8; 8], relays: &[[u8; 8]], coordinator: [u8; 8], lqi: Option<u8>) -> Vec<RouteEdge> {
    let lqi = lqi.unwrap_or(DEFAULT_ROUTE_LQI);
    let mut path = Vec::with_capacity(relays.len() + 2);
    path.push(source);
    path.extend_from_slice(relays);
    path.push(coordinator);
    path.windows(2)
        .map(|pair| RouteEdge { src: pair[0], dst: pair[1], lqi })
        .collect()
}

/// Fold a neighbor-table response into one edge per reported neighbor.
#[must_use]
pub fn neighbor_table_edges(device: [u8; 8], neighbors: &[([u8; 8], u8)]) -> Vec<RouteEdge> {
    neighbors
        .iter()
        .map(|&(neighbor, lqi)| RouteEdge { src: device, dst: neighbor, lqi })
        .collect()
}

/// Samples keyed by `(coordinator_ieee, device_ieee)`, plus the folded
/// topology edges accumulated from neighbor tables and route records.
#[derive(Default)]
pub struct LinkQualityIntake {
    samples: DashMap<([u8; 8], [u8; 8]), LinkSample>,
    edges: DashMap<([u8; 8], [u8; 8]), u8>,
}

impl LinkQualityIntake {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe a received packet. Never fails: a packet with neither RSSI
    /// nor LQI simply isn't recorded.
    pub fn observe_packet(&self, coordinator_ieee: [u8; 8], packet: &Packet) {
        let (rssi, lqi) = interpolate(packet.rssi, packet.lqi);
        if rssi.is_none() && lqi.is_none() {
            return;
        }
        self.samples
            .insert((coordinator_ieee, packet.src_ieee), LinkSample { rssi, lqi });
    }

    pub fn record_route(&self, edges: &[RouteEdge]) {
        for edge in edges {
            self.edges.insert((edge.src, edge.dst), edge.lqi);
        }
    }

    #[must_use]
    pub fn sample(&self, coordinator_ieee: [u8; 8], device_ieee: [u8; 8]) -> Option<LinkSample> {
        self.samples.get(&(coordinator_ieee, device_ieee)).map(|e| *e.value())
    }

    #[must_use]
    pub fn edge_lqi(&self, src: [u8; 8], dst: [u8; 8]) -> Option<u8> {
        self.edges.get(&(src, dst)).map(|e| *e.value())
    }
}

/// Configure a non-sleepy device for aggressive (1-5 s) reporting.
/// End devices (sleepy) are left alone: pushing reporting config to a
/// device that is usually asleep just wastes the attempt. Tries a
/// telemetry cluster first (Electrical Measurement active power, then
/// Diagnostics last-message LQI), stopping at the first success; falls
/// back to configuring every functional cluster (OnOff, Level, Color) the
/// device exposes. Returns whether any reporting configuration actually
/// went out.
pub async fn configure_aggressive_reporting(
    radio: &dyn ControllerApplication,
    device: &ZigbeeDevice,
) -> bool {
    if device.device_type == DeviceType::EndDevice {
        return false;
    }

    let telemetry_cfg = |attr_id| ReportConfig {
        attr_id,
        min_interval: AGGRESSIVE_MIN_INTERVAL,
        max_interval: AGGRESSIVE_MAX_INTERVAL,
        reportable_change: 1,
    };

    for endpoint in &device.endpoints {
        if endpoint.has_in_cluster(id::ELECTRICAL_MEASUREMENT) {
            let cfg = telemetry_cfg(crate::cluster::electrical_measurement_attrs::ACTIVE_POWER);
            if radio
                .configure_reporting(device.ieee_address, endpoint.id, id::ELECTRICAL_MEASUREMENT, &[cfg])
                .await
                .is_ok()
            {
                return true;
            }
        }
    }
    for endpoint in &device.endpoints {
        if endpoint.has_in_cluster(id::DIAGNOSTICS) {
            let cfg = telemetry_cfg(diagnostics_attrs::LAST_MESSAGE_LQI);
            if radio
                .configure_reporting(device.ieee_address, endpoint.id, id::DIAGNOSTICS, &[cfg])
                .await
                .is_ok()
            {
                return true;
            }
        }
    }

    let functional = [
        (id::ON_OFF, 0x0000u16),
        (id::LEVEL_CONTROL, 0x0000u16),
        (id::COLOR_CONTROL, 0x0007u16),
    ];
    let mut configured_any = false;
    for endpoint in &device.endpoints {
        for &(cluster, attr_id) in &functional {
            if endpoint.has_in_cluster(cluster) {
                let cfg = telemetry_cfg(attr_id);
                match radio
                    .configure_reporting(device.ieee_address, endpoint.id, cluster, &[cfg])
                    .await
                {
                    Ok(()) => configured_any = true,
                    Err(e) => tracing::warn!("aggressive reporting fallback failed: {e}"),
                }
            }
        }
    }
    configured_any
}

/// Restore a device's baseline (30-300 s) reporting intervals. Each
/// handler already knows its own baseline `report_config()`; restoration
/// is simply re-running `configure_device`, which re-applies it.
pub async fn restore_baseline_reporting(engine: &DeviceStateEngine, ieee: [u8; 8]) -> crate::error::Result<()> {
    engine.configure_device(ieee).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolate_derives_lqi_from_rssi() {
        let (rssi, lqi) = interpolate(Some(-65), None);
        assert_eq!(rssi, Some(-65));
        assert!(lqi.is_some());
        let lqi = lqi.unwrap();
        assert!((120..=140).contains(&lqi), "got {lqi}");
    }

    #[test]
    fn interpolate_derives_rssi_from_lqi() {
        let (rssi, lqi) = interpolate(None, Some(255));
        assert_eq!(lqi, Some(255));
        assert_eq!(rssi, Some(-30));
    }

    #[test]
    fn interpolate_leaves_both_present_untouched() {
        let (rssi, lqi) = interpolate(Some(-50), Some(200));
        assert_eq!(rssi, Some(-50));
        assert_eq!(lqi, Some(200));
    }

    #[test]
    fn route_record_folds_relays_into_edges() {
        let source = [1; 8];
        let relay = [2; 8];
        let coordinator = [0; 8];
        let edges = route_record_edges(source, &[relay], coordinator, Some(180));
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].src, source);
        assert_eq!(edges[0].dst, relay);
        assert_eq!(edges[1].dst, coordinator);
        assert!(edges.iter().all(|e| e.lqi == 180));
    }

    #[test]
    fn route_record_defaults_lqi_when_absent() {
        let edges = route_record_edges([1; 8], &[], [0; 8], None);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].lqi, DEFAULT_ROUTE_LQI);
    }

    #[test]
    fn intake_records_and_returns_samples() {
        let intake = LinkQualityIntake::new();
        let coordinator = [0; 8];
        let packet = Packet {
            src_ieee: [3; 8],
            src_nwk: 1,
            src_endpoint: 1,
            dst_endpoint: 1,
            profile_id: 0x0104,
            cluster_id: 0x0000,
            asdu: Vec::new(),
            rssi: Some(-60),
            lqi: None,
        };
        intake.observe_packet(coordinator, &packet);
        let sample = intake.sample(coordinator, [3; 8]).unwrap();
        assert_eq!(sample.rssi, Some(-60));
        assert!(sample.lqi.is_some());
    }

    #[test]
    fn packet_with_no_signal_info_is_not_recorded() {
        let intake = LinkQualityIntake::new();
        let packet = Packet {
            src_ieee: [4; 8],
            src_nwk: 1,
            src_endpoint: 1,
            dst_endpoint: 1,
            profile_id: 0x0104,
            cluster_id: 0x0000,
            asdu: Vec::new(),
            rssi: None,
            lqi: None,
        };
        intake.observe_packet([0; 8], &packet);
        assert!(intake.sample([0; 8], [4; 8]).is_none());
    }
}
