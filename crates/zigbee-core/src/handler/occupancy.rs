//! Occupancy Sensing (0x0406) handler: mirrors what the fast-path decoder
//! does for the same cluster so that normal dispatch, run after a
//! fast-path hit for logging/diagnostics, is idempotent with it.

use super::{ClusterHandler, ConfigureOutcome, DiscoveryConfig};
use crate::cluster::id;
use crate::cluster::occupancy_attrs as attrs;
use crate::state::StateMap;
use async_trait::async_trait;
use radio_proto::{ControllerApplication, ReportConfig};

#[derive(Debug, Default)]
pub struct OccupancySensingHandler;

/// Shared by the handler and the fast-path decoder: bit 0 of the occupancy
/// bitmap is the only bit this data model surfaces.
#[must_use]
pub fn decode_occupancy(raw: u8) -> StateMap {
    let mut out = StateMap::new();
    let occupied = raw & 0x01 != 0;
    out.insert("occupancy".into(), occupied.into());
    out.insert("motion".into(), occupied.into());
    out.insert("presence".into(), occupied.into());
    out
}

#[async_trait]
impl ClusterHandler for OccupancySensingHandler {
    fn cluster_id(&self) -> u16 {
        id::OCCUPANCY_SENSING
    }

    fn attribute_updated(&mut self, attr_id: u16, _data_type: u8, data: &[u8]) -> StateMap {
        if attr_id == attrs::OCCUPANCY {
            if let Some(&raw) = data.first() {
                return decode_occupancy(raw);
            }
        }
        StateMap::new()
    }

    fn report_config(&self) -> Vec<ReportConfig> {
        vec![ReportConfig {
            attr_id: attrs::OCCUPANCY,
            min_interval: 0,
            max_interval: 3600,
            reportable_change: 0,
        }]
    }

    async fn configure(
        &mut self,
        radio: &dyn ControllerApplication,
        ieee: [u8; 8],
        endpoint: u8,
    ) -> (ConfigureOutcome, StateMap) {
        match radio
            .configure_reporting(ieee, endpoint, self.cluster_id(), &self.report_config())
            .await
        {
            Ok(()) => (ConfigureOutcome::Ok, StateMap::new()),
            Err(e) => {
                tracing::warn!("occupancy sensing configure failed: {e}");
                (ConfigureOutcome::Failed, StateMap::new())
            }
        }
    }

    fn poll_attributes(&self) -> Vec<u16> {
        vec![attrs::OCCUPANCY]
    }

    fn discovery_configs(&self, endpoint_id: u8) -> Vec<DiscoveryConfig> {
        vec![DiscoveryConfig {
            component: "binary_sensor".into(),
            object_id: format!("occupancy_{endpoint_id}"),
            config: serde_json::json!({"device_class": "occupancy"}),
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_bit_set_marks_occupied() {
        let delta = decode_occupancy(0x01);
        assert_eq!(delta.get("occupancy").and_then(|v| v.as_bool()), Some(true));
        assert_eq!(delta.get("motion").and_then(|v| v.as_bool()), Some(true));
        assert_eq!(delta.get("presence").and_then(|v| v.as_bool()), Some(true));
    }

    #[test]
    fn zero_clears_occupancy() {
        let delta = decode_occupancy(0x00);
        assert_eq!(delta.get("occupancy").and_then(|v| v.as_bool()), Some(false));
    }

    #[test]
    fn higher_bits_are_ignored() {
        let delta = decode_occupancy(0b1111_1110);
        assert_eq!(delta.get("occupancy").and_then(|v| v.as_bool()), Some(false));
    }
}
