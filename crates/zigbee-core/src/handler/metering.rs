//! Metering (0x0702) handler: a single multiplier/divisor pair applied to
//! `current_summation_delivered` (-> `energy`, kWh) and
//! `instantaneous_demand` (-> `power_demand`).

use super::{ClusterHandler, ConfigureOutcome, DiscoveryConfig};
use crate::cluster::id;
use crate::cluster::metering_attrs as attrs;
use crate::state::{round_measurement, MeasurementKind, StateMap};
use async_trait::async_trait;
use radio_proto::{ControllerApplication, ReportConfig};

#[derive(Debug)]
pub struct MeteringHandler {
    multiplier: f64,
    divisor: f64,
}

impl Default for MeteringHandler {
    fn default() -> Self {
        Self {
            multiplier: 1.0,
            divisor: 1.0,
        }
    }
}

#[async_trait]
impl ClusterHandler for MeteringHandler {
    fn cluster_id(&self) -> u16 {
        id::METERING
    }

    fn attribute_updated(&mut self, attr_id: u16, _data_type: u8, data: &[u8]) -> StateMap {
        let mut out = StateMap::new();
        match attr_id {
            attrs::CURRENT_SUMMATION_DELIVERED if data.len() >= 4 => {
                let mut buf = [0u8; 8];
                buf[..data.len().min(8)].copy_from_slice(&data[..data.len().min(8)]);
                let raw = u64::from_le_bytes(buf) as f64;
                let kwh = round_measurement(
                    MeasurementKind::Energy,
                    raw * self.multiplier / self.divisor,
                );
                out.insert("energy".into(), kwh.into());
            }
            attrs::INSTANTANEOUS_DEMAND if data.len() >= 3 => {
                let mut buf = [0u8; 4];
                buf[..3].copy_from_slice(&data[..3]);
                if data[2] & 0x80 != 0 {
                    buf[3] = 0xFF;
                }
                let raw = i32::from_le_bytes(buf) as f64;
                let demand = round_measurement(
                    MeasurementKind::Power,
                    raw * self.multiplier / self.divisor,
                );
                out.insert("power_demand".into(), demand.into());
            }
            attrs::MULTIPLIER if data.len() >= 4 => {
                self.multiplier = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as f64;
            }
            attrs::DIVISOR if data.len() >= 4 => {
                let raw = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
                self.divisor = if raw == 0 { 1.0 } else { raw as f64 };
            }
            _ => {}
        }
        out
    }

    fn report_config(&self) -> Vec<ReportConfig> {
        vec![
            ReportConfig {
                attr_id: attrs::CURRENT_SUMMATION_DELIVERED,
                min_interval: 60,
                max_interval: 600,
                reportable_change: 1,
            },
            ReportConfig {
                attr_id: attrs::INSTANTANEOUS_DEMAND,
                min_interval: 5,
                max_interval: 300,
                reportable_change: 5,
            },
        ]
    }

    async fn configure(
        &mut self,
        radio: &dyn ControllerApplication,
        ieee: [u8; 8],
        endpoint: u8,
    ) -> (ConfigureOutcome, StateMap) {
        match radio
            .read_attributes(
                ieee,
                endpoint,
                self.cluster_id(),
                &[attrs::MULTIPLIER, attrs::DIVISOR],
            )
            .await
        {
            Ok(results) => {
                for (attr_id, data) in results {
                    self.attribute_updated(attr_id, 0, &data);
                }
            }
            Err(e) => {
                tracing::warn!("metering scaling read failed: {e}");
            }
        }
        if radio
            .configure_reporting(ieee, endpoint, self.cluster_id(), &self.report_config())
            .await
            .is_err()
        {
            return (ConfigureOutcome::Failed, StateMap::new());
        }
        (ConfigureOutcome::Ok, StateMap::new())
    }

    fn poll_attributes(&self) -> Vec<u16> {
        vec![attrs::CURRENT_SUMMATION_DELIVERED, attrs::INSTANTANEOUS_DEMAND]
    }

    fn discovery_configs(&self, endpoint_id: u8) -> Vec<DiscoveryConfig> {
        vec![DiscoveryConfig {
            component: "sensor".into(),
            object_id: format!("energy_{endpoint_id}"),
            config: serde_json::json!({"device_class": "energy", "unit_of_measurement": "kWh"}),
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summation_scales_to_energy() {
        let mut h = MeteringHandler::default();
        h.attribute_updated(attrs::MULTIPLIER, 0x23, &1u32.to_le_bytes());
        h.attribute_updated(attrs::DIVISOR, 0x23, &1000u32.to_le_bytes());
        let delta =
            h.attribute_updated(attrs::CURRENT_SUMMATION_DELIVERED, 0x25, &12345u64.to_le_bytes());
        assert_eq!(delta.get("energy").and_then(|v| v.as_f64()), Some(12.345));
    }

    #[test]
    fn negative_instantaneous_demand_sign_extends() {
        let mut h = MeteringHandler::default();
        let raw: i32 = -50;
        let bytes = raw.to_le_bytes();
        let delta = h.attribute_updated(attrs::INSTANTANEOUS_DEMAND, 0x29, &bytes[..3]);
        assert_eq!(delta.get("power_demand").and_then(|v| v.as_f64()), Some(-50.0));
    }
}
