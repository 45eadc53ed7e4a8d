//! Electrical Measurement (0x0B04) handler: reads the six scaling
//! attributes on configure and applies `scaled = raw * mult / div`, with
//! an independent multiplier/divisor pair per quantity and distinct
//! attribute IDs for voltage, current, and power.

use super::{ClusterHandler, ConfigureOutcome, DiscoveryConfig};
use crate::cluster::electrical_measurement_attrs as attrs;
use crate::cluster::id;
use crate::state::{round_measurement, MeasurementKind, StateMap};
use async_trait::async_trait;
use radio_proto::{ControllerApplication, ReportConfig};

#[derive(Debug, Clone, Copy)]
struct Scale {
    mult: f64,
    div: f64,
}

impl Default for Scale {
    fn default() -> Self {
        Self { mult: 1.0, div: 1.0 }
    }
}

impl Scale {
    fn apply(self, raw: i64) -> f64 {
        raw as f64 * self.mult / self.div
    }
}

#[derive(Debug, Default)]
pub struct ElectricalMeasurementHandler {
    voltage: Scale,
    current: Scale,
    power: Scale,
}

#[async_trait]
impl ClusterHandler for ElectricalMeasurementHandler {
    fn cluster_id(&self) -> u16 {
        id::ELECTRICAL_MEASUREMENT
    }

    fn attribute_updated(&mut self, attr_id: u16, _data_type: u8, data: &[u8]) -> StateMap {
        let mut out = StateMap::new();
        match attr_id {
            attrs::RMS_VOLTAGE if data.len() >= 2 => {
                let raw = i64::from(u16::from_le_bytes([data[0], data[1]]));
                let value = round_measurement(MeasurementKind::Voltage, self.voltage.apply(raw));
                out.insert("voltage".into(), value.into());
            }
            attrs::RMS_CURRENT if data.len() >= 2 => {
                let raw = i64::from(u16::from_le_bytes([data[0], data[1]]));
                let value = round_measurement(MeasurementKind::Current, self.current.apply(raw));
                out.insert("current".into(), value.into());
            }
            attrs::ACTIVE_POWER if data.len() >= 2 => {
                let raw = i64::from(i16::from_le_bytes([data[0], data[1]]));
                let value = round_measurement(MeasurementKind::Power, self.power.apply(raw));
                out.insert("power".into(), value.into());
            }
            attrs::AC_VOLTAGE_MULTIPLIER if data.len() >= 2 => {
                self.voltage.mult = u16::from_le_bytes([data[0], data[1]]) as f64;
            }
            attrs::AC_VOLTAGE_DIVISOR if data.len() >= 2 => {
                let raw = u16::from_le_bytes([data[0], data[1]]);
                self.voltage.div = if raw == 0 { 1.0 } else { raw as f64 };
            }
            attrs::AC_CURRENT_MULTIPLIER if data.len() >= 2 => {
                self.current.mult = u16::from_le_bytes([data[0], data[1]]) as f64;
            }
            attrs::AC_CURRENT_DIVISOR if data.len() >= 2 => {
                let raw = u16::from_le_bytes([data[0], data[1]]);
                self.current.div = if raw == 0 { 1.0 } else { raw as f64 };
            }
            attrs::AC_POWER_MULTIPLIER if data.len() >= 2 => {
                self.power.mult = u16::from_le_bytes([data[0], data[1]]) as f64;
            }
            attrs::AC_POWER_DIVISOR if data.len() >= 2 => {
                let raw = u16::from_le_bytes([data[0], data[1]]);
                self.power.div = if raw == 0 { 1.0 } else { raw as f64 };
            }
            _ => {}
        }
        out
    }

    fn report_config(&self) -> Vec<ReportConfig> {
        vec![
            ReportConfig {
                attr_id: attrs::ACTIVE_POWER,
                min_interval: 5,
                max_interval: 300,
                reportable_change: 5,
            },
            ReportConfig {
                attr_id: attrs::RMS_VOLTAGE,
                min_interval: 30,
                max_interval: 600,
                reportable_change: 1,
            },
        ]
    }

    async fn configure(
        &mut self,
        radio: &dyn ControllerApplication,
        ieee: [u8; 8],
        endpoint: u8,
    ) -> (ConfigureOutcome, StateMap) {
        let scaling_attrs = [
            attrs::AC_VOLTAGE_MULTIPLIER,
            attrs::AC_VOLTAGE_DIVISOR,
            attrs::AC_CURRENT_MULTIPLIER,
            attrs::AC_CURRENT_DIVISOR,
            attrs::AC_POWER_MULTIPLIER,
            attrs::AC_POWER_DIVISOR,
        ];
        // If the scaling read fails, multipliers/divisors stay at their
        // Scale::default() of (1, 1). The scaling attributes never
        // produce a state delta of their own (they only mutate `self`).
        match radio
            .read_attributes(ieee, endpoint, self.cluster_id(), &scaling_attrs)
            .await
        {
            Ok(results) => {
                for (attr_id, data) in results {
                    self.attribute_updated(attr_id, 0, &data);
                }
            }
            Err(e) => {
                tracing::warn!("electrical measurement scaling read failed: {e}");
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
        vec![attrs::ACTIVE_POWER, attrs::RMS_VOLTAGE, attrs::RMS_CURRENT]
    }

    fn discovery_configs(&self, endpoint_id: u8) -> Vec<DiscoveryConfig> {
        vec![DiscoveryConfig {
            component: "sensor".into(),
            object_id: format!("power_{endpoint_id}"),
            config: serde_json::json!({"device_class": "power", "unit_of_measurement": "W"}),
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voltage_scaling_applies_multiplier_and_divisor() {
        let mut h = ElectricalMeasurementHandler::default();
        h.attribute_updated(attrs::AC_VOLTAGE_MULTIPLIER, 0x21, &1u16.to_le_bytes());
        h.attribute_updated(attrs::AC_VOLTAGE_DIVISOR, 0x21, &10u16.to_le_bytes());
        let delta = h.attribute_updated(attrs::RMS_VOLTAGE, 0x21, &2305u16.to_le_bytes());
        assert_eq!(delta.get("voltage").and_then(|v| v.as_f64()), Some(230.5));
    }

    #[test]
    fn power_scaling_applies_multiplier_and_divisor() {
        let mut h = ElectricalMeasurementHandler::default();
        h.attribute_updated(attrs::AC_POWER_MULTIPLIER, 0x21, &1u16.to_le_bytes());
        h.attribute_updated(attrs::AC_POWER_DIVISOR, 0x21, &10u16.to_le_bytes());
        let delta = h.attribute_updated(attrs::ACTIVE_POWER, 0x29, &2345i16.to_le_bytes());
        assert_eq!(delta.get("power").and_then(|v| v.as_f64()), Some(234.5));
    }

    #[test]
    fn missing_scaling_read_defaults_to_identity() {
        let mut h = ElectricalMeasurementHandler::default();
        let delta = h.attribute_updated(attrs::ACTIVE_POWER, 0x29, &2345i16.to_le_bytes());
        assert_eq!(delta.get("power").and_then(|v| v.as_f64()), Some(2345.0));
    }

    #[test]
    fn zero_divisor_from_wire_falls_back_to_one() {
        let mut h = ElectricalMeasurementHandler::default();
        h.attribute_updated(attrs::AC_POWER_DIVISOR, 0x21, &0u16.to_le_bytes());
        let delta = h.attribute_updated(attrs::ACTIVE_POWER, 0x29, &100i16.to_le_bytes());
        assert_eq!(delta.get("power").and_then(|v| v.as_f64()), Some(100.0));
    }
}
