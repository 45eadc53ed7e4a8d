//! Window Covering (0x0102) handler: inverts lift percentage at the wire
//! boundary (wire 0=open/100=closed, normalised 100=open/0=closed).

use super::{ClusterHandler, ConfigureOutcome, DiscoveryConfig};
use crate::cluster::window_covering_attrs as attrs;
use crate::cluster::{covering_type_name, id, WindowCoveringCommand};
use crate::state::StateMap;
use async_trait::async_trait;
use radio_proto::{ControllerApplication, ReportConfig};

#[derive(Debug, Default)]
pub struct WindowCoveringHandler {
    covering_type: Option<u8>,
}

#[async_trait]
impl ClusterHandler for WindowCoveringHandler {
    fn cluster_id(&self) -> u16 {
        id::WINDOW_COVERING
    }

    fn attribute_updated(&mut self, attr_id: u16, _data_type: u8, data: &[u8]) -> StateMap {
        let mut out = StateMap::new();
        match attr_id {
            attrs::COVERING_TYPE => {
                if let Some(&raw) = data.first() {
                    self.covering_type = Some(raw);
                    out.insert(
                        "covering_type".into(),
                        covering_type_name(raw).to_string().into(),
                    );
                }
            }
            attrs::CURRENT_POSITION_LIFT_PERCENTAGE => {
                if let Some(&raw) = data.first() {
                    let raw = raw.min(100);
                    let position = 100 - raw;
                    out.insert("position".into(), (position as i64).into());
                    out.insert("is_closed".into(), (raw == 100).into());
                    out.insert("is_open".into(), (raw == 0).into());
                }
            }
            attrs::CURRENT_POSITION_TILT_PERCENTAGE => {
                if let Some(&raw) = data.first() {
                    out.insert("tilt".into(), (raw as i64).into());
                }
            }
            _ => {}
        }
        out
    }

    fn report_config(&self) -> Vec<ReportConfig> {
        vec![ReportConfig {
            attr_id: attrs::CURRENT_POSITION_LIFT_PERCENTAGE,
            min_interval: 1,
            max_interval: 3600,
            reportable_change: 1,
        }]
    }

    async fn configure(
        &mut self,
        radio: &dyn ControllerApplication,
        ieee: [u8; 8],
        endpoint: u8,
    ) -> (ConfigureOutcome, StateMap) {
        if radio
            .configure_reporting(ieee, endpoint, self.cluster_id(), &self.report_config())
            .await
            .is_err()
        {
            return (ConfigureOutcome::Failed, StateMap::new());
        }
        let mut metadata = StateMap::new();
        if let Ok(results) = radio
            .read_attributes(ieee, endpoint, self.cluster_id(), &[attrs::COVERING_TYPE])
            .await
        {
            if let Some((_, data)) = results.into_iter().next() {
                metadata.extend(self.attribute_updated(attrs::COVERING_TYPE, 0, &data));
            }
        }
        (ConfigureOutcome::Ok, metadata)
    }

    fn poll_attributes(&self) -> Vec<u16> {
        vec![
            attrs::CURRENT_POSITION_LIFT_PERCENTAGE,
            attrs::CURRENT_POSITION_TILT_PERCENTAGE,
        ]
    }

    fn discovery_configs(&self, endpoint_id: u8) -> Vec<DiscoveryConfig> {
        vec![DiscoveryConfig {
            component: "cover".into(),
            object_id: format!("cover_{endpoint_id}"),
            config: serde_json::json!({"device_class": "blind"}),
        }]
    }
}

impl WindowCoveringHandler {
    /// Translate a normalised `set_position(p)` command into the wire
    /// command: `go_to_lift_percentage(100 - p)`.
    #[must_use]
    pub fn set_position(&self, normalized_position: u8) -> WindowCoveringCommand {
        let wire_value = 100 - normalized_position.min(100);
        WindowCoveringCommand::GoToLiftPercentage(wire_value)
    }

    #[must_use]
    pub fn set_tilt(&self, tilt: u8) -> WindowCoveringCommand {
        WindowCoveringCommand::GoToTiltPercentage(tilt)
    }

    #[must_use]
    pub fn open(&self) -> WindowCoveringCommand {
        WindowCoveringCommand::UpOpen
    }

    #[must_use]
    pub fn close(&self) -> WindowCoveringCommand {
        WindowCoveringCommand::DownClose
    }

    #[must_use]
    pub fn stop(&self) -> WindowCoveringCommand {
        WindowCoveringCommand::Stop
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_report_inverts_to_normalized_position() {
        let mut h = WindowCoveringHandler::default();
        let delta = h.attribute_updated(attrs::CURRENT_POSITION_LIFT_PERCENTAGE, 0x20, &[70]);
        assert_eq!(delta.get("position").and_then(|v| v.as_f64()), Some(30.0));
        assert_eq!(delta.get("is_open").and_then(|v| v.as_bool()), Some(false));
        assert_eq!(delta.get("is_closed").and_then(|v| v.as_bool()), Some(false));
    }

    #[test]
    fn set_position_inverts_to_wire_value() {
        let h = WindowCoveringHandler::default();
        match h.set_position(30) {
            WindowCoveringCommand::GoToLiftPercentage(wire) => assert_eq!(wire, 70),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn fully_closed_and_fully_open_booleans() {
        let mut h = WindowCoveringHandler::default();
        let closed = h.attribute_updated(attrs::CURRENT_POSITION_LIFT_PERCENTAGE, 0x20, &[100]);
        assert_eq!(closed.get("is_closed").and_then(|v| v.as_bool()), Some(true));
        assert_eq!(closed.get("position").and_then(|v| v.as_f64()), Some(0.0));

        let mut h2 = WindowCoveringHandler::default();
        let open = h2.attribute_updated(attrs::CURRENT_POSITION_LIFT_PERCENTAGE, 0x20, &[0]);
        assert_eq!(open.get("is_open").and_then(|v| v.as_bool()), Some(true));
        assert_eq!(open.get("position").and_then(|v| v.as_f64()), Some(100.0));
    }

    #[test]
    fn tilt_passes_through_unmodified() {
        let mut h = WindowCoveringHandler::default();
        let delta = h.attribute_updated(attrs::CURRENT_POSITION_TILT_PERCENTAGE, 0x20, &[45]);
        assert_eq!(delta.get("tilt").and_then(|v| v.as_f64()), Some(45.0));
    }
}
