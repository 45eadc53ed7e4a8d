//! Basic (0x0000) cluster handler: manufacturer/model/version/power-source
//! metadata. No reporting; these attributes are read once on configure.

use super::{ClusterHandler, ConfigureOutcome, DiscoveryConfig};
use crate::cluster::basic_attrs;
use crate::device::PowerSource;
use crate::state::StateMap;
use async_trait::async_trait;
use radio_proto::ControllerApplication;

#[derive(Debug, Default)]
pub struct BasicHandler;

fn decode_string(data: &[u8]) -> String {
    String::from_utf8_lossy(data).trim_end_matches('\0').to_string()
}

#[async_trait]
impl ClusterHandler for BasicHandler {
    fn cluster_id(&self) -> u16 {
        crate::cluster::id::BASIC
    }

    fn attribute_updated(&mut self, attr_id: u16, _data_type: u8, data: &[u8]) -> StateMap {
        let mut out = StateMap::new();
        match attr_id {
            basic_attrs::MANUFACTURER_NAME => {
                out.insert("manufacturer".into(), decode_string(data).into());
            }
            basic_attrs::MODEL_IDENTIFIER => {
                out.insert("model".into(), decode_string(data).into());
            }
            basic_attrs::SW_BUILD_ID => {
                out.insert("sw_version".into(), decode_string(data).into());
            }
            basic_attrs::POWER_SOURCE => {
                if let Some(&raw) = data.first() {
                    let source = PowerSource::from_zcl(raw);
                    out.insert(
                        "power_source".into(),
                        format!("{source:?}").to_lowercase().into(),
                    );
                }
            }
            _ => {}
        }
        out
    }

    async fn configure(
        &mut self,
        radio: &dyn ControllerApplication,
        ieee: [u8; 8],
        endpoint: u8,
    ) -> (ConfigureOutcome, StateMap) {
        let attrs = [
            basic_attrs::MANUFACTURER_NAME,
            basic_attrs::MODEL_IDENTIFIER,
            basic_attrs::SW_BUILD_ID,
            basic_attrs::POWER_SOURCE,
        ];
        match radio
            .read_attributes(ieee, endpoint, self.cluster_id(), &attrs)
            .await
        {
            Ok(results) => {
                let mut metadata = StateMap::new();
                for (attr_id, data) in results {
                    metadata.extend(self.attribute_updated(attr_id, 0, &data));
                }
                (ConfigureOutcome::Ok, metadata)
            }
            Err(e) => {
                tracing::warn!("basic cluster configure read failed: {e}");
                (ConfigureOutcome::Failed, StateMap::new())
            }
        }
    }

    fn poll_attributes(&self) -> Vec<u16> {
        vec![basic_attrs::POWER_SOURCE]
    }

    fn discovery_configs(&self, _endpoint_id: u8) -> Vec<DiscoveryConfig> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manufacturer_name_decodes_and_trims() {
        let mut h = BasicHandler;
        let delta = h.attribute_updated(
            basic_attrs::MANUFACTURER_NAME,
            0x42,
            b"Acme Corp\0\0",
        );
        assert_eq!(delta.get("manufacturer").and_then(|v| v.as_str()), Some("Acme Corp"));
    }

    #[test]
    fn power_source_maps_battery() {
        let mut h = BasicHandler;
        let delta = h.attribute_updated(basic_attrs::POWER_SOURCE, 0x30, &[0x03]);
        assert_eq!(
            delta.get("power_source").and_then(|v| v.as_str()),
            Some("battery")
        );
    }
}
