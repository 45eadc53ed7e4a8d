//! Generic passthrough handler for unregistered clusters: records raw
//! attribute IDs for diagnostics instead of translating them, so an
//! unrecognised cluster does not silently vanish from the device's state.

use super::ClusterHandler;
use crate::state::StateMap;
use async_trait::async_trait;

#[derive(Debug)]
pub struct PassthroughHandler {
    cluster_id: u16,
}

impl PassthroughHandler {
    #[must_use]
    pub fn new(cluster_id: u16) -> Self {
        Self { cluster_id }
    }
}

#[async_trait]
impl ClusterHandler for PassthroughHandler {
    fn cluster_id(&self) -> u16 {
        self.cluster_id
    }

    fn attribute_updated(&mut self, attr_id: u16, _data_type: u8, _data: &[u8]) -> StateMap {
        let mut out = StateMap::new();
        out.insert(
            format!("raw_0x{:04x}_0x{:04x}", self.cluster_id, attr_id),
            true.into(),
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_cluster_records_raw_attribute_marker() {
        let mut h = PassthroughHandler::new(0xFC00);
        let delta = h.attribute_updated(0x0001, 0x20, &[1]);
        assert!(delta.contains_key("raw_0xfc00_0x0001"));
    }
}
