//! Identify (0x0003) cluster handler: a pure command sink, no attribute
//! reporting and nothing to configure.

use super::ClusterHandler;
use crate::state::StateMap;
use async_trait::async_trait;

#[derive(Debug, Default)]
pub struct IdentifyHandler;

#[async_trait]
impl ClusterHandler for IdentifyHandler {
    fn cluster_id(&self) -> u16 {
        crate::cluster::id::IDENTIFY
    }

    fn attribute_updated(&mut self, _attr_id: u16, _data_type: u8, _data: &[u8]) -> StateMap {
        StateMap::new()
    }
}
