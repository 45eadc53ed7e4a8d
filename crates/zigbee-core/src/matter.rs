//! Matter device adapter (optional). Mirrors nodes from an
//! external Matter fabric into the same IEEE-keyed device registry and
//! state shape used for Zigbee devices, so automations and MQTT
//! publication stay agnostic to transport origin. A gateway with no
//! Matter fabric configured simply never constructs a `MatterAdapter`;
//! nothing elsewhere in the crate depends on this module.

use crate::device::{DeviceCategory, DeviceType, ZigbeeDevice};
use crate::engine::DeviceStateEngine;
use crate::error::{CommandOutcome, Result};
use crate::state::{StateMap, StateValue};
use async_trait::async_trait;

/// The external Matter-fabric client this adapter is fed by. Out of
/// scope for this crate: a real implementation talks to a Matter
/// controller process or library over its own transport.
#[async_trait]
pub trait MatterFabric: Send + Sync {
    fn node_ids(&self) -> Vec<u64>;

    async fn read_state(&self, node_id: u64) -> Result<StateMap>;

    async fn send_command(&self, node_id: u64, command: &str, value: Option<&StateValue>) -> CommandOutcome;
}

/// A Matter node ID has no natural 8-byte form; zero-extend it into the
/// high bytes so it still sorts and prints like a real IEEE address
/// while staying disjoint from genuine 64-bit Zigbee EUIs in the common
/// case (a collision is only possible if a live Zigbee EUI happens to
/// equal a Matter node ID zero-extended this way, which the data model
/// does not attempt to prevent).
#[must_use]
pub fn pseudo_ieee(node_id: u64) -> [u8; 8] {
    node_id.to_be_bytes()
}

/// Recover the originating Matter node ID from a pseudo-IEEE key.
#[must_use]
pub fn node_id_from_pseudo_ieee(ieee: [u8; 8]) -> u64 {
    u64::from_be_bytes(ieee)
}

/// Mirrors Matter nodes into the shared device registry and routes their
/// commands directly to the fabric client, bypassing cluster-handler
/// dispatch entirely.
pub struct MatterAdapter {
    fabric: Box<dyn MatterFabric>,
    engine: DeviceStateEngine,
}

impl MatterAdapter {
    #[must_use]
    pub fn new(fabric: Box<dyn MatterFabric>, engine: DeviceStateEngine) -> Self {
        Self { fabric, engine }
    }

    /// Whether this pseudo-IEEE key is currently backed by a known
    /// Matter node, as opposed to a genuine Zigbee device.
    #[must_use]
    pub fn owns(&self, ieee: [u8; 8]) -> bool {
        self.fabric.node_ids().contains(&node_id_from_pseudo_ieee(ieee))
    }

    /// Register (or refresh the registration of) every node the fabric
    /// currently reports, without touching its state map.
    pub fn sync_registry(&self) {
        for node_id in self.fabric.node_ids() {
            let ieee = pseudo_ieee(node_id);
            if self.engine.device(ieee).is_some() {
                continue;
            }
            let mut device = ZigbeeDevice::new(ieee, 0);
            device.device_type = DeviceType::Router;
            device.category = DeviceCategory::Other;
            device.friendly_name = Some(format!("matter-{node_id:016x}"));
            self.engine.register_device(device);
        }
    }

    /// Pull a node's current state and fold it into the registry via the
    /// fast path: Matter attribute reports have no debounce window of
    /// their own, so treating every update as already-coalesced is
    /// consistent with how the fabric client itself batches reads.
    pub async fn poll_node(&self, node_id: u64) -> Result<()> {
        let state = self.fabric.read_state(node_id).await?;
        self.engine.apply_immediately(pseudo_ieee(node_id), state).await;
        Ok(())
    }

    /// Route a command for a Matter-origin device straight to the fabric
    /// client, short-circuiting the Zigbee cluster-handler dispatch in
    /// `DeviceStateEngine::send_command`.
    pub async fn send_command(&self, ieee: [u8; 8], command: &str, value: Option<&StateValue>) -> CommandOutcome {
        let node_id = node_id_from_pseudo_ieee(ieee);
        let outcome = self.fabric.send_command(node_id, command, value).await;
        if outcome.success {
            self.engine.note_command_success(ieee);
        } else {
            self.engine.note_command_failure(ieee);
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::NullAutomationSink;
    use crate::handler::HandlerRegistry;
    use crate::mqtt::NullPublisher;
    use async_trait::async_trait;
    use radio_proto::{ControllerApplication, EnergyScanResult, NodeInfo, ProtocolError, ReportConfig};
    use std::path::PathBuf;
    use std::sync::Arc;

    struct FakeFabric {
        nodes: Vec<u64>,
    }

    #[derive(Default)]
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
        ) -> std::result::Result<Vec<(u16, Vec<u8>)>, ProtocolError> {
            Ok(Vec::new())
        }

        async fn write_attributes(
            &self,
            _ieee: [u8; 8],
            _endpoint: u8,
            _cluster: u16,
            _attrs: &[(u16, u8, Vec<u8>)],
        ) -> std::result::Result<(), ProtocolError> {
            Ok(())
        }

        async fn configure_reporting(
            &self,
            _ieee: [u8; 8],
            _endpoint: u8,
            _cluster: u16,
            _configs: &[ReportConfig],
        ) -> std::result::Result<(), ProtocolError> {
            Ok(())
        }

        async fn bind(&self, _ieee: [u8; 8], _endpoint: u8, _cluster: u16) -> std::result::Result<(), ProtocolError> {
            Ok(())
        }

        async fn send_command(
            &self,
            _ieee: [u8; 8],
            _endpoint: u8,
            _cluster: u16,
            _command_id: u8,
            _payload: &[u8],
        ) -> std::result::Result<(), ProtocolError> {
            Ok(())
        }

        async fn energy_scan(&self, _channels: &[u8]) -> std::result::Result<Vec<EnergyScanResult>, ProtocolError> {
            Ok(Vec::new())
        }

        async fn add_to_group(&self, _group_id: u16, _name: Option<&str>) -> std::result::Result<(), ProtocolError> {
            Ok(())
        }

        async fn get_group_identifiers(
            &self,
            _ieee: [u8; 8],
            _endpoint: u8,
        ) -> std::result::Result<Vec<u16>, ProtocolError> {
            Ok(Vec::new())
        }
    }

    #[async_trait]
    impl MatterFabric for FakeFabric {
        fn node_ids(&self) -> Vec<u64> {
            self.nodes.clone()
        }

        async fn read_state(&self, _node_id: u64) -> Result<StateMap> {
            let mut state = StateMap::new();
            state.insert("on".into(), true.into());
            Ok(state)
        }

        async fn send_command(&self, _node_id: u64, command: &str, _value: Option<&StateValue>) -> CommandOutcome {
            if command == "fail" {
                CommandOutcome::fail("rejected by fabric")
            } else {
                CommandOutcome::ok()
            }
        }
    }

    fn test_engine(path: PathBuf) -> DeviceStateEngine {
        DeviceStateEngine::new(
            Arc::new(HandlerRegistry::with_defaults()),
            Arc::new(FakeRadio),
            Arc::new(NullPublisher),
            Arc::new(NullAutomationSink),
            path,
        )
    }

    #[test]
    fn pseudo_ieee_round_trips_through_node_id() {
        let node_id = 0x0102_0304_0506_0708u64;
        let ieee = pseudo_ieee(node_id);
        assert_eq!(node_id_from_pseudo_ieee(ieee), node_id);
    }

    #[tokio::test]
    async fn sync_registry_registers_every_fabric_node_once() {
        let engine = test_engine(PathBuf::from("/tmp/zigbee-core-test-matter-1.json"));
        let adapter = MatterAdapter::new(Box::new(FakeFabric { nodes: vec![1, 2] }), engine);
        adapter.sync_registry();
        assert!(adapter.owns(pseudo_ieee(1)));
        assert!(adapter.owns(pseudo_ieee(2)));
        assert!(!adapter.owns(pseudo_ieee(3)));
    }

    #[tokio::test]
    async fn poll_node_applies_state_without_debounce() {
        let engine = test_engine(PathBuf::from("/tmp/zigbee-core-test-matter-2.json"));
        let adapter = MatterAdapter::new(Box::new(FakeFabric { nodes: vec![7] }), engine);
        adapter.sync_registry();
        adapter.poll_node(7).await.unwrap();
        let device = adapter.engine.device(pseudo_ieee(7)).unwrap();
        assert_eq!(device.state.get("on").and_then(|v| v.as_bool()), Some(true));
    }

    #[tokio::test]
    async fn failed_command_marks_device_unavailable_after_threshold() {
        let engine = test_engine(PathBuf::from("/tmp/zigbee-core-test-matter-3.json"));
        let adapter = MatterAdapter::new(Box::new(FakeFabric { nodes: vec![9] }), engine);
        adapter.sync_registry();
        for _ in 0..5 {
            adapter.send_command(pseudo_ieee(9), "fail", None).await;
        }
        let device = adapter.engine.device(pseudo_ieee(9)).unwrap();
        assert!(!device.available);
    }
}
