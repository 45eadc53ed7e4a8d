//! The device state engine: the device registry, debounced state
//! merge/publish, command dispatch, and availability tracking.

use crate::cluster::id;
use crate::device::{PowerSource, ZigbeeDevice};
use crate::error::{CommandOutcome, Error, Result};
use crate::handler::{
    ColorHandler, HandlerRegistry, LevelHandler, OnOffHandler, WindowCoveringHandler,
};
use crate::mqtt::MqttPublisher;
use crate::persistence;
use crate::state::{keyed_names, merge_and_delta, StateMap, StateValue};
use async_trait::async_trait;
use dashmap::DashMap;
use radio_proto::ControllerApplication;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Debounce window for coalescing successive updates to one device.
/// The fast path bypasses this entirely.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(50);

/// Consumed by `update_state` to hand state deltas to the automation
/// engine. Always invoked from a spawned task, never synchronously, so
/// that automation dispatch cannot re-enter the handler that produced it.
#[async_trait]
pub trait AutomationSink: Send + Sync {
    async fn on_device_delta(&self, source_ieee: [u8; 8], delta: StateMap);
}

/// Discards deltas; used when no automation engine is wired up.
#[derive(Debug, Default)]
pub struct NullAutomationSink;

#[async_trait]
impl AutomationSink for NullAutomationSink {
    async fn on_device_delta(&self, _source_ieee: [u8; 8], _delta: StateMap) {}
}

/// Lifecycle state of a single (endpoint, cluster) handler instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerState {
    New,
    Active,
    Degraded,
    Dead,
}

struct HandlerEntry {
    handler: Mutex<Box<dyn crate::handler::ClusterHandler>>,
    state: std::sync::Mutex<HandlerState>,
}

type HandlerKey = ([u8; 8], u8, u16);

struct DebounceSlot {
    pending: StateMap,
    scheduled: bool,
}

/// The device registry and state engine. Cheap to clone (everything behind
/// `Arc`), so it can be handed to the fast-path decoder, the automation
/// engine's executor, and the persistence sweeper alike.
pub struct DeviceStateEngine {
    devices: Arc<DashMap<[u8; 8], ZigbeeDevice>>,
    handlers: Arc<DashMap<HandlerKey, HandlerEntry>>,
    registry: Arc<HandlerRegistry>,
    radio: Arc<dyn ControllerApplication>,
    mqtt: Arc<dyn MqttPublisher>,
    automation: Arc<dyn AutomationSink>,
    debounce: Arc<DashMap<[u8; 8], Mutex<DebounceSlot>>>,
    persistence_path: PathBuf,
    dirty: Arc<AtomicBool>,
}

impl DeviceStateEngine {
    #[must_use]
    pub fn new(
        registry: Arc<HandlerRegistry>,
        radio: Arc<dyn ControllerApplication>,
        mqtt: Arc<dyn MqttPublisher>,
        automation: Arc<dyn AutomationSink>,
        persistence_path: PathBuf,
    ) -> Self {
        Self {
            devices: Arc::new(DashMap::new()),
            handlers: Arc::new(DashMap::new()),
            registry,
            radio,
            mqtt,
            automation,
            debounce: Arc::new(DashMap::new()),
            persistence_path,
            dirty: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Load the persisted device map from disk, replacing the in-memory
    /// registry. A missing file is not an error (first run).
    pub async fn load(&self) {
        let loaded = persistence::load_devices(&self.persistence_path).await;
        self.devices.clear();
        for device in loaded {
            self.devices.insert(device.ieee_address, device);
        }
    }

    /// Persist the device map if it has changed since the last save.
    pub async fn save_if_dirty(&self) -> Result<()> {
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        let snapshot: Vec<ZigbeeDevice> = self.devices.iter().map(|e| e.value().clone()).collect();
        persistence::save_devices(&self.persistence_path, &snapshot)
            .await
            .map_err(|e| Error::PersistenceFailure(e.to_string()))
    }

    pub fn register_device(&self, device: ZigbeeDevice) {
        self.devices.insert(device.ieee_address, device);
        self.dirty.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn device(&self, ieee: [u8; 8]) -> Option<ZigbeeDevice> {
        self.devices.get(&ieee).map(|e| e.value().clone())
    }

    #[must_use]
    pub fn devices_snapshot(&self) -> Vec<ZigbeeDevice> {
        self.devices.iter().map(|e| e.value().clone()).collect()
    }

    fn handler_key(ieee: [u8; 8], endpoint: u8, cluster: u16) -> HandlerKey {
        (ieee, endpoint, cluster)
    }

    /// Construct and `configure()` a handler for every (endpoint, in-cluster)
    /// pair on this device. Idempotent: safe to call again on reconnect.
    pub async fn configure_device(&self, ieee: [u8; 8]) -> Result<()> {
        let endpoints = {
            let device = self
                .devices
                .get(&ieee)
                .ok_or_else(|| Error::DeviceUnreachable(hex_ieee(ieee)))?;
            device.endpoints.clone()
        };

        let mut max_interval: u32 = 0;
        for endpoint in &endpoints {
            for &cluster_id in &endpoint.in_clusters {
                let key = Self::handler_key(ieee, endpoint.id, cluster_id);
                if !self.handlers.contains_key(&key) {
                    self.handlers.insert(
                        key,
                        HandlerEntry {
                            handler: Mutex::new(self.registry.create(cluster_id)),
                            state: std::sync::Mutex::new(HandlerState::New),
                        },
                    );
                }
                let entry = self.handlers.get(&key).unwrap();
                let report_intervals: Vec<u16> = {
                    let guard = entry.handler.lock().await;
                    guard.report_config().iter().map(|c| c.max_interval).collect()
                };
                let (outcome, metadata) = {
                    let mut guard = entry.handler.lock().await;
                    guard.configure(self.radio.as_ref(), ieee, endpoint.id).await
                };
                {
                    let mut state = entry.state.lock().unwrap();
                    *state = match outcome {
                        crate::handler::ConfigureOutcome::Ok => {
                            for iv in &report_intervals {
                                max_interval = max_interval.max(u32::from(*iv));
                            }
                            HandlerState::Active
                        }
                        crate::handler::ConfigureOutcome::Failed => HandlerState::Degraded,
                    };
                }
                if !metadata.is_empty() {
                    let partial = expand_keyed(&metadata, endpoint.id);
                    self.apply_immediately(ieee, partial).await;
                }
            }
        }

        if max_interval > 0 {
            if let Some(mut device) = self.devices.get_mut(&ieee) {
                device.max_report_interval_secs = Some(max_interval);
            }
        }
        self.sync_metadata_fields(ieee);
        Ok(())
    }

    /// Mirror well-known state keys discovered via Basic cluster
    /// configure (manufacturer/model/sw_version/power_source) onto
    /// `ZigbeeDevice`'s dedicated fields, which `display_name` and
    /// persistence read directly rather than going through `state`.
    fn sync_metadata_fields(&self, ieee: [u8; 8]) {
        let Some(mut device) = self.devices.get_mut(&ieee) else {
            return;
        };
        if device.manufacturer.is_none() {
            device.manufacturer = device.state.get("manufacturer").and_then(|v| v.as_str()).map(String::from);
        }
        if device.model.is_none() {
            device.model = device.state.get("model").and_then(|v| v.as_str()).map(String::from);
        }
        if device.sw_version.is_none() {
            device.sw_version = device.state.get("sw_version").and_then(|v| v.as_str()).map(String::from);
        }
        if device.power_source.is_none() {
            device.power_source = device
                .state
                .get("power_source")
                .and_then(|v| v.as_str())
                .and_then(PowerSource::from_state_label);
        }
    }

    /// Mark every handler on a departed device DEAD and drop its entries.
    pub fn device_left(&self, ieee: [u8; 8]) {
        self.handlers.retain(|(k_ieee, _, _), _| *k_ieee != ieee);
    }

    /// Normal-dispatch entry point for an attribute report/read response.
    pub async fn ingest_attribute(
        &self,
        ieee: [u8; 8],
        endpoint: u8,
        cluster_id: u16,
        attr_id: u16,
        data_type: u8,
        data: &[u8],
    ) {
        let key = Self::handler_key(ieee, endpoint, cluster_id);
        self.handlers.entry(key).or_insert_with(|| HandlerEntry {
            handler: Mutex::new(self.registry.create(cluster_id)),
            state: std::sync::Mutex::new(HandlerState::New),
        });
        let entry = self.handlers.get(&key).unwrap();
        let delta = {
            let mut guard = entry.handler.lock().await;
            guard.attribute_updated(attr_id, data_type, data)
        };
        if delta.is_empty() {
            return;
        }
        let partial = expand_keyed(&delta, endpoint);
        self.update_state(ieee, partial).await;
    }

    /// Normal-dispatch entry point for a cluster-specific command frame
    /// (IAS Zone status change, etc).
    pub async fn ingest_cluster_command(
        &self,
        ieee: [u8; 8],
        endpoint: u8,
        cluster_id: u16,
        tsn: u8,
        command_id: u8,
        args: &[u8],
    ) {
        let key = Self::handler_key(ieee, endpoint, cluster_id);
        self.handlers.entry(key).or_insert_with(|| HandlerEntry {
            handler: Mutex::new(self.registry.create(cluster_id)),
            state: std::sync::Mutex::new(HandlerState::New),
        });
        let entry = self.handlers.get(&key).unwrap();
        let delta = {
            let mut guard = entry.handler.lock().await;
            guard.cluster_command(tsn, command_id, args)
        };
        if delta.is_empty() {
            return;
        }
        let partial = expand_keyed(&delta, endpoint);
        self.update_state(ieee, partial).await;
    }

    /// Merge `partial` into the device's state, debounced by 50 ms, then
    /// publish and notify automation. The fast path calls
    /// `apply_immediately` instead to bypass the debounce window.
    pub async fn update_state(&self, ieee: [u8; 8], partial: StateMap) {
        let slot = self
            .debounce
            .entry(ieee)
            .or_insert_with(|| {
                Mutex::new(DebounceSlot {
                    pending: StateMap::new(),
                    scheduled: false,
                })
            });
        let mut guard = slot.value().lock().await;
        guard.pending.extend(partial);
        if guard.scheduled {
            return;
        }
        guard.scheduled = true;
        drop(guard);

        let devices = Arc::clone(&self.devices);
        let debounce = Arc::clone(&self.debounce);
        let mqtt = Arc::clone(&self.mqtt);
        let automation = Arc::clone(&self.automation);
        let dirty = Arc::clone(&self.dirty);
        tokio::spawn(async move {
            tokio::time::sleep(DEBOUNCE_WINDOW).await;
            let pending = {
                let slot = match debounce.get(&ieee) {
                    Some(s) => s,
                    None => return,
                };
                let mut guard = slot.value().lock().await;
                guard.scheduled = false;
                std::mem::take(&mut guard.pending)
            };
            apply_and_publish(&devices, &mqtt, &automation, &dirty, ieee, pending, false).await;
        });
    }

    /// Fast-path entry point: bypasses debounce entirely and publishes
    /// over the QoS-0 low-latency path instead of the retained QoS-1 one.
    pub async fn apply_immediately(&self, ieee: [u8; 8], partial: StateMap) {
        apply_and_publish(
            &self.devices,
            &self.mqtt,
            &self.automation,
            &self.dirty,
            ieee,
            partial,
            true,
        )
        .await;
    }

    pub fn note_command_success(&self, ieee: [u8; 8]) {
        if let Some(mut device) = self.devices.get_mut(&ieee) {
            device.consecutive_failed_commands = 0;
            device.available = true;
        }
    }

    pub fn note_command_failure(&self, ieee: [u8; 8]) {
        if let Some(mut device) = self.devices.get_mut(&ieee) {
            device.consecutive_failed_commands = device.consecutive_failed_commands.saturating_add(1);
            if device.consecutive_failed_commands >= 5 {
                device.available = false;
            }
        }
        self.dirty.store(true, Ordering::Release);
    }

    /// Sweep the device map for availability timeouts. Intended to be
    /// run periodically by the gateway's background task set.
    pub fn sweep_availability(&self, now_ms: u64) {
        for mut entry in self.devices.iter_mut() {
            let device = entry.value_mut();
            let Some(last_seen) = device.last_seen else {
                continue;
            };
            let timeout = device.availability_timeout_ms();
            if device.available && now_ms.saturating_sub(last_seen) > timeout {
                device.available = false;
            }
        }
    }

    /// Route a normalised command to the correct endpoint handler and
    /// dispatch it over the radio.
    pub async fn send_command(
        &self,
        ieee: [u8; 8],
        command: &str,
        value: Option<&StateValue>,
        endpoint_id: Option<u8>,
    ) -> CommandOutcome {
        let Some(device) = self.device(ieee) else {
            return CommandOutcome::fail("device not found");
        };

        let cluster_id = match command_cluster(command) {
            Some(c) => c,
            None => return CommandOutcome::fail(format!("unsupported command: {command}")),
        };

        let endpoint = match endpoint_id {
            Some(id) => device.endpoint(id),
            None => device.endpoint_for_command(cluster_id),
        };
        let Some(endpoint) = endpoint else {
            return CommandOutcome::fail("no endpoint supports this command");
        };
        let endpoint_id = endpoint.id;

        let result = match (cluster_id, command) {
            (c, cmd) if c == id::ON_OFF => {
                let handler = OnOffHandler;
                match handler.command_for(cmd) {
                    Ok(wire) => {
                        self.radio
                            .send_command(ieee, endpoint_id, c, wire.command_id(), &[])
                            .await
                    }
                    Err(outcome) => return outcome,
                }
            }
            (c, "brightness") if c == id::LEVEL_CONTROL => {
                let pct = value.and_then(StateValue::as_f64).unwrap_or(0.0).clamp(0.0, 100.0) as u8;
                let handler = LevelHandler;
                let wire = handler.move_to_level(pct, 0);
                self.radio
                    .send_command(ieee, endpoint_id, c, wire.command_id(), &wire.payload())
                    .await
            }
            (c, "color_temp") if c == id::COLOR_CONTROL => {
                let mireds = value.and_then(StateValue::as_f64).unwrap_or(0.0) as u16;
                let handler = ColorHandler;
                let wire = handler.move_to_color_temp(mireds, 0);
                self.radio
                    .send_command(ieee, endpoint_id, c, wire.command_id(), &wire.payload())
                    .await
            }
            (c, cmd) if c == id::WINDOW_COVERING => {
                let handler = WindowCoveringHandler::default();
                let wire = match cmd {
                    "open" => handler.open(),
                    "close" => handler.close(),
                    "stop" => handler.stop(),
                    "position" => {
                        let pos = value.and_then(StateValue::as_f64).unwrap_or(0.0).clamp(0.0, 100.0) as u8;
                        handler.set_position(pos)
                    }
                    other => return CommandOutcome::fail(format!("unsupported covering command: {other}")),
                };
                self.radio
                    .send_command(ieee, endpoint_id, c, wire.command_id(), &wire.payload())
                    .await
            }
            _ => return CommandOutcome::fail(format!("unsupported command: {command}")),
        };

        match result {
            Ok(()) => {
                self.note_command_success(ieee);
                CommandOutcome::ok()
            }
            Err(e) => {
                self.note_command_failure(ieee);
                CommandOutcome::fail(e.to_string())
            }
        }
    }
}

/// Merge `partial` into device state, publish to MQTT and notify
/// automation through a spawned task if the delta is non-empty. Shared by
/// the debounced path and the fast path.
async fn apply_and_publish(
    devices: &DashMap<[u8; 8], ZigbeeDevice>,
    mqtt: &Arc<dyn MqttPublisher>,
    automation: &Arc<dyn AutomationSink>,
    dirty: &Arc<AtomicBool>,
    ieee: [u8; 8],
    partial: StateMap,
    fast: bool,
) {
    if partial.is_empty() {
        return;
    }
    let (delta, full_state, now_ms) = {
        let mut entry = match devices.get_mut(&ieee) {
            Some(e) => e,
            None => return,
        };
        let delta = merge_and_delta(&mut entry.state, &partial);
        let now_ms = now_millis();
        entry.last_seen = Some(now_ms);
        entry.available = true;
        (delta, entry.state.clone(), now_ms)
    };
    let _ = now_ms;
    dirty.store(true, Ordering::Release);
    if delta.is_empty() {
        return;
    }

    if fast {
        mqtt.publish_state_fast(ieee, &full_state).await;
    } else {
        mqtt.publish_state(ieee, &full_state).await;
    }

    let automation = Arc::clone(automation);
    tokio::spawn(async move {
        automation.on_device_delta(ieee, delta).await;
    });
}

/// Shared with the fast-path decoder so both pipelines key per-endpoint
/// attribute names identically — required for fast-path/normal-path
/// idempotence.
pub(crate) fn expand_keyed(delta: &StateMap, endpoint_id: u8) -> StateMap {
    let mut out = StateMap::new();
    for (name, value) in delta {
        for key in keyed_names(name, endpoint_id) {
            out.insert(key, value.clone());
        }
    }
    out
}

fn command_cluster(command: &str) -> Option<u16> {
    match command {
        "on" | "off" | "toggle" => Some(id::ON_OFF),
        "brightness" => Some(id::LEVEL_CONTROL),
        "color_temp" => Some(id::COLOR_CONTROL),
        "open" | "close" | "stop" | "position" => Some(id::WINDOW_COVERING),
        _ => None,
    }
}

fn hex_ieee(ieee: [u8; 8]) -> String {
    ieee.iter().map(|b| format!("{b:02x}")).collect::<Vec<_>>().join("")
}

fn now_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Endpoint;
    use crate::handler::HandlerRegistry;
    use crate::mqtt::NullPublisher;
    use radio_proto::{EnergyScanResult, NodeInfo, ProtocolError, ReportConfig as RadioReportConfig};

    struct FakeRadio;

    #[async_trait]
    impl ControllerApplication for FakeRadio {
        fn node_info(&self) -> NodeInfo {
            NodeInfo {
                ieee: [0; 8],
                nwk: 0,
                channel: 11,
            }
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
            _configs: &[RadioReportConfig],
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

    fn test_engine(path: PathBuf) -> DeviceStateEngine {
        DeviceStateEngine::new(
            Arc::new(HandlerRegistry::with_defaults()),
            Arc::new(FakeRadio),
            Arc::new(NullPublisher),
            Arc::new(NullAutomationSink),
            path,
        )
    }

    fn light_device() -> ZigbeeDevice {
        let mut device = ZigbeeDevice::new([1; 8], 0x1234);
        device.endpoints.push(Endpoint {
            id: 1,
            profile_id: 0x0104,
            device_id: 0,
            in_clusters: vec![id::ON_OFF, id::LEVEL_CONTROL],
            out_clusters: vec![],
        });
        device
    }

    #[tokio::test]
    async fn send_command_routes_on_off_to_correct_endpoint() {
        let engine = test_engine(PathBuf::from("/tmp/zigbee-core-test-devices-1.json"));
        engine.register_device(light_device());
        let outcome = engine.send_command([1; 8], "on", None, None).await;
        assert!(outcome.success);
    }

    #[tokio::test]
    async fn send_command_rejects_unsupported_command() {
        let engine = test_engine(PathBuf::from("/tmp/zigbee-core-test-devices-2.json"));
        engine.register_device(light_device());
        let outcome = engine.send_command([1; 8], "bogus", None, None).await;
        assert!(!outcome.success);
    }

    #[tokio::test]
    async fn send_command_fails_without_matching_endpoint() {
        let engine = test_engine(PathBuf::from("/tmp/zigbee-core-test-devices-3.json"));
        let device = ZigbeeDevice::new([2; 8], 0x5678);
        engine.register_device(device);
        let outcome = engine.send_command([2; 8], "on", None, None).await;
        assert!(!outcome.success);
    }

    #[tokio::test]
    async fn ingest_attribute_updates_state_after_debounce() {
        let engine = test_engine(PathBuf::from("/tmp/zigbee-core-test-devices-4.json"));
        engine.register_device(light_device());
        engine
            .ingest_attribute([1; 8], 1, id::ON_OFF, 0x0000, 0x10, &[0x01])
            .await;
        tokio::time::sleep(DEBOUNCE_WINDOW + Duration::from_millis(20)).await;
        let device = engine.device([1; 8]).unwrap();
        assert_eq!(device.state.get("on").and_then(|v| v.as_bool()), Some(true));
    }

    #[tokio::test]
    async fn failed_commands_mark_device_unavailable_after_five() {
        let engine = test_engine(PathBuf::from("/tmp/zigbee-core-test-devices-5.json"));
        engine.register_device(light_device());
        for _ in 0..5 {
            engine.note_command_failure([1; 8]);
        }
        let device = engine.device([1; 8]).unwrap();
        assert!(!device.available);
        assert_eq!(device.consecutive_failed_commands, 5);
    }
}
