//! Thin composition root: wires the handler registry, device state
//! engine, and automation engine together into a runnable process. No
//! HTTP/REST/WebSocket surface — those are external collaborators, out
//! of scope for this workspace.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use automation_engine::AutomationEngine;
use radio_proto::{ControllerApplication, EnergyScanResult, NodeInfo, ProtocolError, ReportConfig};
use zigbee_core::handler::HandlerRegistry;
use zigbee_core::{AutomationSink, DeviceStateEngine, NullPublisher, StateMap};

/// Sweep for dead/stale devices this often.
const AVAILABILITY_SWEEP_INTERVAL: Duration = Duration::from_secs(30);
/// How often the device cache is flushed to disk if dirty.
const PERSIST_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Tunables read from the environment rather than a YAML loader — config
/// loading belongs to the host application.
struct GatewayConfig {
    data_dir: PathBuf,
    serial_port: Option<String>,
}

impl GatewayConfig {
    fn from_env() -> Self {
        let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string()).into();
        let serial_port = std::env::var("ZIGBEE_SERIAL_PORT").ok().or_else(detect_serial_port);
        Self { data_dir, serial_port }
    }
}

/// Probe common udev symlinks/device nodes for an attached coordinator.
fn detect_serial_port() -> Option<String> {
    for path in ["/dev/zigbee", "/dev/ttyACM0", "/dev/ttyUSB0"] {
        if Path::new(path).exists() {
            return Some(path.to_string());
        }
    }
    None
}

/// Stands in for an EZSP or ZNP backend when none is attached: every
/// radio-facing call fails with `NotConnected` rather than panicking, so
/// the device state engine, automation engine, and fast path all run
/// normally in an offline/automation-only mode (no commands can reach a
/// mesh that isn't there). A real backend substitutes its own
/// `ControllerApplication` impl here; none ships in this crate — the
/// trait is the boundary, not a driver.
struct OfflineRadio {
    coordinator_ieee: [u8; 8],
}

#[async_trait]
impl ControllerApplication for OfflineRadio {
    fn node_info(&self) -> NodeInfo {
        NodeInfo { ieee: self.coordinator_ieee, nwk: 0x0000, channel: 0 }
    }

    async fn read_attributes(
        &self,
        _ieee: [u8; 8],
        _endpoint: u8,
        _cluster: u16,
        _attrs: &[u16],
    ) -> Result<Vec<(u16, Vec<u8>)>, ProtocolError> {
        Err(ProtocolError::NotConnected)
    }

    async fn write_attributes(
        &self,
        _ieee: [u8; 8],
        _endpoint: u8,
        _cluster: u16,
        _attrs: &[(u16, u8, Vec<u8>)],
    ) -> Result<(), ProtocolError> {
        Err(ProtocolError::NotConnected)
    }

    async fn configure_reporting(
        &self,
        _ieee: [u8; 8],
        _endpoint: u8,
        _cluster: u16,
        _configs: &[ReportConfig],
    ) -> Result<(), ProtocolError> {
        Err(ProtocolError::NotConnected)
    }

    async fn bind(&self, _ieee: [u8; 8], _endpoint: u8, _cluster: u16) -> Result<(), ProtocolError> {
        Err(ProtocolError::NotConnected)
    }

    async fn send_command(
        &self,
        _ieee: [u8; 8],
        _endpoint: u8,
        _cluster: u16,
        _command_id: u8,
        _payload: &[u8],
    ) -> Result<(), ProtocolError> {
        Err(ProtocolError::NotConnected)
    }

    async fn energy_scan(&self, _channels: &[u8]) -> Result<Vec<EnergyScanResult>, ProtocolError> {
        Err(ProtocolError::NotConnected)
    }

    async fn add_to_group(&self, _group_id: u16, _name: Option<&str>) -> Result<(), ProtocolError> {
        Err(ProtocolError::NotConnected)
    }

    async fn get_group_identifiers(&self, _ieee: [u8; 8], _endpoint: u8) -> Result<Vec<u16>, ProtocolError> {
        Err(ProtocolError::NotConnected)
    }
}

/// Forwards device deltas into the automation engine once it exists.
/// `DeviceStateEngine::new` needs a sink before `AutomationEngine::new`
/// can exist (the latter needs an `Arc<DeviceStateEngine>` for device
/// lookups and command dispatch); this breaks the cycle by deferring the
/// binding until after both are constructed. Deltas observed in the
/// narrow startup window before `bind` runs are simply dropped, same as
/// `NullAutomationSink`.
#[derive(Default)]
struct DeferredAutomationSink {
    engine: OnceCell<Arc<AutomationEngine>>,
}

impl DeferredAutomationSink {
    fn bind(&self, engine: Arc<AutomationEngine>) {
        let _ = self.engine.set(engine);
    }
}

#[async_trait]
impl AutomationSink for DeferredAutomationSink {
    async fn on_device_delta(&self, source_ieee: [u8; 8], delta: StateMap) {
        if let Some(engine) = self.engine.get() {
            engine.evaluate(source_ieee, &delta).await;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "gateway_core=debug,zigbee_core=debug,automation_engine=debug,radio_proto=debug,info".into()
        }))
        .init();

    tracing::info!("starting gateway core");

    let config = GatewayConfig::from_env();
    std::fs::create_dir_all(&config.data_dir)?;

    let coordinator_ieee = [0u8; 8];
    let radio: Arc<dyn ControllerApplication> = match &config.serial_port {
        Some(port) => {
            tracing::warn!(
                port,
                "a serial port was found, but this build carries no EZSP/ZNP driver; running offline"
            );
            Arc::new(OfflineRadio { coordinator_ieee })
        }
        None => {
            tracing::warn!("no coordinator configured - running without a radio backend");
            Arc::new(OfflineRadio { coordinator_ieee })
        }
    };

    let registry = Arc::new(HandlerRegistry::with_defaults());
    let automation_sink = Arc::new(DeferredAutomationSink::default());
    let devices = Arc::new(DeviceStateEngine::new(
        registry,
        radio,
        Arc::new(NullPublisher),
        automation_sink.clone(),
        config.data_dir.join("devices.json"),
    ));
    devices.load().await;
    tracing::info!(count = devices.devices_snapshot().len(), "loaded device cache");

    let automation = Arc::new(AutomationEngine::new(devices.clone(), &config.data_dir).await?);
    automation_sink.bind(automation.clone());
    automation.start();
    tracing::info!(rules = automation.list().len(), "automation engine started");

    spawn_availability_sweep(devices.clone());
    spawn_persistence_sweep(devices.clone());

    tracing::info!("gateway core ready");
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    Ok(())
}

fn spawn_availability_sweep(devices: Arc<DeviceStateEngine>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(AVAILABILITY_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let now_ms = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0);
            devices.sweep_availability(now_ms);
        }
    });
}

fn spawn_persistence_sweep(devices: Arc<DeviceStateEngine>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PERSIST_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            if let Err(e) = devices.save_if_dirty().await {
                tracing::warn!(error = %e, "failed to persist device cache");
            }
        }
    });
}
