//! Cluster handler trait, the handler registry, and the concrete
//! per-cluster handlers.

mod basic;
mod electrical_measurement;
mod groups_scenes;
mod ias_zone;
mod identify;
mod lightlink;
mod metering;
mod occupancy;
mod onoff_level_color;
mod passthrough;
mod window_covering;

pub use basic::BasicHandler;
pub use electrical_measurement::ElectricalMeasurementHandler;
pub use groups_scenes::{GroupsHandler, ScenesHandler};
pub use ias_zone::{decode_status as decode_ias_zone_status, IasZoneHandler};
pub use identify::IdentifyHandler;
pub use lightlink::LightLinkHandler;
pub use metering::MeteringHandler;
pub use occupancy::{decode_occupancy, OccupancySensingHandler};
pub use onoff_level_color::{ColorHandler, LevelHandler, OnOffHandler};
pub use passthrough::PassthroughHandler;
pub use window_covering::WindowCoveringHandler;

use crate::cluster::id;
use crate::error::CommandOutcome;
use crate::state::StateMap;
use async_trait::async_trait;
use radio_proto::{ControllerApplication, ReportConfig};
use std::collections::HashMap;

/// A single discovery descriptor fragment; the device engine fills in
/// topics before forwarding it to the external hub's auto-discovery
/// schema.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DiscoveryConfig {
    pub component: String,
    pub object_id: String,
    pub config: serde_json::Value,
}

/// The lifecycle outcome of `configure()`, driving the ACTIVE/DEGRADED
/// handler state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigureOutcome {
    Ok,
    Failed,
}

/// The capability contract every cluster handler implements.
///
/// `attribute_updated` and `cluster_command` are synchronous and
/// side-effect free beyond returning the state delta they observed;
/// `configure` is the one async method, since it must bind, write
/// reporting configuration, and read one-time metadata from the radio.
#[async_trait]
pub trait ClusterHandler: Send + Sync {
    fn cluster_id(&self) -> u16;

    /// Translate a raw attribute report/read-response value into
    /// normalised state keys. Must not mutate anything besides the
    /// handler's own scratch state (e.g. scaling multiplier/divisor).
    fn attribute_updated(&mut self, attr_id: u16, data_type: u8, data: &[u8]) -> StateMap;

    /// Translate a cluster-specific command frame. Default: no-op (most
    /// clusters only report via attributes).
    fn cluster_command(&mut self, _tsn: u8, _command_id: u8, _args: &[u8]) -> StateMap {
        StateMap::new()
    }

    /// `(attribute, min_interval, max_interval, reportable_change)` tuples
    /// to write during `configure`.
    fn report_config(&self) -> Vec<ReportConfig> {
        Vec::new()
    }

    /// Bind, write reporting config, and read one-time metadata. Must be
    /// idempotent: called again on every reconnect. Any state discovered
    /// from a one-time read (manufacturer/model metadata, zone type,
    /// covering type, ...) is returned alongside the outcome so the engine
    /// can fold it into the device's state map the same way a report
    /// would, since it otherwise never reaches device state on its own.
    async fn configure(
        &mut self,
        radio: &dyn ControllerApplication,
        ieee: [u8; 8],
        endpoint: u8,
    ) -> (ConfigureOutcome, StateMap) {
        let _ = (ieee, endpoint);
        for cfg in self.report_config() {
            if radio
                .configure_reporting(ieee, endpoint, self.cluster_id(), &[cfg])
                .await
                .is_err()
            {
                return (ConfigureOutcome::Failed, StateMap::new());
            }
        }
        (ConfigureOutcome::Ok, StateMap::new())
    }

    /// Attributes to read opportunistically (polling fallback).
    fn poll_attributes(&self) -> Vec<u16> {
        Vec::new()
    }

    fn discovery_configs(&self, _endpoint_id: u8) -> Vec<DiscoveryConfig> {
        Vec::new()
    }
}

pub type HandlerFactory = fn() -> Box<dyn ClusterHandler>;

/// Process-wide `cluster_id -> constructor` mapping, populated once at
/// startup and read-only thereafter. Unknown clusters receive a
/// `PassthroughHandler`.
pub struct HandlerRegistry {
    factories: HashMap<u16, HandlerFactory>,
}

impl HandlerRegistry {
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut factories: HashMap<u16, HandlerFactory> = HashMap::new();
        factories.insert(id::BASIC, || Box::new(BasicHandler::default()));
        factories.insert(id::IDENTIFY, || Box::new(IdentifyHandler));
        factories.insert(id::GROUPS, || Box::new(GroupsHandler));
        factories.insert(id::SCENES, || Box::new(ScenesHandler));
        factories.insert(id::ON_OFF, || Box::new(OnOffHandler::default()));
        factories.insert(id::LEVEL_CONTROL, || Box::new(LevelHandler::default()));
        factories.insert(id::COLOR_CONTROL, || Box::new(ColorHandler::default()));
        factories.insert(id::WINDOW_COVERING, || {
            Box::new(WindowCoveringHandler::default())
        });
        factories.insert(id::ELECTRICAL_MEASUREMENT, || {
            Box::new(ElectricalMeasurementHandler::default())
        });
        factories.insert(id::METERING, || Box::new(MeteringHandler::default()));
        factories.insert(id::IAS_ZONE, || Box::new(IasZoneHandler::default()));
        factories.insert(id::LIGHTLINK, || Box::new(LightLinkHandler::default()));
        factories.insert(id::OCCUPANCY_SENSING, || {
            Box::new(OccupancySensingHandler::default())
        });
        Self { factories }
    }

    /// O(1) lookup; unknown clusters fall back to the generic passthrough.
    #[must_use]
    pub fn create(&self, cluster_id: u16) -> Box<dyn ClusterHandler> {
        match self.factories.get(&cluster_id) {
            Some(factory) => factory(),
            None => Box::new(PassthroughHandler::new(cluster_id)),
        }
    }

    #[must_use]
    pub fn is_known(&self, cluster_id: u16) -> bool {
        self.factories.contains_key(&cluster_id)
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Soft capability check used by the automation engine: a mismatch is
/// a warning, not a block.
#[must_use]
pub fn command_capability_matches(command: &str, in_clusters: &[u16]) -> bool {
    match command {
        "on" | "off" | "toggle" => in_clusters.contains(&id::ON_OFF),
        "brightness" => in_clusters.contains(&id::LEVEL_CONTROL),
        "color_temp" => in_clusters.contains(&id::COLOR_CONTROL),
        "open" | "close" | "stop" | "position" => in_clusters.contains(&id::WINDOW_COVERING),
        _ => true,
    }
}

pub(crate) fn outcome_ok() -> CommandOutcome {
    CommandOutcome::ok()
}
