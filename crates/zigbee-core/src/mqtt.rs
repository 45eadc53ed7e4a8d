//! The MQTT publication boundary. `zigbee-core` depends only on this
//! trait; the concrete MQTT client lives outside the crate graph so that
//! neither crate has to depend on the other.

use crate::handler::DiscoveryConfig;
use crate::state::StateMap;
use async_trait::async_trait;

/// Consumed by the device state engine to publish state and discovery
/// payloads. A no-op implementation is sufficient when MQTT is disabled.
#[async_trait]
pub trait MqttPublisher: Send + Sync {
    async fn publish_state(&self, ieee: [u8; 8], state: &StateMap);

    async fn publish_discovery(&self, ieee: [u8; 8], configs: &[DiscoveryConfig]);

    /// The fast path's low-latency publish: same state topic as
    /// `publish_state`, but QoS 0 and unretained, so it cannot be
    /// head-of-line blocked behind retained discovery messages. The
    /// default implementation just delegates to `publish_state`, so a
    /// `MqttPublisher` that does not distinguish QoS keeps working
    /// unchanged; a real client overrides this to skip its normal publish
    /// queue.
    async fn publish_state_fast(&self, ieee: [u8; 8], state: &StateMap) {
        self.publish_state(ieee, state).await;
    }
}

/// Discards everything; used when no broker is configured and in tests.
#[derive(Debug, Default)]
pub struct NullPublisher;

#[async_trait]
impl MqttPublisher for NullPublisher {
    async fn publish_state(&self, _ieee: [u8; 8], _state: &StateMap) {}

    async fn publish_discovery(&self, _ieee: [u8; 8], _configs: &[DiscoveryConfig]) {}
}
