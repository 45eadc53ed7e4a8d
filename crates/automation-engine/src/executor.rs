//! Command dispatch: soft capability check followed by a fire-and-forget
//! call into the device state engine's command surface.

use zigbee_core::handler::command_capability_matches;
use zigbee_core::{CommandOutcome, DeviceStateEngine, StateValue, ZigbeeDevice};

use crate::model::Action;

/// Whether `target`'s endpoints expose clusters matching the command's
/// capability family. A mismatch is advisory only: the caller still
/// dispatches the command and merely logs a WARNING trace.
#[must_use]
pub fn capability_matches(target: &ZigbeeDevice, command: &str) -> bool {
    let in_clusters: Vec<u16> = target
        .endpoints
        .iter()
        .flat_map(|e| e.in_clusters.iter().copied())
        .collect();
    command_capability_matches(command, &in_clusters)
}

/// Dispatch `action` against `target_ieee` through the device state
/// engine's command surface. Never panics: any radio-layer error comes
/// back as `CommandOutcome::fail`, not an exception.
pub async fn dispatch(devices: &DeviceStateEngine, target_ieee: [u8; 8], action: &Action) -> CommandOutcome {
    devices
        .send_command(target_ieee, &action.command, action.value.as_ref(), action.endpoint_id)
        .await
}

#[must_use]
pub fn action_value(action: &Action) -> Option<&StateValue> {
    action.value.as_ref()
}

#[cfg(test)]
mod tests {
    use super::*;
    use zigbee_core::Endpoint;

    fn cover_device() -> ZigbeeDevice {
        let mut device = ZigbeeDevice::new([1; 8], 1);
        device.endpoints.push(Endpoint {
            id: 1,
            profile_id: 0x0104,
            device_id: 0,
            in_clusters: vec![0x0102],
            out_clusters: vec![],
        });
        device
    }

    #[test]
    fn matching_capability_for_cover_command() {
        assert!(capability_matches(&cover_device(), "position"));
    }

    #[test]
    fn mismatched_capability_is_false_not_an_error() {
        assert!(!capability_matches(&cover_device(), "brightness"));
    }
}
