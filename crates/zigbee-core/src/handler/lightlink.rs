//! LightLink (0x1000) handler: on configure, queries the bulb's group
//! identifiers and enrolls the coordinator into each; joins the default
//! group 0x0000 if none are returned. Does not bind.

use super::{ClusterHandler, ConfigureOutcome};
use crate::cluster::id;
use crate::state::StateMap;
use async_trait::async_trait;
use radio_proto::ControllerApplication;

/// Default group LightLink bulbs join when they report no groups of
/// their own.
pub const DEFAULT_GROUP: u16 = 0x0000;

#[derive(Debug, Default)]
pub struct LightLinkHandler {
    joined_groups: Vec<u16>,
}

impl LightLinkHandler {
    /// Pure decision function: join every reported group, or the default
    /// group if the bulb reported none.
    #[must_use]
    pub fn groups_to_join(identifiers: &[u16]) -> Vec<u16> {
        if identifiers.is_empty() {
            vec![DEFAULT_GROUP]
        } else {
            identifiers.to_vec()
        }
    }

    #[must_use]
    pub fn joined_groups(&self) -> &[u16] {
        &self.joined_groups
    }
}

#[async_trait]
impl ClusterHandler for LightLinkHandler {
    fn cluster_id(&self) -> u16 {
        id::LIGHTLINK
    }

    fn attribute_updated(&mut self, _attr_id: u16, _data_type: u8, _data: &[u8]) -> StateMap {
        StateMap::new()
    }

    async fn configure(
        &mut self,
        radio: &dyn ControllerApplication,
        ieee: [u8; 8],
        endpoint: u8,
    ) -> (ConfigureOutcome, StateMap) {
        let identifiers = match radio.get_group_identifiers(ieee, endpoint).await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!("lightlink group identifier query failed: {e}");
                Vec::new()
            }
        };
        let targets = Self::groups_to_join(&identifiers);
        let mut joined = Vec::new();
        for group_id in targets {
            match radio.add_to_group(group_id, None).await {
                Ok(()) => joined.push(group_id),
                Err(e) => tracing::warn!("failed to join lightlink group {group_id:#06x}: {e}"),
            }
        }
        self.joined_groups = joined;
        (ConfigureOutcome::Ok, StateMap::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_reported_groups_are_both_joined() {
        assert_eq!(
            LightLinkHandler::groups_to_join(&[0x0001, 0x0002]),
            vec![0x0001, 0x0002]
        );
    }

    #[test]
    fn no_reported_groups_joins_default() {
        assert_eq!(LightLinkHandler::groups_to_join(&[]), vec![DEFAULT_GROUP]);
    }
}
