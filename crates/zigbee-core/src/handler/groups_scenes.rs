//! Groups (0x0004) and Scenes (0x0005) handlers: thin command-surface
//! handlers with no attribute reporting of their own. LightLink's group
//! enrollment depends on the coordinator having a working group command
//! surface, which these two provide.

use super::{ClusterHandler, DiscoveryConfig};
use crate::cluster::id;
use crate::error::CommandOutcome;
use crate::state::StateMap;
use async_trait::async_trait;

/// Groups cluster commands this handler's command surface maps to.
#[derive(Debug, Clone, Copy)]
pub enum GroupsCommand {
    Add(u16),
    Remove(u16),
    RemoveAll,
}

#[derive(Debug, Default)]
pub struct GroupsHandler;

#[async_trait]
impl ClusterHandler for GroupsHandler {
    fn cluster_id(&self) -> u16 {
        id::GROUPS
    }

    fn attribute_updated(&mut self, _attr_id: u16, _data_type: u8, _data: &[u8]) -> StateMap {
        StateMap::new()
    }

    fn discovery_configs(&self, _endpoint_id: u8) -> Vec<DiscoveryConfig> {
        Vec::new()
    }
}

impl GroupsHandler {
    #[must_use]
    pub fn command_for(&self, command: &str, group_id: u16) -> Result<GroupsCommand, CommandOutcome> {
        match command {
            "add_to_group" => Ok(GroupsCommand::Add(group_id)),
            "remove_from_group" => Ok(GroupsCommand::Remove(group_id)),
            "remove_all_groups" => Ok(GroupsCommand::RemoveAll),
            other => Err(CommandOutcome::fail(format!(
                "unsupported groups command: {other}"
            ))),
        }
    }
}

/// Scenes cluster commands this handler's command surface maps to.
#[derive(Debug, Clone, Copy)]
pub enum ScenesCommand {
    Recall { group_id: u16, scene_id: u8 },
    Store { group_id: u16, scene_id: u8 },
}

#[derive(Debug, Default)]
pub struct ScenesHandler;

#[async_trait]
impl ClusterHandler for ScenesHandler {
    fn cluster_id(&self) -> u16 {
        id::SCENES
    }

    fn attribute_updated(&mut self, _attr_id: u16, _data_type: u8, _data: &[u8]) -> StateMap {
        StateMap::new()
    }

    fn discovery_configs(&self, _endpoint_id: u8) -> Vec<DiscoveryConfig> {
        Vec::new()
    }
}

impl ScenesHandler {
    #[must_use]
    pub fn recall_scene(&self, group_id: u16, scene_id: u8) -> ScenesCommand {
        ScenesCommand::Recall { group_id, scene_id }
    }

    #[must_use]
    pub fn store_scene(&self, group_id: u16, scene_id: u8) -> ScenesCommand {
        ScenesCommand::Store { group_id, scene_id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_command_maps_add_and_remove() {
        let h = GroupsHandler;
        assert!(matches!(
            h.command_for("add_to_group", 0x0001),
            Ok(GroupsCommand::Add(0x0001))
        ));
        assert!(matches!(
            h.command_for("remove_from_group", 0x0001),
            Ok(GroupsCommand::Remove(0x0001))
        ));
    }

    #[test]
    fn unknown_groups_command_fails() {
        let h = GroupsHandler;
        assert!(h.command_for("bogus", 0).is_err());
    }

    #[test]
    fn scenes_recall_and_store_carry_group_and_scene() {
        let h = ScenesHandler;
        match h.recall_scene(1, 2) {
            ScenesCommand::Recall { group_id, scene_id } => {
                assert_eq!(group_id, 1);
                assert_eq!(scene_id, 2);
            }
            ScenesCommand::Store { .. } => panic!("wrong variant"),
        }
    }
}
