//! On/Off (0x0006), Level Control (0x0008), and Color Control (0x0300)
//! handlers. Grouped in one file since all three are small, attribute-report
//! driven actuator handlers sharing the same reporting-configuration shape.

use super::{ClusterHandler, DiscoveryConfig};
use crate::cluster::id;
use crate::cluster::{ColorCommand, LevelCommand, OnOffCommand};
use crate::error::CommandOutcome;
use crate::state::StateMap;
use async_trait::async_trait;
use radio_proto::{ControllerApplication, ReportConfig};

const ON_OFF_ATTR: u16 = 0x0000;
const CURRENT_LEVEL_ATTR: u16 = 0x0000;
const COLOR_TEMP_ATTR: u16 = 0x0007;
const CURRENT_X_ATTR: u16 = 0x0003;
const CURRENT_Y_ATTR: u16 = 0x0004;

#[derive(Debug, Default)]
pub struct OnOffHandler;

#[async_trait]
impl ClusterHandler for OnOffHandler {
    fn cluster_id(&self) -> u16 {
        id::ON_OFF
    }

    fn attribute_updated(&mut self, attr_id: u16, _data_type: u8, data: &[u8]) -> StateMap {
        let mut out = StateMap::new();
        if attr_id == ON_OFF_ATTR {
            if let Some(&raw) = data.first() {
                out.insert("state_on".into(), (raw != 0).into());
                out.insert("on".into(), (raw != 0).into());
            }
        }
        out
    }

    fn report_config(&self) -> Vec<ReportConfig> {
        vec![ReportConfig {
            attr_id: ON_OFF_ATTR,
            min_interval: 0,
            max_interval: 3600,
            reportable_change: 0,
        }]
    }

    fn poll_attributes(&self) -> Vec<u16> {
        vec![ON_OFF_ATTR]
    }

    fn discovery_configs(&self, endpoint_id: u8) -> Vec<DiscoveryConfig> {
        vec![DiscoveryConfig {
            component: "switch".into(),
            object_id: format!("onoff_{endpoint_id}"),
            config: serde_json::json!({"device_class": "outlet"}),
        }]
    }
}

impl OnOffHandler {
    /// Translate a normalised `on/off/toggle` command into a wire command
    /// payload; the engine performs the actual radio send.
    #[must_use]
    pub fn command_for(&self, command: &str) -> Result<OnOffCommand, CommandOutcome> {
        match command {
            "on" => Ok(OnOffCommand::On),
            "off" => Ok(OnOffCommand::Off),
            "toggle" => Ok(OnOffCommand::Toggle),
            other => Err(CommandOutcome::fail(format!(
                "unsupported on/off command: {other}"
            ))),
        }
    }
}

#[derive(Debug, Default)]
pub struct LevelHandler;

#[async_trait]
impl ClusterHandler for LevelHandler {
    fn cluster_id(&self) -> u16 {
        id::LEVEL_CONTROL
    }

    fn attribute_updated(&mut self, attr_id: u16, _data_type: u8, data: &[u8]) -> StateMap {
        let mut out = StateMap::new();
        if attr_id == CURRENT_LEVEL_ATTR {
            if let Some(&raw) = data.first() {
                // 0-254 device range mapped to 0-100 percent brightness.
                let pct = ((raw as u32 * 100) / 254) as i64;
                out.insert("brightness".into(), pct.into());
            }
        }
        out
    }

    fn report_config(&self) -> Vec<ReportConfig> {
        vec![ReportConfig {
            attr_id: CURRENT_LEVEL_ATTR,
            min_interval: 1,
            max_interval: 3600,
            reportable_change: 1,
        }]
    }

    fn poll_attributes(&self) -> Vec<u16> {
        vec![CURRENT_LEVEL_ATTR]
    }
}

impl LevelHandler {
    #[must_use]
    pub fn move_to_level(&self, percent: u8, transition_time: u16) -> LevelCommand {
        let level = ((percent.min(100) as u32 * 254) / 100) as u8;
        LevelCommand::MoveToLevelWithOnOff {
            level,
            transition_time,
        }
    }
}

#[derive(Debug, Default)]
pub struct ColorHandler;

#[async_trait]
impl ClusterHandler for ColorHandler {
    fn cluster_id(&self) -> u16 {
        id::COLOR_CONTROL
    }

    fn attribute_updated(&mut self, attr_id: u16, _data_type: u8, data: &[u8]) -> StateMap {
        let mut out = StateMap::new();
        match attr_id {
            COLOR_TEMP_ATTR if data.len() >= 2 => {
                let mireds = u16::from_le_bytes([data[0], data[1]]);
                out.insert("color_temp".into(), (mireds as i64).into());
            }
            CURRENT_X_ATTR if data.len() >= 2 => {
                let x = u16::from_le_bytes([data[0], data[1]]);
                out.insert("color_x".into(), (x as i64).into());
            }
            CURRENT_Y_ATTR if data.len() >= 2 => {
                let y = u16::from_le_bytes([data[0], data[1]]);
                out.insert("color_y".into(), (y as i64).into());
            }
            _ => {}
        }
        out
    }

    fn report_config(&self) -> Vec<ReportConfig> {
        vec![ReportConfig {
            attr_id: COLOR_TEMP_ATTR,
            min_interval: 1,
            max_interval: 3600,
            reportable_change: 1,
        }]
    }

    fn poll_attributes(&self) -> Vec<u16> {
        vec![COLOR_TEMP_ATTR, CURRENT_X_ATTR, CURRENT_Y_ATTR]
    }
}

impl ColorHandler {
    #[must_use]
    pub fn move_to_color_temp(&self, mireds: u16, transition_time: u16) -> ColorCommand {
        ColorCommand::MoveToColorTemperature {
            color_temp_mireds: mireds,
            transition_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn on_off_attribute_updates_both_keys() {
        let mut h = OnOffHandler;
        let delta = h.attribute_updated(ON_OFF_ATTR, 0x10, &[0x01]);
        assert_eq!(delta.get("state_on").and_then(|v| v.as_bool()), Some(true));
        assert_eq!(delta.get("on").and_then(|v| v.as_bool()), Some(true));
    }

    #[test]
    fn level_scales_device_range_to_percent() {
        let mut h = LevelHandler;
        let delta = h.attribute_updated(CURRENT_LEVEL_ATTR, 0x20, &[254]);
        assert_eq!(delta.get("brightness").and_then(|v| v.as_f64()), Some(100.0));
    }

    #[test]
    fn move_to_level_converts_percent_back_to_wire_range() {
        let h = LevelHandler;
        match h.move_to_level(50, 10) {
            LevelCommand::MoveToLevelWithOnOff { level, .. } => assert_eq!(level, 127),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn color_temp_decodes_little_endian() {
        let mut h = ColorHandler;
        let delta = h.attribute_updated(COLOR_TEMP_ATTR, 0x21, &[0xF4, 0x01]);
        assert_eq!(delta.get("color_temp").and_then(|v| v.as_f64()), Some(500.0));
    }
}
