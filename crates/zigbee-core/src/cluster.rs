//! ZCL (Zigbee Cluster Library) cluster IDs, attribute IDs, and the small
//! per-cluster enums handlers translate raw values into.

/// Common ZCL cluster IDs.
pub mod id {
    // General Clusters
    pub const BASIC: u16 = 0x0000;
    pub const POWER_CONFIG: u16 = 0x0001;
    pub const DEVICE_TEMP: u16 = 0x0002;
    pub const IDENTIFY: u16 = 0x0003;
    pub const GROUPS: u16 = 0x0004;
    pub const SCENES: u16 = 0x0005;
    pub const ON_OFF: u16 = 0x0006;
    pub const ON_OFF_SWITCH_CONFIG: u16 = 0x0007;
    pub const LEVEL_CONTROL: u16 = 0x0008;
    pub const ALARMS: u16 = 0x0009;
    pub const TIME: u16 = 0x000A;

    // Closures Clusters
    pub const DOOR_LOCK: u16 = 0x0101;
    pub const WINDOW_COVERING: u16 = 0x0102;

    // HVAC Clusters
    pub const THERMOSTAT: u16 = 0x0201;
    pub const FAN_CONTROL: u16 = 0x0202;

    // Lighting Clusters
    pub const COLOR_CONTROL: u16 = 0x0300;
    pub const BALLAST_CONFIG: u16 = 0x0301;

    // Measurement Clusters
    pub const ILLUMINANCE_MEASUREMENT: u16 = 0x0400;
    pub const ILLUMINANCE_LEVEL_SENSING: u16 = 0x0401;
    pub const TEMPERATURE_MEASUREMENT: u16 = 0x0402;
    pub const PRESSURE_MEASUREMENT: u16 = 0x0403;
    pub const FLOW_MEASUREMENT: u16 = 0x0404;
    pub const HUMIDITY_MEASUREMENT: u16 = 0x0405;
    pub const OCCUPANCY_SENSING: u16 = 0x0406;

    // Diagnostics
    pub const DIAGNOSTICS: u16 = 0x0B05;

    // Security Clusters
    pub const IAS_ZONE: u16 = 0x0500;
    pub const IAS_ACE: u16 = 0x0501;
    pub const IAS_WD: u16 = 0x0502;

    // Smart Energy
    pub const METERING: u16 = 0x0702;
    pub const ELECTRICAL_MEASUREMENT: u16 = 0x0B04;

    // Commissioning
    pub const LIGHTLINK: u16 = 0x1000;

    // Manufacturer-specific
    pub const TUYA: u16 = 0xEF00;
}

/// Basic cluster attributes.
pub mod basic_attrs {
    pub const ZCL_VERSION: u16 = 0x0000;
    pub const APPLICATION_VERSION: u16 = 0x0001;
    pub const STACK_VERSION: u16 = 0x0002;
    pub const HW_VERSION: u16 = 0x0003;
    pub const MANUFACTURER_NAME: u16 = 0x0004;
    pub const MODEL_IDENTIFIER: u16 = 0x0005;
    pub const DATE_CODE: u16 = 0x0006;
    pub const POWER_SOURCE: u16 = 0x0007;
    pub const SW_BUILD_ID: u16 = 0x4000;
}

/// IAS Zone cluster attributes.
pub mod ias_zone_attrs {
    pub const ZONE_STATE: u16 = 0x0000;
    pub const ZONE_TYPE: u16 = 0x0001;
    pub const ZONE_STATUS: u16 = 0x0002;
    pub const CIE_ADDR: u16 = 0x0010;
    pub const ZONE_ID: u16 = 0x0011;
}

/// IAS Zone status bitmap bits.
pub mod ias_zone_status_bits {
    pub const ALARM1: u16 = 0x0001;
    pub const ALARM2: u16 = 0x0002;
    pub const TAMPER: u16 = 0x0004;
    pub const BATTERY_LOW: u16 = 0x0008;
    pub const SUPERVISION: u16 = 0x0010;
    pub const RESTORE: u16 = 0x0020;
    pub const TROUBLE: u16 = 0x0040;
    pub const AC_MAINS: u16 = 0x0080;
}

/// IAS Zone type codes, mapped to the zone-type string the data model
/// keys its zone-type-dependent state on.
#[must_use]
pub fn ias_zone_type_name(code: u16) -> &'static str {
    match code {
        0x0000 => "standard_cie",
        0x000D => "motion_sensor",
        0x0015 => "contact_switch",
        0x0028 => "fire_sensor",
        0x002A => "water_sensor",
        0x002B => "co_sensor",
        0x002C => "vibration_sensor",
        0x002D => "remote_control",
        0x010F => "key_fob",
        0x0115 => "keypad",
        0x021D => "standard_warning",
        0x0225 => "glass_break",
        0x0226 => "security_repeater",
        _ => "unknown",
    }
}

/// Window Covering cluster attributes.
pub mod window_covering_attrs {
    pub const COVERING_TYPE: u16 = 0x0000;
    pub const CURRENT_POSITION_LIFT: u16 = 0x0003;
    pub const CURRENT_POSITION_TILT: u16 = 0x0004;
    pub const CURRENT_POSITION_LIFT_PERCENTAGE: u16 = 0x0008;
    pub const CURRENT_POSITION_TILT_PERCENTAGE: u16 = 0x0009;
}

#[must_use]
pub fn covering_type_name(code: u8) -> &'static str {
    match code {
        0x00 => "rollershade",
        0x01 => "rollershade_2_motor",
        0x02 => "rollershade_exterior",
        0x03 => "rollershade_exterior_2_motor",
        0x04 => "drapery",
        0x05 => "awning",
        0x06 => "shutter",
        0x07 => "tilt_blind_tilt_only",
        0x08 => "tilt_blind_lift_and_tilt",
        0x09 => "projector_screen",
        _ => "unknown",
    }
}

/// Electrical Measurement cluster attributes: independent multiplier/
/// divisor pairs per quantity.
pub mod electrical_measurement_attrs {
    pub const RMS_VOLTAGE: u16 = 0x0505;
    pub const RMS_CURRENT: u16 = 0x0508;
    pub const ACTIVE_POWER: u16 = 0x050B;
    pub const AC_VOLTAGE_MULTIPLIER: u16 = 0x0600;
    pub const AC_VOLTAGE_DIVISOR: u16 = 0x0601;
    pub const AC_CURRENT_MULTIPLIER: u16 = 0x0602;
    pub const AC_CURRENT_DIVISOR: u16 = 0x0603;
    pub const AC_POWER_MULTIPLIER: u16 = 0x0604;
    pub const AC_POWER_DIVISOR: u16 = 0x0605;
}

/// Occupancy Sensing cluster attributes.
pub mod occupancy_attrs {
    pub const OCCUPANCY: u16 = 0x0000;
}

/// Diagnostics cluster attributes, used by the aggressive-reporting
/// telemetry fallback.
pub mod diagnostics_attrs {
    pub const LAST_MESSAGE_LQI: u16 = 0x011C;
}

/// Metering cluster attributes.
pub mod metering_attrs {
    pub const CURRENT_SUMMATION_DELIVERED: u16 = 0x0000;
    pub const MULTIPLIER: u16 = 0x0301;
    pub const DIVISOR: u16 = 0x0302;
    pub const INSTANTANEOUS_DEMAND: u16 = 0x0400;
}

/// LightLink cluster commands.
pub mod lightlink_commands {
    pub const GET_GROUP_IDENTIFIERS: u8 = 0x41;
}

/// On/Off cluster commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OnOffCommand {
    Off = 0x00,
    On = 0x01,
    Toggle = 0x02,
}

/// Level Control cluster commands.
#[derive(Debug, Clone)]
pub enum LevelCommand {
    MoveToLevel { level: u8, transition_time: u16 },
    Move { mode: u8, rate: u8 },
    Step { mode: u8, step_size: u8, transition_time: u16 },
    Stop,
    MoveToLevelWithOnOff { level: u8, transition_time: u16 },
}

/// Color Control cluster commands.
#[derive(Debug, Clone)]
pub enum ColorCommand {
    MoveToHue { hue: u8, direction: u8, transition_time: u16 },
    MoveToSaturation { saturation: u8, transition_time: u16 },
    MoveToHueAndSaturation { hue: u8, saturation: u8, transition_time: u16 },
    MoveToColor { x: u16, y: u16, transition_time: u16 },
    MoveToColorTemperature { color_temp_mireds: u16, transition_time: u16 },
}

/// Window Covering cluster commands.
#[derive(Debug, Clone, Copy)]
pub enum WindowCoveringCommand {
    UpOpen,
    DownClose,
    Stop,
    GoToLiftPercentage(u8),
    GoToTiltPercentage(u8),
}

impl OnOffCommand {
    #[must_use]
    pub fn command_id(self) -> u8 {
        self as u8
    }
}

impl LevelCommand {
    #[must_use]
    pub fn command_id(&self) -> u8 {
        match self {
            Self::MoveToLevel { .. } => 0x00,
            Self::Move { .. } => 0x01,
            Self::Step { .. } => 0x02,
            Self::Stop => 0x03,
            Self::MoveToLevelWithOnOff { .. } => 0x04,
        }
    }

    #[must_use]
    pub fn payload(&self) -> Vec<u8> {
        match *self {
            Self::MoveToLevel { level, transition_time }
            | Self::MoveToLevelWithOnOff { level, transition_time } => {
                let mut out = vec![level];
                out.extend_from_slice(&transition_time.to_le_bytes());
                out
            }
            Self::Move { mode, rate } => vec![mode, rate],
            Self::Step { mode, step_size, transition_time } => {
                let mut out = vec![mode, step_size];
                out.extend_from_slice(&transition_time.to_le_bytes());
                out
            }
            Self::Stop => Vec::new(),
        }
    }
}

impl ColorCommand {
    #[must_use]
    pub fn command_id(&self) -> u8 {
        match self {
            Self::MoveToHue { .. } => 0x00,
            Self::MoveToSaturation { .. } => 0x03,
            Self::MoveToHueAndSaturation { .. } => 0x06,
            Self::MoveToColor { .. } => 0x07,
            Self::MoveToColorTemperature { .. } => 0x0A,
        }
    }

    #[must_use]
    pub fn payload(&self) -> Vec<u8> {
        match *self {
            Self::MoveToHue { hue, direction, transition_time } => {
                let mut out = vec![hue, direction];
                out.extend_from_slice(&transition_time.to_le_bytes());
                out
            }
            Self::MoveToSaturation { saturation, transition_time } => {
                let mut out = vec![saturation];
                out.extend_from_slice(&transition_time.to_le_bytes());
                out
            }
            Self::MoveToHueAndSaturation { hue, saturation, transition_time } => {
                let mut out = vec![hue, saturation];
                out.extend_from_slice(&transition_time.to_le_bytes());
                out
            }
            Self::MoveToColor { x, y, transition_time } => {
                let mut out = Vec::with_capacity(6);
                out.extend_from_slice(&x.to_le_bytes());
                out.extend_from_slice(&y.to_le_bytes());
                out.extend_from_slice(&transition_time.to_le_bytes());
                out
            }
            Self::MoveToColorTemperature { color_temp_mireds, transition_time } => {
                let mut out = Vec::with_capacity(4);
                out.extend_from_slice(&color_temp_mireds.to_le_bytes());
                out.extend_from_slice(&transition_time.to_le_bytes());
                out
            }
        }
    }
}

impl WindowCoveringCommand {
    #[must_use]
    pub fn command_id(self) -> u8 {
        match self {
            Self::UpOpen => 0x00,
            Self::DownClose => 0x01,
            Self::Stop => 0x02,
            Self::GoToLiftPercentage(_) => 0x05,
            Self::GoToTiltPercentage(_) => 0x08,
        }
    }

    #[must_use]
    pub fn payload(self) -> Vec<u8> {
        match self {
            Self::GoToLiftPercentage(p) | Self::GoToTiltPercentage(p) => vec![p],
            _ => Vec::new(),
        }
    }
}
