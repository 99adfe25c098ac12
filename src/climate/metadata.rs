use super::HvacMode;

// https://developers.home-assistant.io/docs/core/entity/climate#supported-features
pub const SUPPORT_TARGET_TEMPERATURE: u32 = 1;
pub const SUPPORT_FAN_MODE: u32 = 8;
pub const SUPPORT_TURN_OFF: u32 = 128;
pub const SUPPORT_TURN_ON: u32 = 256;

pub const FAN_MODES: [&str; 6] = ["1", "2", "3", "4", "5", "auto"];

/// What the climate entity declares to the home automation platform.
#[derive(Debug, Clone, PartialEq)]
pub struct ClimateMetadata {
    pub supported_features: u32,
    pub hvac_modes: &'static [HvacMode],
    pub fan_modes: &'static [&'static str],
    pub min_temp: f64,
    pub max_temp: f64,
    pub temp_step: f64,
    pub precision: f64,
    pub temperature_unit: &'static str,
}

pub const CLIMATE: ClimateMetadata = ClimateMetadata {
    supported_features: SUPPORT_TARGET_TEMPERATURE
        | SUPPORT_FAN_MODE
        | SUPPORT_TURN_OFF
        | SUPPORT_TURN_ON,
    hvac_modes: &HvacMode::ALL,
    fan_modes: &FAN_MODES,
    min_temp: 15.0,
    max_temp: 40.0,
    temp_step: 0.5,
    precision: 0.1,
    temperature_unit: "C",
};
