pub mod command;
pub mod dps;
pub mod entity;
pub mod metadata;
pub mod translator;

use serde::Deserialize;

/// Datapoint indices used by the floor-heating / air-conditioning units.
pub mod dp {
    pub const SWITCH: u8 = 1;
    pub const MODE: u8 = 2;
    pub const TARGET_TEMPERATURE: u8 = 16;
    pub const CURRENT_TEMPERATURE: u8 = 24;
    pub const FAN_LEVEL: u8 = 28;
    pub const HUMIDITY: u8 = 34;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HvacMode {
    #[default]
    Off,
    Heat,
    Cool,
    Auto,
    HeatCool,
    FanOnly,
}

impl HvacMode {
    pub const ALL: [HvacMode; 6] = [
        HvacMode::Off,
        HvacMode::Heat,
        HvacMode::Cool,
        HvacMode::Auto,
        HvacMode::HeatCool,
        HvacMode::FanOnly,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            HvacMode::Off => "off",
            HvacMode::Heat => "heat",
            HvacMode::Cool => "cool",
            HvacMode::Auto => "auto",
            HvacMode::HeatCool => "heat_cool",
            HvacMode::FanOnly => "fan_only",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

impl std::fmt::Display for HvacMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Abstract mode <-> device mode string. `Off` has no entry: it is expressed
/// through the switch datapoint instead.
pub const MODE_MAP: [(HvacMode, &str); 5] = [
    (HvacMode::Heat, "hot"),
    (HvacMode::Cool, "cold"),
    (HvacMode::Auto, "heat_floorheat"),
    (HvacMode::HeatCool, "floor_heat"),
    (HvacMode::FanOnly, "wind"),
];

/// Device string for a mode, `None` only for `Off`.
pub fn device_mode(mode: HvacMode) -> Option<&'static str> {
    MODE_MAP
        .iter()
        .find(|(m, _)| *m == mode)
        .map(|(_, device)| *device)
}

/// Mode for a device string. Unknown strings fall back to `Cool`.
pub fn mode_from_device(value: &str) -> HvacMode {
    MODE_MAP
        .iter()
        .find(|(_, device)| *device == value)
        .map(|(mode, _)| *mode)
        .unwrap_or(HvacMode::Cool)
}

/// Entity state derived from a device snapshot.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClimateState {
    pub hvac_mode: HvacMode,
    pub target_temperature: Option<f64>,
    pub current_temperature: Option<f64>,
    pub fan_mode: Option<String>,
    pub current_humidity: Option<f64>,
}
