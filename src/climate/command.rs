use super::HvacMode;
use super::translator::SetTemperature;

/// A climate intent received from the home automation side.
#[derive(Debug, Clone, PartialEq)]
pub enum ClimateCommand {
    SetTemperature(SetTemperature),
    SetHvacMode(HvacMode),
    SetFanMode(String),
    TurnOn,
    TurnOff,
}

impl ClimateCommand {
    /// Build a command from the last segment of a command topic and its payload.
    pub fn parse(field: &str, payload: &str) -> Option<Self> {
        let payload = payload.trim();
        match field {
            "mode" => HvacMode::parse(payload).map(Self::SetHvacMode),
            "temperature" => parse_set_temperature(payload).map(Self::SetTemperature),
            "fan_mode" if !payload.is_empty() => Some(Self::SetFanMode(payload.to_string())),
            "power" => match payload.to_ascii_lowercase().as_str() {
                "on" | "true" | "1" => Some(Self::TurnOn),
                "off" | "false" | "0" => Some(Self::TurnOff),
                _ => None,
            },
            _ => None,
        }
    }
}

// Either a bare number or a JSON object with `temperature` and/or `hvac_mode`.
fn parse_set_temperature(payload: &str) -> Option<SetTemperature> {
    if let Ok(celsius) = payload.parse::<f64>() {
        return celsius.is_finite().then_some(SetTemperature {
            temperature: Some(celsius),
            hvac_mode: None,
        });
    }
    serde_json::from_str(payload).ok()
}
