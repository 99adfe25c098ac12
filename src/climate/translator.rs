//! Pure translation between climate intents/state and device datapoints.
//!
//! Nothing here performs I/O or validates ranges: bounds in
//! [`super::metadata`] are advisory for the platform only.

use serde::Deserialize;
use serde_json::Value;

use super::dps::Dps;
use super::{ClimateState, HvacMode, device_mode, dp, mode_from_device};

/// Arguments of a set-temperature request. Either field may be absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct SetTemperature {
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub hvac_mode: Option<HvacMode>,
}

pub fn set_temperature(request: &SetTemperature) -> Dps {
    let mut dps = Dps::new();
    if let Some(celsius) = request.temperature {
        dps.insert(dp::TARGET_TEMPERATURE, encode_temperature(celsius));
    }
    if let Some(mode) = request.hvac_mode {
        insert_mode(&mut dps, mode);
    }
    dps
}

pub fn set_mode(mode: HvacMode) -> Dps {
    let mut dps = Dps::new();
    insert_mode(&mut dps, mode);
    dps
}

pub fn set_fan_level(level: &str) -> Dps {
    let mut dps = Dps::new();
    dps.insert(dp::FAN_LEVEL, level);
    dps
}

/// Payload for the entity's own on/off datapoint.
pub fn turn_on(switch_dp: &str) -> Dps {
    power(switch_dp, true)
}

pub fn turn_off(switch_dp: &str) -> Dps {
    power(switch_dp, false)
}

fn power(switch_dp: &str, on: bool) -> Dps {
    let mut dps = Dps::new();
    dps.insert_id(switch_dp, on);
    dps
}

fn insert_mode(dps: &mut Dps, mode: HvacMode) {
    dps.insert(dp::SWITCH, mode != HvacMode::Off);
    if let Some(device) = device_mode(mode) {
        dps.insert(dp::MODE, device);
    }
}

pub fn encode_temperature(celsius: f64) -> i64 {
    (celsius * 10.0).round() as i64
}

pub fn decode_temperature(raw: &Value) -> Option<f64> {
    raw.as_f64().map(|tenths| tenths / 10.0)
}

/// Derive the full entity state from a snapshot. Missing fields become `None`.
pub fn project_status(snapshot: &Dps) -> ClimateState {
    let switched_on = snapshot
        .get(dp::SWITCH)
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let hvac_mode = if switched_on {
        let device = snapshot.get(dp::MODE).and_then(Value::as_str).unwrap_or("");
        mode_from_device(device)
    } else {
        HvacMode::Off
    };

    ClimateState {
        hvac_mode,
        target_temperature: snapshot
            .get(dp::TARGET_TEMPERATURE)
            .and_then(decode_temperature),
        current_temperature: snapshot
            .get(dp::CURRENT_TEMPERATURE)
            .and_then(decode_temperature),
        fan_mode: snapshot.get(dp::FAN_LEVEL).and_then(token),
        current_humidity: snapshot.get(dp::HUMIDITY).and_then(Value::as_f64),
    }
}

// Some firmwares report the fan level as a bare number.
fn token(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
