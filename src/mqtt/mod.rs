pub mod client;
pub mod discovery;

use crate::climate::ClimateState;

/// A freshly projected climate state, ready to publish to MQTT.
pub struct StateUpdate {
    pub topic_name: String,
    pub state: ClimateState,
}

/// Measurements change constantly and are not retained.
pub fn is_retained(field: &str) -> bool {
    !matches!(field, "current_temperature" | "current_humidity")
}

/// Flatten a state into (field, payload) pairs; `None` for unknown values.
pub fn state_fields(state: &ClimateState) -> [(&'static str, Option<String>); 5] {
    [
        ("mode", Some(state.hvac_mode.to_string())),
        (
            "target_temperature",
            state.target_temperature.map(|t| t.to_string()),
        ),
        (
            "current_temperature",
            state.current_temperature.map(|t| t.to_string()),
        ),
        ("fan_mode", state.fan_mode.clone()),
        (
            "current_humidity",
            state.current_humidity.map(|h| h.to_string()),
        ),
    ]
}

/// What to publish for a field given what was last published, if anything.
/// A value that went unknown is cleared with an empty payload, which also
/// drops the retained message.
pub fn next_payload(last: Option<&String>, value: Option<&String>) -> Option<String> {
    match (last, value) {
        (Some(last), Some(value)) if last == value => None,
        (_, Some(value)) => Some(value.clone()),
        (Some(_), None) => Some(String::new()),
        (None, None) => None,
    }
}
