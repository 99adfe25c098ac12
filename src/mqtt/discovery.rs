//! Home Assistant MQTT discovery document for a climate device.

use serde::Serialize;

use crate::climate::metadata::ClimateMetadata;
use crate::config::{Config, DeviceConfig};

#[derive(Debug, Serialize)]
pub struct DeviceInfo {
    pub identifiers: Vec<String>,
    pub name: String,
    pub manufacturer: &'static str,
}

#[derive(Debug, Serialize)]
pub struct Availability {
    pub topic: String,
}

#[derive(Debug, Serialize)]
pub struct ClimateDiscovery {
    pub name: Option<String>,
    pub unique_id: String,
    pub availability: Vec<Availability>,
    /// Online only while every availability topic says so.
    pub availability_mode: &'static str,
    pub mode_state_topic: String,
    pub mode_command_topic: String,
    pub modes: Vec<&'static str>,
    pub temperature_state_topic: String,
    pub temperature_command_topic: String,
    pub current_temperature_topic: String,
    pub current_humidity_topic: String,
    pub fan_mode_state_topic: String,
    pub fan_mode_command_topic: String,
    pub fan_modes: Vec<&'static str>,
    pub power_command_topic: String,
    pub payload_on: &'static str,
    pub payload_off: &'static str,
    pub min_temp: f64,
    pub max_temp: f64,
    pub temp_step: f64,
    pub precision: f64,
    pub temperature_unit: &'static str,
    pub device: DeviceInfo,
}

impl ClimateDiscovery {
    pub fn new(config: &Config, device: &DeviceConfig, metadata: &ClimateMetadata) -> Self {
        let topic = |kind: &str, field: &str| {
            format!("{}/{}/{}/{}", config.mqtt.topic_prefix, device.topic_name, kind, field)
        };

        Self {
            // The entity takes the device name
            name: None,
            unique_id: format!("tuya_{}_climate", device.id),
            availability: config
                .availability_topics(&device.topic_name)
                .into_iter()
                .map(|topic| Availability { topic })
                .collect(),
            availability_mode: "all",
            mode_state_topic: topic("state", "mode"),
            mode_command_topic: topic("command", "mode"),
            modes: metadata.hvac_modes.iter().map(|m| m.as_str()).collect(),
            temperature_state_topic: topic("state", "target_temperature"),
            temperature_command_topic: topic("command", "temperature"),
            current_temperature_topic: topic("state", "current_temperature"),
            current_humidity_topic: topic("state", "current_humidity"),
            fan_mode_state_topic: topic("state", "fan_mode"),
            fan_mode_command_topic: topic("command", "fan_mode"),
            fan_modes: metadata.fan_modes.to_vec(),
            power_command_topic: topic("command", "power"),
            payload_on: "ON",
            payload_off: "OFF",
            min_temp: metadata.min_temp,
            max_temp: metadata.max_temp,
            temp_step: metadata.temp_step,
            precision: metadata.precision,
            temperature_unit: metadata.temperature_unit,
            device: DeviceInfo {
                identifiers: vec![format!("tuya_{}", device.id)],
                name: device.name.clone(),
                manufacturer: "Tuya",
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::climate::metadata::CLIMATE;
    use crate::config::{MqttConfig, TuyaConfig};

    fn config() -> Config {
        Config {
            mqtt: MqttConfig {
                broker_host: "broker".into(),
                broker_port: 1883,
                username: None,
                password: None,
                topic_prefix: "tuya".into(),
                client_id: "test".into(),
                discovery_prefix: "homeassistant".into(),
            },
            tuya: TuyaConfig {
                poll_interval_secs: 30,
            },
            devices: vec![DeviceConfig {
                id: "bf01".into(),
                key: "k".into(),
                ip: "10.0.0.2".parse().unwrap(),
                name: "Living Room AC".into(),
                topic_name: "living_room_ac".into(),
                version: "3.3".into(),
                switch_dp: "1".into(),
            }],
        }
    }

    #[test]
    fn discovery_document() {
        let config = config();
        let doc = ClimateDiscovery::new(&config, &config.devices[0], &CLIMATE);
        let json = serde_json::to_value(&doc).unwrap();

        assert_eq!(json["unique_id"], "tuya_bf01_climate");
        assert_eq!(
            json["availability"],
            serde_json::json!([{"topic": "tuya/living_room_ac/bridge_status"}])
        );
        assert_eq!(json["availability_mode"], "all");
        assert_eq!(json["mode_command_topic"], "tuya/living_room_ac/command/mode");
        assert_eq!(
            json["temperature_state_topic"],
            "tuya/living_room_ac/state/target_temperature"
        );
        assert_eq!(
            json["modes"],
            serde_json::json!(["off", "heat", "cool", "auto", "heat_cool", "fan_only"])
        );
        assert_eq!(json["fan_modes"][5], "auto");
        assert_eq!(json["min_temp"], 15.0);
        assert_eq!(json["max_temp"], 40.0);
        assert_eq!(json["temp_step"], 0.5);
        assert_eq!(json["temperature_unit"], "C");
        assert!(json["name"].is_null());
    }

    #[test]
    fn multi_device_discovery_watches_the_last_will() {
        let mut config = config();
        let mut second = config.devices[0].clone();
        second.id = "bf02".into();
        second.topic_name = "bedroom_ac".into();
        config.devices.push(second);

        let lwt = config.lwt_topic();
        for device in &config.devices {
            let doc = ClimateDiscovery::new(&config, device, &CLIMATE);
            let topics: Vec<&str> = doc.availability.iter().map(|a| a.topic.as_str()).collect();
            assert!(topics.contains(&lwt.as_str()), "{topics:?} misses {lwt}");
            assert!(topics.contains(&config.device_status_topic(&device.topic_name).as_str()));
        }
    }
}
