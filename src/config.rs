use serde::Deserialize;
use std::env;
use std::net::IpAddr;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub mqtt: MqttConfig,
    pub tuya: TuyaConfig,
    pub devices: Vec<DeviceConfig>,
}

#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub topic_prefix: String,
    pub client_id: String,
    pub discovery_prefix: String,
}

#[derive(Debug, Clone)]
pub struct TuyaConfig {
    pub poll_interval_secs: u64,
}

#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub id: String,
    pub key: String,
    pub ip: IpAddr,
    pub name: String,
    /// Sanitized name for use in MQTT topics (lowercase, spaces to underscores)
    pub topic_name: String,
    pub version: String,
    /// The climate entity's own on/off datapoint
    pub switch_dp: String,
}

// Serde struct for parsing tinytuya device listing JSON
#[derive(Deserialize)]
struct RawDevice {
    id: String,
    key: String,
    #[serde(default)]
    ip: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    switch_dp: Option<String>,
}

const DEFAULT_PROTOCOL_VERSION: &str = "3.3";
const DEFAULT_SWITCH_DP: &str = "1";

fn env_required(key: &str) -> Result<String> {
    env::var(key).map_err(|_| Error::Config(format!("{key} environment variable is required")))
}

fn env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let devices_file = env_or_default("DEVICES_FILE", "devices.json".to_string());
        let devices = load_devices(&devices_file)?;

        let config = Self {
            mqtt: MqttConfig {
                broker_host: env_required("MQTT_BROKER_HOST")?,
                broker_port: env_or_default("MQTT_BROKER_PORT", 1883),
                username: env_optional("MQTT_USERNAME"),
                password: env_optional("MQTT_PASSWORD"),
                topic_prefix: env_or_default("MQTT_TOPIC_PREFIX", "tuya".to_string()),
                client_id: env_or_default("MQTT_CLIENT_ID", "tuya-climate-mqtt".to_string()),
                discovery_prefix: env_or_default(
                    "HA_DISCOVERY_PREFIX",
                    "homeassistant".to_string(),
                ),
            },
            tuya: TuyaConfig {
                poll_interval_secs: env_or_default("TUYA_POLL_INTERVAL_SECS", 30),
            },
            devices,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.mqtt.broker_host.is_empty() {
            return Err(Error::Config("MQTT_BROKER_HOST must not be empty".into()));
        }
        if self.devices.is_empty() {
            return Err(Error::Config("No devices found in devices file".into()));
        }
        if self.tuya.poll_interval_secs == 0 {
            return Err(Error::Config("TUYA_POLL_INTERVAL_SECS must be > 0".into()));
        }
        Ok(())
    }

    pub fn device_status_topic(&self, topic_name: &str) -> String {
        format!("{}/{}/bridge_status", self.mqtt.topic_prefix, topic_name)
    }

    /// Last-will topic: the device's own status topic for single-device setups,
    /// a bridge-wide topic otherwise.
    pub fn lwt_topic(&self) -> String {
        match self.devices.as_slice() {
            [only] => self.device_status_topic(&only.topic_name),
            _ => format!("{}/bridge_status", self.mqtt.topic_prefix),
        }
    }

    /// Topics a device's availability depends on: its own status topic plus
    /// the last-will topic when that is a separate bridge-wide one.
    pub fn availability_topics(&self, topic_name: &str) -> Vec<String> {
        let own = self.device_status_topic(topic_name);
        let lwt = self.lwt_topic();
        if lwt == own { vec![own] } else { vec![own, lwt] }
    }

    pub fn device_command_topic(&self, topic_name: &str) -> String {
        format!("{}/{}/command/#", self.mqtt.topic_prefix, topic_name)
    }

    pub fn device_state_topic(&self, topic_name: &str, field: &str) -> String {
        format!("{}/{}/state/{}", self.mqtt.topic_prefix, topic_name, field)
    }

    pub fn discovery_topic(&self, topic_name: &str) -> String {
        format!("{}/climate/{}/config", self.mqtt.discovery_prefix, topic_name)
    }
}

fn load_devices(path: &str) -> Result<Vec<DeviceConfig>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read {path}: {e}")))?;
    parse_devices(&content).map_err(|e| match e {
        Error::Config(msg) => Error::Config(format!("{path}: {msg}")),
        other => other,
    })
}

fn parse_devices(content: &str) -> Result<Vec<DeviceConfig>> {
    let raw_devices: Vec<RawDevice> = serde_json::from_str(content)
        .map_err(|e| Error::Config(format!("Failed to parse devices: {e}")))?;

    raw_devices
        .into_iter()
        .map(|raw| {
            let ip: IpAddr = raw
                .ip
                .as_deref()
                .filter(|ip| !ip.is_empty())
                .ok_or_else(|| Error::Config(format!("Device {} missing 'ip' field", raw.id)))?
                .parse()
                .map_err(|e| Error::Config(format!("Device {} invalid IP: {e}", raw.id)))?;

            let name = raw.name.unwrap_or_else(|| raw.id.clone());
            let topic_name = sanitize_topic_name(&name);

            Ok(DeviceConfig {
                name,
                id: raw.id,
                key: raw.key,
                ip,
                topic_name,
                version: raw
                    .version
                    .filter(|v| !v.is_empty())
                    .unwrap_or_else(|| DEFAULT_PROTOCOL_VERSION.to_string()),
                switch_dp: raw
                    .switch_dp
                    .unwrap_or_else(|| DEFAULT_SWITCH_DP.to_string()),
            })
        })
        .collect()
}

/// Convert a device name into a safe MQTT topic segment.
/// "Living Room AC" → "living_room_ac"
fn sanitize_topic_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim_matches('_')
        .to_string()
}
