mod bridge;
mod climate;
mod config;
mod error;
mod mqtt;
mod tuya;

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::climate::command::ClimateCommand;
use crate::climate::entity::ClimateEntity;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match config::Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Starting tuya-climate-mqtt bridge (mqtt={}:{}, devices={})",
        config.mqtt.broker_host,
        config.mqtt.broker_port,
        config.devices.len(),
    );

    for device in &config.devices {
        info!(
            "  Device: {} ({}) at {}, protocol {}, power dp {}",
            device.name, device.id, device.ip, device.version, device.switch_dp,
        );
    }

    // Channels
    let (mqtt_cmd_tx, mut mqtt_cmd_rx) = mpsc::channel::<mqtt::client::MqttMessage>(100);
    let (state_tx, state_rx) = mpsc::channel::<mqtt::StateUpdate>(200);

    // Create MQTT client and spawn event loop (handles both MQTT I/O and state publishing)
    let mqtt_client = mqtt::client::MqttClient::new(&config);
    let mqtt_handle = tokio::spawn(async move {
        mqtt_client.run(mqtt_cmd_tx, state_rx).await;
    });

    // Per-device climate command channels, keyed by topic_name for routing
    let mut climate_cmd_txs: HashMap<String, mpsc::Sender<ClimateCommand>> = HashMap::new();

    let poll_interval = Duration::from_secs(config.tuya.poll_interval_secs);
    let mut handles = Vec::new();

    for device_config in &config.devices {
        let (dev_cmd_tx, dev_cmd_rx) = mpsc::channel::<tuya::DpCommand>(50);
        let (status_tx, status_rx) = mpsc::channel::<tuya::DeviceStatus>(50);
        let (climate_cmd_tx, climate_cmd_rx) = mpsc::channel::<ClimateCommand>(50);
        climate_cmd_txs.insert(device_config.topic_name.clone(), climate_cmd_tx);

        let client = tuya::client::TuyaClient::new(device_config.clone());
        handles.push(tokio::spawn(client.run(status_tx, dev_cmd_rx, poll_interval)));

        let entity = ClimateEntity::new(
            tuya::DeviceHandle::new(dev_cmd_tx),
            device_config.switch_dp.clone(),
        );
        handles.push(tokio::spawn(bridge::run_climate(
            entity,
            device_config.topic_name.clone(),
            status_rx,
            climate_cmd_rx,
            state_tx.clone(),
        )));
    }

    // Drop the original sender so the channel closes when all entity tasks finish
    drop(state_tx);

    let topic_prefix = config.mqtt.topic_prefix.clone();

    // Main loop: route MQTT commands to climate entities + handle shutdown
    loop {
        tokio::select! {
            Some(msg) = mqtt_cmd_rx.recv() => {
                route_command(&msg, &topic_prefix, &climate_cmd_txs).await;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT, shutting down");
                break;
            }
            _ = async {
                match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        sigterm.recv().await;
                    }
                    Err(e) => {
                        error!("Failed to register SIGTERM handler: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            } => {
                info!("Received SIGTERM, shutting down");
                break;
            }
        }
    }

    // Cleanup
    for handle in handles {
        handle.abort();
    }
    mqtt_handle.abort();
    info!("tuya-climate-mqtt bridge stopped");
}

async fn route_command(
    msg: &mqtt::client::MqttMessage,
    topic_prefix: &str,
    climate_cmd_txs: &HashMap<String, mpsc::Sender<ClimateCommand>>,
) {
    // Parse topic: {prefix}/{topic_name}/command/{field}
    let Some((topic_name, field)) = parse_command_topic(&msg.topic, topic_prefix) else {
        return;
    };
    let Some(cmd_tx) = climate_cmd_txs.get(topic_name) else {
        warn!("Unknown device in command topic: {}", topic_name);
        return;
    };
    let Some(cmd) = ClimateCommand::parse(field, &msg.payload) else {
        warn!("Could not build command: field={}, value={}", field, msg.payload);
        return;
    };
    if cmd_tx.send(cmd).await.is_err() {
        warn!("Command channel closed for device {}", topic_name);
    }
}

/// Parse a command topic into (topic_name, field).
/// Expected format: {prefix}/{topic_name}/command/{field}
fn parse_command_topic<'a>(topic: &'a str, prefix: &str) -> Option<(&'a str, &'a str)> {
    let rest = topic.strip_prefix(prefix)?.strip_prefix('/')?;
    // rest = "{topic_name}/command/{field}"
    let (topic_name, rest) = rest.split_once('/')?;
    let field = rest.strip_prefix("command/")?;
    if topic_name.is_empty() || field.is_empty() {
        return None;
    }
    Some((topic_name, field))
}
