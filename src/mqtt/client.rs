use std::collections::HashMap;

use rumqttc::{AsyncClient, ConnectionError, Event, EventLoop, Incoming, MqttOptions, QoS};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::climate::metadata::CLIMATE;
use crate::config::Config;

use super::discovery::ClimateDiscovery;
use super::{StateUpdate, is_retained, next_payload, state_fields};

pub struct MqttMessage {
    pub topic: String,
    pub payload: String,
}

pub struct MqttClient {
    client: AsyncClient,
    eventloop: EventLoop,
    config: Config,
}

impl MqttClient {
    pub fn new(config: &Config) -> Self {
        let mut mqttopts = MqttOptions::new(
            &config.mqtt.client_id,
            &config.mqtt.broker_host,
            config.mqtt.broker_port,
        );
        mqttopts.set_keep_alive(std::time::Duration::from_secs(30));

        if let (Some(user), Some(pass)) = (&config.mqtt.username, &config.mqtt.password) {
            mqttopts.set_credentials(user, pass);
        }

        // LWT: publish "offline" on disconnect. Discovery lists this topic among
        // each device's availability topics.
        let lwt = rumqttc::LastWill::new(
            config.lwt_topic(),
            "offline".as_bytes().to_vec(),
            QoS::AtLeastOnce,
            true,
        );
        mqttopts.set_last_will(lwt);

        let (client, eventloop) = AsyncClient::new(mqttopts, 100);

        Self {
            client,
            eventloop,
            config: config.clone(),
        }
    }

    /// Run the MQTT event loop. On connect, announces each climate device via
    /// discovery and subscribes to its command topics; forwards incoming publish
    /// messages through command_tx, and publishes climate state from state_rx.
    pub async fn run(
        self,
        command_tx: mpsc::Sender<MqttMessage>,
        mut state_rx: mpsc::Receiver<StateUpdate>,
    ) {
        let Self {
            client,
            mut eventloop,
            config,
        } = self;
        let mut publisher = Publisher::new(client, config);

        loop {
            tokio::select! {
                event = eventloop.poll() => {
                    publisher.handle_event(event, &command_tx).await;
                }
                Some(update) = state_rx.recv() => {
                    for (field, value) in state_fields(&update.state) {
                        if !publisher.publish_state(&update.topic_name, field, value).await {
                            continue;
                        }
                        // Drive the event loop to immediately flush this publish to the socket
                        let event = eventloop.poll().await;
                        publisher.handle_event(event, &command_tx).await;
                    }
                }
            }
        }
    }
}

/// The publishing half of the connection. Kept apart from the `EventLoop`
/// so it can be borrowed across awaits while the loop is polled.
struct Publisher {
    client: AsyncClient,
    config: Config,
    subscribe_topics: Vec<String>,
    last_values: HashMap<String, String>,
}

impl Publisher {
    fn new(client: AsyncClient, config: Config) -> Self {
        let subscribe_topics = config
            .devices
            .iter()
            .map(|d| config.device_command_topic(&d.topic_name))
            .collect();
        Self {
            client,
            config,
            subscribe_topics,
            last_values: HashMap::new(),
        }
    }

    /// Every event polled from the loop goes through here, whichever poll
    /// site produced it.
    async fn handle_event(
        &mut self,
        event: Result<Event, ConnectionError>,
        command_tx: &mpsc::Sender<MqttMessage>,
    ) {
        match event {
            Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                info!("Connected to MQTT broker");
                self.announce().await;
                // Retained state may have been lost with the broker; republish everything.
                self.last_values.clear();
            }
            Ok(Event::Incoming(Incoming::Publish(publish))) => {
                forward(command_tx, &publish).await;
            }
            Ok(_) => {}
            Err(e) => {
                error!("MQTT connection error: {}. Reconnecting...", e);
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            }
        }
    }

    /// Publish one state field if it changed. Returns whether anything was sent.
    async fn publish_state(
        &mut self,
        topic_name: &str,
        field: &'static str,
        value: Option<String>,
    ) -> bool {
        let cache_key = format!("{topic_name}/{field}");
        let Some(payload) = next_payload(self.last_values.get(&cache_key), value.as_ref()) else {
            return false;
        };
        let topic = self.config.device_state_topic(topic_name, field);
        info!("Publishing {}: {}", topic, payload);
        if let Err(e) = self
            .client
            .publish(&topic, QoS::AtMostOnce, is_retained(field), payload.into_bytes())
            .await
        {
            // Not cached, so the next update retries it.
            warn!("Failed to publish {}: {}", topic, e);
            return false;
        }
        match value {
            Some(value) => {
                self.last_values.insert(cache_key, value);
            }
            None => {
                self.last_values.remove(&cache_key);
            }
        }
        true
    }

    /// Publish availability and discovery for every device, then subscribe
    /// to command topics.
    async fn announce(&self) {
        let mut status_topics: Vec<String> = self
            .config
            .devices
            .iter()
            .map(|d| self.config.device_status_topic(&d.topic_name))
            .collect();
        let lwt = self.config.lwt_topic();
        if !status_topics.contains(&lwt) {
            status_topics.push(lwt);
        }
        for topic in &status_topics {
            if let Err(e) = self
                .client
                .publish(topic, QoS::AtLeastOnce, true, "online")
                .await
            {
                error!("Failed to publish online status: {}", e);
            }
        }

        for device in &self.config.devices {
            let discovery = ClimateDiscovery::new(&self.config, device, &CLIMATE);
            let topic = self.config.discovery_topic(&device.topic_name);
            match serde_json::to_vec(&discovery) {
                Ok(payload) => {
                    debug!("Publishing discovery for {} on {}", device.name, topic);
                    if let Err(e) = self
                        .client
                        .publish(&topic, QoS::AtLeastOnce, true, payload)
                        .await
                    {
                        error!("Failed to publish discovery for {}: {}", device.name, e);
                    }
                }
                Err(e) => error!("Failed to encode discovery for {}: {}", device.name, e),
            }
        }

        for topic in &self.subscribe_topics {
            if let Err(e) = self.client.subscribe(topic, QoS::AtLeastOnce).await {
                error!("Failed to subscribe to {}: {}", topic, e);
            }
        }
    }
}

async fn forward(command_tx: &mpsc::Sender<MqttMessage>, publish: &rumqttc::Publish) {
    let msg = MqttMessage {
        topic: publish.topic.clone(),
        payload: String::from_utf8_lossy(&publish.payload).to_string(),
    };
    if command_tx.send(msg).await.is_err() {
        warn!("Command channel closed");
    }
}

#[cfg(test)]
mod tests {
    use rumqttc::{ConnAck, ConnectReturnCode, Publish};

    use super::*;
    use crate::config::{DeviceConfig, MqttConfig, TuyaConfig};

    fn config() -> Config {
        Config {
            mqtt: MqttConfig {
                broker_host: "localhost".into(),
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
                name: "ac".into(),
                topic_name: "ac".into(),
                version: "3.3".into(),
                switch_dp: "1".into(),
            }],
        }
    }

    // The event loop is returned so its request queue stays open.
    fn publisher() -> (Publisher, EventLoop) {
        let config = config();
        let (client, eventloop) =
            AsyncClient::new(MqttOptions::new("test", "localhost", 1883), 10);
        (Publisher::new(client, config), eventloop)
    }

    fn connack() -> Result<Event, ConnectionError> {
        Ok(Event::Incoming(Incoming::ConnAck(ConnAck {
            session_present: false,
            code: ConnectReturnCode::Success,
        })))
    }

    #[tokio::test]
    async fn reconnect_resets_published_cache() {
        let (mut publisher, _eventloop) = publisher();
        let (command_tx, _command_rx) = mpsc::channel(1);

        assert!(publisher.publish_state("ac", "mode", Some("heat".into())).await);
        assert!(!publisher.publish_state("ac", "mode", Some("heat".into())).await);

        // A ConnAck can come out of either poll site; both route here.
        publisher.handle_event(connack(), &command_tx).await;
        assert!(publisher.last_values.is_empty());
        assert!(publisher.publish_state("ac", "mode", Some("heat".into())).await);
    }

    #[tokio::test]
    async fn incoming_publish_is_forwarded() {
        let (mut publisher, _eventloop) = publisher();
        let (command_tx, mut command_rx) = mpsc::channel(1);

        let publish = Publish::new("tuya/ac/command/mode", QoS::AtLeastOnce, "cool");
        publisher
            .handle_event(Ok(Event::Incoming(Incoming::Publish(publish))), &command_tx)
            .await;

        let msg = command_rx.recv().await.unwrap();
        assert_eq!(msg.topic, "tuya/ac/command/mode");
        assert_eq!(msg.payload, "cool");
    }

    #[tokio::test]
    async fn failed_publish_is_not_cached() {
        let (mut publisher, eventloop) = publisher();
        drop(eventloop);

        assert!(!publisher.publish_state("ac", "fan_mode", Some("3".into())).await);
        assert!(publisher.last_values.is_empty());
    }

    #[tokio::test]
    async fn cleared_field_is_forgotten() {
        let (mut publisher, _eventloop) = publisher();

        assert!(publisher.publish_state("ac", "fan_mode", Some("3".into())).await);
        assert!(publisher.publish_state("ac", "fan_mode", None).await);
        assert!(!publisher.last_values.contains_key("ac/fan_mode"));
        assert!(!publisher.publish_state("ac", "fan_mode", None).await);
    }
}
