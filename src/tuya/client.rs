use std::time::Duration;

use rust_async_tuyapi::mesparse::{CommandType, Message};
use rust_async_tuyapi::tuyadevice::TuyaDevice;
use rust_async_tuyapi::{Payload, PayloadStruct};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::climate::dps::Dps;
use crate::config::DeviceConfig;
use crate::error::{Error, Result};

use super::{DeviceStatus, DpCommand};

pub struct TuyaClient {
    config: DeviceConfig,
    snapshot: Dps,
}

impl TuyaClient {
    pub fn new(config: DeviceConfig) -> Self {
        Self {
            config,
            snapshot: Dps::new(),
        }
    }

    /// Main device loop. Connects, polls, handles commands, reconnects on failure.
    /// The merged snapshot survives reconnects.
    pub async fn run(
        mut self,
        status_tx: mpsc::Sender<DeviceStatus>,
        mut cmd_rx: mpsc::Receiver<DpCommand>,
        poll_interval: Duration,
    ) {
        let mut backoff = Duration::from_secs(5);
        let max_backoff = Duration::from_secs(60);

        loop {
            info!(
                "Connecting to device {} ({}) at {} (protocol {})",
                self.config.name, self.config.id, self.config.ip, self.config.version
            );

            match self.run_session(&status_tx, &mut cmd_rx, poll_interval).await {
                Ok(()) => {
                    info!("Device {} session ended cleanly", self.config.name);
                    backoff = Duration::from_secs(5);
                }
                Err(Error::ChannelClosed(what)) => {
                    info!("Device {} stopping: {} channel closed", self.config.name, what);
                    return;
                }
                Err(e) => {
                    error!(
                        "Device {} session error: {}. Reconnecting in {:?}",
                        self.config.name, e, backoff
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(max_backoff);
                }
            }
        }
    }

    async fn run_session(
        &mut self,
        status_tx: &mpsc::Sender<DeviceStatus>,
        cmd_rx: &mut mpsc::Receiver<DpCommand>,
        poll_interval: Duration,
    ) -> Result<()> {
        let mut device = TuyaDevice::new(
            &self.config.version,
            &self.config.id,
            Some(&self.config.key),
            self.config.ip,
        )
        .map_err(|e| Error::Device(format!("Failed to create device: {e:?}")))?;

        let mut receiver = device
            .connect()
            .await
            .map_err(|e| Error::Device(format!("Failed to connect: {e:?}")))?;

        info!("Connected to device {}", self.config.name);

        // Initial DP query
        self.query_all_dps(&mut device).await?;

        let mut heartbeat_interval = tokio::time::interval(Duration::from_secs(10));
        let mut poll_timer = tokio::time::interval(poll_interval);
        // Skip first tick (we already queried)
        poll_timer.tick().await;

        loop {
            tokio::select! {
                _ = heartbeat_interval.tick() => {
                    device.heartbeat().await
                        .map_err(|e| Error::Device(format!("Heartbeat failed: {e:?}")))?;
                }
                _ = poll_timer.tick() => {
                    self.query_all_dps(&mut device).await?;
                }
                msg = receiver.recv() => {
                    match msg {
                        Some(Ok(messages)) => {
                            for m in messages {
                                if m.command == Some(CommandType::HeartBeat) {
                                    continue;
                                }
                                self.process_message(&m, status_tx).await?;
                            }
                        }
                        Some(Err(e)) => {
                            return Err(Error::Device(format!("Device error: {e:?}")));
                        }
                        None => {
                            return Err(Error::Device("Device channel closed".into()));
                        }
                    }
                }
                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else {
                        return Err(Error::ChannelClosed("device command"));
                    };
                    info!("Sending command to {}: {}", self.config.name, cmd.dps);
                    if let Err(e) = device.set_values(cmd.dps.into_value()).await {
                        warn!("Failed to send command to {}: {:?}", self.config.name, e);
                    }
                }
            }
        }
    }

    async fn query_all_dps(&self, device: &mut TuyaDevice) -> Result<()> {
        let payload = Payload::Struct(PayloadStruct {
            dev_id: self.config.id.clone(),
            gw_id: Some(self.config.id.clone()),
            uid: None,
            t: None,
            dp_id: None,
            dps: Some(json!({})),
        });

        device
            .get(payload)
            .await
            .map_err(|e| Error::Device(format!("DP query failed: {e:?}")))
    }

    async fn process_message(
        &mut self,
        msg: &Message,
        status_tx: &mpsc::Sender<DeviceStatus>,
    ) -> Result<()> {
        let Some(update) = extract_dps(&msg.payload) else {
            debug!("No dps in message, skipping");
            return Ok(());
        };

        debug!("{} pushed {} DPs: {}", self.config.name, update.len(), update);

        // The first report is forwarded even if it is empty so the entity
        // publishes an initial state.
        let first = self.snapshot.is_empty();
        if !self.snapshot.merge(&update) && !first {
            debug!("{} snapshot unchanged", self.config.name);
            return Ok(());
        }

        status_tx
            .send(DeviceStatus {
                dps: self.snapshot.clone(),
            })
            .await
            .map_err(|_| Error::ChannelClosed("device status"))
    }
}

/// Extract dps from whichever payload variant the library returns.
/// rust-async-tuyapi sometimes returns DP query responses as Payload::String
/// containing JSON like {"dps":{"1":true,"2":"hot",...}} instead of Payload::Struct.
fn extract_dps(payload: &Payload) -> Option<Dps> {
    let value = match payload {
        Payload::Struct(ps) => ps.dps.clone()?,
        Payload::String(s) => serde_json::from_str::<serde_json::Value>(s)
            .ok()?
            .get("dps")?
            .clone(),
        Payload::Raw(b) => {
            debug!("Payload::Raw ({} bytes), skipping", b.len());
            return None;
        }
        _ => return None,
    };
    let dps = Dps::from_value(&value);
    if dps.is_none() {
        debug!("dps is not a JSON object: {}", value);
    }
    dps
}
