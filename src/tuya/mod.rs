pub mod client;

use tokio::sync::mpsc;

use crate::climate::dps::Dps;
use crate::climate::entity::EntityHost;
use crate::error::{Error, Result};

/// A command to send to the Tuya device (dp_id → JSON value).
#[derive(Debug)]
pub struct DpCommand {
    pub dps: Dps,
}

/// The device's merged dps after a status push or poll.
#[derive(Debug, Clone)]
pub struct DeviceStatus {
    pub dps: Dps,
}

/// Entity-facing side of a [`client::TuyaClient`]: holds the last snapshot the
/// client reported and queues outgoing payloads on its command channel.
pub struct DeviceHandle {
    cmd_tx: mpsc::Sender<DpCommand>,
    snapshot: Dps,
}

impl DeviceHandle {
    pub fn new(cmd_tx: mpsc::Sender<DpCommand>) -> Self {
        Self {
            cmd_tx,
            snapshot: Dps::new(),
        }
    }

    pub fn update(&mut self, status: DeviceStatus) {
        self.snapshot = status.dps;
    }
}

impl EntityHost for DeviceHandle {
    fn snapshot(&self) -> &Dps {
        &self.snapshot
    }

    async fn set_dps(&self, payload: Dps) -> Result<()> {
        self.cmd_tx
            .send(DpCommand { dps: payload })
            .await
            .map_err(|_| Error::ChannelClosed("device command"))
    }
}
