use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::climate::command::ClimateCommand;
use crate::climate::entity::ClimateEntity;
use crate::mqtt::StateUpdate;
use crate::tuya::{DeviceHandle, DeviceStatus};

/// Per-device climate loop: applies device snapshots to the entity and
/// publishes the projected state, and turns commands into device payloads.
pub async fn run_climate(
    mut entity: ClimateEntity<DeviceHandle>,
    topic_name: String,
    mut status_rx: mpsc::Receiver<DeviceStatus>,
    mut command_rx: mpsc::Receiver<ClimateCommand>,
    state_tx: mpsc::Sender<StateUpdate>,
) {
    loop {
        tokio::select! {
            Some(status) = status_rx.recv() => {
                entity.host_mut().update(status);
                let state = entity.status_updated().clone();
                debug!("{} state: {:?}", topic_name, state);
                let update = StateUpdate {
                    topic_name: topic_name.clone(),
                    state,
                };
                if state_tx.send(update).await.is_err() {
                    warn!("State channel closed");
                    return;
                }
            }
            Some(command) = command_rx.recv() => {
                debug!("{} command: {:?}", topic_name, command);
                if let Err(e) = entity.handle(command).await {
                    warn!("Failed to handle command for {}: {}", topic_name, e);
                }
            }
            else => {
                info!("Climate entity {} stopped", topic_name);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::climate::HvacMode;
    use crate::climate::dps::Dps;

    #[tokio::test]
    async fn status_in_state_out_command_in_payload_out() {
        let (dev_cmd_tx, mut dev_cmd_rx) = mpsc::channel(4);
        let (status_tx, status_rx) = mpsc::channel(4);
        let (command_tx, command_rx) = mpsc::channel(4);
        let (state_tx, mut state_rx) = mpsc::channel(4);

        let entity = ClimateEntity::new(DeviceHandle::new(dev_cmd_tx), "1");
        let task = tokio::spawn(run_climate(
            entity,
            "ac".into(),
            status_rx,
            command_rx,
            state_tx,
        ));

        status_tx
            .send(DeviceStatus {
                dps: Dps::from_value(&json!({"1": true, "2": "hot", "16": 225, "24": 201}))
                    .unwrap(),
            })
            .await
            .unwrap();
        let update = state_rx.recv().await.unwrap();
        assert_eq!(update.topic_name, "ac");
        assert_eq!(update.state.hvac_mode, HvacMode::Heat);
        assert_eq!(update.state.target_temperature, Some(22.5));
        assert_eq!(update.state.current_temperature, Some(20.1));

        command_tx
            .send(ClimateCommand::SetFanMode("5".into()))
            .await
            .unwrap();
        let sent = dev_cmd_rx.recv().await.unwrap();
        assert_eq!(sent.dps.into_value(), json!({"28": "5"}));

        drop(status_tx);
        drop(command_tx);
        task.await.unwrap();
    }
}
