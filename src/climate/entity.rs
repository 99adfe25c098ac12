use std::future::Future;

use serde_json::Value;
use tracing::debug;

use super::command::ClimateCommand;
use super::dps::Dps;
use super::translator::{self, SetTemperature};
use super::{ClimateState, HvacMode};
use crate::error::Result;

/// The device side a climate entity is attached to: it owns the latest
/// snapshot and knows how to push payloads to the device.
pub trait EntityHost {
    fn snapshot(&self) -> &Dps;

    fn dps(&self, index: u8) -> Option<&Value> {
        self.snapshot().get(index)
    }

    fn set_dps(&self, payload: Dps) -> impl Future<Output = Result<()>> + Send;

    /// Single boolean write, used for the entity's own on/off datapoint.
    fn set_dp(&self, value: bool, dp_id: &str) -> impl Future<Output = Result<()>> + Send {
        let payload = if value {
            translator::turn_on(dp_id)
        } else {
            translator::turn_off(dp_id)
        };
        self.set_dps(payload)
    }
}

pub struct ClimateEntity<H> {
    host: H,
    switch_dp: String,
    state: ClimateState,
}

impl<H: EntityHost> ClimateEntity<H> {
    pub fn new(host: H, switch_dp: impl Into<String>) -> Self {
        Self {
            host,
            switch_dp: switch_dp.into(),
            state: ClimateState::default(),
        }
    }

    pub fn state(&self) -> &ClimateState {
        &self.state
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Temperature and mode go out together in one payload.
    pub async fn set_temperature(&self, request: SetTemperature) -> Result<()> {
        let payload = translator::set_temperature(&request);
        if payload.is_empty() {
            debug!("Empty set_temperature request, nothing to send");
            return Ok(());
        }
        self.host.set_dps(payload).await
    }

    pub async fn set_hvac_mode(&self, mode: HvacMode) -> Result<()> {
        self.host.set_dps(translator::set_mode(mode)).await
    }

    pub async fn set_fan_mode(&self, level: &str) -> Result<()> {
        self.host.set_dps(translator::set_fan_level(level)).await
    }

    pub async fn turn_on(&self) -> Result<()> {
        self.host.set_dp(true, &self.switch_dp).await
    }

    pub async fn turn_off(&self) -> Result<()> {
        self.host.set_dp(false, &self.switch_dp).await
    }

    pub async fn handle(&self, command: ClimateCommand) -> Result<()> {
        match command {
            ClimateCommand::SetTemperature(request) => self.set_temperature(request).await,
            ClimateCommand::SetHvacMode(mode) => self.set_hvac_mode(mode).await,
            ClimateCommand::SetFanMode(level) => self.set_fan_mode(&level).await,
            ClimateCommand::TurnOn => self.turn_on().await,
            ClimateCommand::TurnOff => self.turn_off().await,
        }
    }

    /// Recompute the whole state from the host's current snapshot.
    pub fn status_updated(&mut self) -> &ClimateState {
        self.state = translator::project_status(self.host.snapshot());
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;

    #[derive(Default)]
    struct RecordingHost {
        snapshot: Dps,
        sent: Mutex<Vec<Dps>>,
    }

    impl RecordingHost {
        fn sent(&self) -> Vec<Value> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .cloned()
                .map(Dps::into_value)
                .collect()
        }
    }

    impl EntityHost for RecordingHost {
        fn snapshot(&self) -> &Dps {
            &self.snapshot
        }

        async fn set_dps(&self, payload: Dps) -> Result<()> {
            self.sent.lock().unwrap().push(payload);
            Ok(())
        }
    }

    fn entity() -> ClimateEntity<RecordingHost> {
        ClimateEntity::new(RecordingHost::default(), "1")
    }

    #[tokio::test]
    async fn temperature_and_mode_are_batched() {
        let entity = entity();
        entity
            .set_temperature(SetTemperature {
                temperature: Some(21.5),
                hvac_mode: Some(HvacMode::Cool),
            })
            .await
            .unwrap();

        assert_eq!(
            entity.host.sent(),
            vec![json!({"16": 215, "1": true, "2": "cold"})]
        );
    }

    #[tokio::test]
    async fn empty_temperature_request_sends_nothing() {
        let entity = entity();
        entity.set_temperature(SetTemperature::default()).await.unwrap();
        assert!(entity.host.sent().is_empty());
    }

    #[tokio::test]
    async fn power_targets_configured_dp() {
        let entity = ClimateEntity::new(RecordingHost::default(), "101");
        entity.turn_on().await.unwrap();
        entity.turn_off().await.unwrap();
        assert_eq!(
            entity.host.sent(),
            vec![json!({"101": true}), json!({"101": false})]
        );
    }

    #[tokio::test]
    async fn commands_dispatch_to_payloads() {
        let entity = entity();
        entity
            .handle(ClimateCommand::SetHvacMode(HvacMode::Off))
            .await
            .unwrap();
        entity
            .handle(ClimateCommand::SetFanMode("auto".into()))
            .await
            .unwrap();
        assert_eq!(
            entity.host.sent(),
            vec![json!({"1": false}), json!({"28": "auto"})]
        );
    }

    #[tokio::test]
    async fn commands_do_not_touch_state() {
        let mut entity = entity();
        entity.set_hvac_mode(HvacMode::Heat).await.unwrap();
        assert_eq!(entity.state(), &ClimateState::default());

        entity.host_mut().snapshot = Dps::from_value(&json!({"1": true, "2": "hot"})).unwrap();
        assert_eq!(entity.status_updated().hvac_mode, HvacMode::Heat);
    }

    #[test]
    fn status_update_replaces_whole_state() {
        let mut entity = entity();
        entity.host_mut().snapshot =
            Dps::from_value(&json!({"1": true, "2": "floor_heat", "16": 230, "28": "4", "34": 51}))
                .unwrap();
        entity.status_updated();
        assert_eq!(entity.state().hvac_mode, HvacMode::HeatCool);
        assert_eq!(entity.state().fan_mode.as_deref(), Some("4"));

        // Fields missing from the next snapshot are cleared, not kept.
        entity.host_mut().snapshot = Dps::from_value(&json!({"1": false})).unwrap();
        let state = entity.status_updated().clone();
        assert_eq!(
            state,
            ClimateState {
                hvac_mode: HvacMode::Off,
                ..ClimateState::default()
            }
        );
    }

    #[test]
    fn dps_accessor_reads_snapshot() {
        let host = RecordingHost {
            snapshot: Dps::from_value(&json!({"24": 180})).unwrap(),
            ..RecordingHost::default()
        };
        assert_eq!(host.dps(24), Some(&json!(180)));
        assert_eq!(host.dps(34), None);
    }
}
