//! Simulated plant: the physical side of every adapter.
//!
//! The plant stands in for the actuators on board. Each device tag can be
//! scripted to acknowledge, stay silent, be offline or reject commands, so
//! every failure path of the core can be exercised without hardware.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;

use shipsafe_app::ports::{AckChannel, AckTimeout};
use shipsafe_domain::command::{Ack, Command, CommandFailure};
use shipsafe_domain::device::Device;
use shipsafe_domain::id::CommandId;

/// How a simulated device responds to commands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Behavior {
    #[default]
    Acknowledge,
    /// Accepts the command but never confirms it.
    Silent,
    Offline,
    Reject(String),
}

/// One command as it reached a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actuation {
    pub device: String,
    pub command: &'static str,
    pub command_id: CommandId,
}

#[derive(Debug, Default)]
struct PlantState {
    behaviors: HashMap<String, Behavior>,
    actuations: Vec<Actuation>,
    acks: HashMap<CommandId, Ack>,
}

#[derive(Debug, Default)]
pub struct SimulatedPlant {
    state: Mutex<PlantState>,
    acked: Notify,
}

impl SimulatedPlant {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Script how the device `tag` answers from now on.
    pub fn set_behavior(&self, tag: impl Into<String>, behavior: Behavior) {
        self.lock().behaviors.insert(tag.into(), behavior);
    }

    /// Every actuation so far, in order.
    #[must_use]
    pub fn actuations(&self) -> Vec<Actuation> {
        self.lock().actuations.clone()
    }

    /// Deliver `command` to `device`.
    ///
    /// # Errors
    ///
    /// Returns a [`CommandFailure`] when the device is scripted offline or
    /// rejecting. A silent device succeeds here and never acknowledges.
    pub fn actuate(&self, device: &Device, command: &Command) -> Result<(), CommandFailure> {
        let mut state = self.lock();
        let behavior = state
            .behaviors
            .get(&device.tag)
            .cloned()
            .unwrap_or_default();
        match behavior {
            Behavior::Offline => {
                return Err(CommandFailure::device_offline(format!(
                    "{} does not respond",
                    device.tag
                )));
            }
            Behavior::Reject(reason) => {
                return Err(CommandFailure::rejected(format!("{}: {reason}", device.tag)));
            }
            Behavior::Silent => {}
            Behavior::Acknowledge => {
                state.acks.insert(command.id, Ack::now(command.id));
            }
        }
        state.actuations.push(Actuation {
            device: device.tag.clone(),
            command: command.kind.name(),
            command_id: command.id,
        });
        drop(state);
        self.acked.notify_waiters();
        Ok(())
    }

    fn take_ack(&self, command_id: CommandId) -> Option<Ack> {
        self.lock().acks.remove(&command_id)
    }

    fn lock(&self) -> MutexGuard<'_, PlantState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AckChannel for SimulatedPlant {
    async fn wait_for_ack(
        &self,
        command_id: CommandId,
        timeout: Duration,
    ) -> Result<Ack, AckTimeout> {
        let wait = async {
            loop {
                let notified = self.acked.notified();
                if let Some(ack) = self.take_ack(command_id) {
                    return ack;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| AckTimeout(timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shipsafe_domain::command::{Causation, CommandKind, FailureReason};
    use shipsafe_domain::device::DeviceKind;
    use shipsafe_domain::id::{EventId, ZoneId};
    use shipsafe_domain::zone::ZoneState;

    fn damper() -> Device {
        Device::builder()
            .tag("DMP-ER-001")
            .zone_id(ZoneId::new())
            .kind(DeviceKind::Damper)
            .build()
            .unwrap()
    }

    fn isolate(device: &Device) -> Command {
        Command::new(
            device.zone_id,
            CommandKind::IsolateZone,
            Causation {
                event_id: EventId::new(),
                incident_id: None,
            },
            ZoneState::Alarm,
        )
    }

    #[tokio::test]
    async fn should_acknowledge_by_default() {
        let plant = SimulatedPlant::new();
        let device = damper();
        let command = isolate(&device);

        plant.actuate(&device, &command).unwrap();
        let ack = plant
            .wait_for_ack(command.id, Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(ack.command_id, command.id);
        assert_eq!(plant.actuations()[0].command, "isolate_zone");
    }

    #[tokio::test(start_paused = true)]
    async fn should_time_out_when_device_is_silent() {
        let plant = SimulatedPlant::new();
        let device = damper();
        plant.set_behavior("DMP-ER-001", Behavior::Silent);
        let command = isolate(&device);

        plant.actuate(&device, &command).unwrap();
        let result = plant.wait_for_ack(command.id, Duration::from_secs(2)).await;

        assert_eq!(result, Err(AckTimeout(Duration::from_secs(2))));
    }

    #[test]
    fn should_fail_offline_and_rejecting_devices_without_actuation() {
        let plant = SimulatedPlant::new();
        let device = damper();
        let command = isolate(&device);

        plant.set_behavior("DMP-ER-001", Behavior::Offline);
        let offline = plant.actuate(&device, &command).unwrap_err();
        plant.set_behavior("DMP-ER-001", Behavior::Reject("jammed".to_string()));
        let rejected = plant.actuate(&device, &command).unwrap_err();

        assert_eq!(offline.reason, FailureReason::DeviceOffline);
        assert_eq!(rejected.detail, "DMP-ER-001: jammed");
        assert!(plant.actuations().is_empty());
    }
}
