//! Shared plumbing of the subsystem adapters: device lookup, health
//! signals, event construction and actuation through the plant.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use shipsafe_app::device_set::DeviceSet;
use shipsafe_app::ports::AckChannel;
use shipsafe_domain::command::{Ack, Command, CommandFailure};
use shipsafe_domain::device::{Device, DeviceHealth, DeviceKind};
use shipsafe_domain::error::MalformedInput;
use shipsafe_domain::event::{Event, EventKind};
use shipsafe_domain::registry::ZoneRegistry;
use shipsafe_domain::signal::RawSignal;
use shipsafe_domain::subsystem::Subsystem;

use crate::plant::SimulatedPlant;

/// Which devices a command may be carried out on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Reach {
    /// Only devices in the command's zone.
    Zone,
    /// Any device of the subsystem on board.
    Ship,
}

pub(crate) struct AdapterCore {
    devices: DeviceSet,
    /// Tags owned by other subsystems, to tell misrouted signals apart.
    foreign: HashMap<String, Subsystem>,
    plant: Arc<SimulatedPlant>,
    ack_timeout: Duration,
}

impl AdapterCore {
    pub fn new(
        subsystem: Subsystem,
        registry: &ZoneRegistry,
        plant: Arc<SimulatedPlant>,
        ack_timeout: Duration,
    ) -> Self {
        let foreign = registry
            .devices()
            .iter()
            .filter(|device| device.subsystem() != subsystem)
            .map(|device| (device.tag.clone(), device.subsystem()))
            .collect();
        Self {
            devices: DeviceSet::new(subsystem, registry),
            foreign,
            plant,
            ack_timeout,
        }
    }

    pub fn devices(&self) -> &DeviceSet {
        &self.devices
    }

    /// The device a signal comes from.
    pub fn device(&self, signal: &RawSignal) -> Result<&Device, MalformedInput> {
        if let Some(device) = self.devices.by_tag(&signal.device) {
            return Ok(device);
        }
        match self.foreign.get(&signal.device) {
            Some(actual) => Err(MalformedInput::WrongSubsystem {
                tag: signal.device.clone(),
                expected: self.devices.subsystem(),
                actual: *actual,
            }),
            None => Err(MalformedInput::UnknownDevice(signal.device.clone())),
        }
    }

    /// Handle the signals every device understands.
    ///
    /// Returns `None` when the signal is not a health signal.
    pub fn health_signal(
        &self,
        device: &Device,
        signal: &RawSignal,
    ) -> Option<Result<Option<Event>, MalformedInput>> {
        let event = match signal.signal.as_str() {
            "heartbeat" => None,
            "fault" => (self.devices.set_health(device.id, DeviceHealth::Fault)
                != DeviceHealth::Fault)
                .then(|| event(device, EventKind::DeviceFault, signal)),
            "ok" => (self.devices.set_health(device.id, DeviceHealth::Ok) == DeviceHealth::Fault)
                .then(|| event(device, EventKind::DeviceRestored, signal)),
            _ => return None,
        };
        Some(Ok(event))
    }

    /// Carry `command` out on every healthy device of `kinds` within reach,
    /// then wait for the plant to confirm it.
    ///
    /// One responsive device is enough for the command to take effect.
    pub async fn actuate(
        &self,
        command: &Command,
        reach: Reach,
        kinds: &[DeviceKind],
    ) -> Result<Ack, CommandFailure> {
        let targets: Vec<&Device> = match reach {
            Reach::Zone => self
                .devices
                .healthy_in_zone(command.zone_id, |device| kinds.contains(&device.kind)),
            Reach::Ship => self
                .devices
                .iter()
                .filter(|device| kinds.contains(&device.kind))
                .filter(|device| self.devices.health(device.id).is_healthy())
                .collect(),
        };
        if targets.is_empty() {
            return Err(CommandFailure::device_offline(format!(
                "no healthy device can {}",
                command.kind.name()
            )));
        }

        let mut delivered = false;
        let mut last_failure = None;
        for device in targets {
            match self.plant.actuate(device, command) {
                Ok(()) => delivered = true,
                Err(failure) => {
                    tracing::warn!(
                        device = %device.tag,
                        command = command.kind.name(),
                        %failure,
                        "device refused command"
                    );
                    last_failure = Some(failure);
                }
            }
        }
        if !delivered && let Some(failure) = last_failure {
            return Err(failure);
        }

        self.plant
            .wait_for_ack(command.id, self.ack_timeout)
            .await
            .map_err(|err| CommandFailure::timeout(err.to_string()))
    }
}

/// An event from `device`, timed and annotated from the raw signal.
pub(crate) fn event(device: &Device, kind: EventKind, signal: &RawSignal) -> Event {
    let mut event = Event::from_device(device, kind);
    if let Some(at) = signal.at {
        event = event.with_occurred_at(at);
    }
    match (signal.value, &signal.detail) {
        (None, None) => event,
        (Some(value), None) => event.with_payload(json!({ "value": value })),
        (None, Some(detail)) => event.with_payload(json!({ "detail": detail })),
        (Some(value), Some(detail)) => {
            event.with_payload(json!({ "value": value, "detail": detail }))
        }
    }
}

pub(crate) fn unknown_signal(device: &Device, signal: &RawSignal) -> MalformedInput {
    MalformedInput::UnknownSignal {
        tag: device.tag.clone(),
        kind: device.kind,
        signal: signal.signal.clone(),
    }
}

pub(crate) fn unsupported(command: &Command, subsystem: Subsystem) -> CommandFailure {
    CommandFailure::rejected(format!(
        "{subsystem} cannot {}",
        command.kind.name()
    ))
}
