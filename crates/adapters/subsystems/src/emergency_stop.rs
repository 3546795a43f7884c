//! Emergency stop circuit: stop buttons and ventilation dampers.
//!
//! | Device | Signal | Event |
//! |--------|--------|-------|
//! | stop button | `pressed` | `StopPressed` |
//! | stop button | `released` | none |
//! | damper | `isolated` | `IsolationConfirmed` |
//! | damper | `open` | none |

use std::sync::Arc;
use std::time::Duration;

use shipsafe_app::device_set::DeviceSet;
use shipsafe_app::ports::SubsystemAdapter;
use shipsafe_domain::command::{Ack, Command, CommandFailure, CommandKind};
use shipsafe_domain::device::DeviceKind;
use shipsafe_domain::error::MalformedInput;
use shipsafe_domain::event::{Event, EventKind};
use shipsafe_domain::registry::ZoneRegistry;
use shipsafe_domain::signal::RawSignal;
use shipsafe_domain::subsystem::Subsystem;

use crate::common::{AdapterCore, Reach, event, unknown_signal, unsupported};
use crate::plant::SimulatedPlant;

pub struct EmergencyStopAdapter {
    core: AdapterCore,
}

impl EmergencyStopAdapter {
    #[must_use]
    pub fn new(registry: &ZoneRegistry, plant: Arc<SimulatedPlant>, ack_timeout: Duration) -> Self {
        Self {
            core: AdapterCore::new(Subsystem::EmergencyStop, registry, plant, ack_timeout),
        }
    }
}

impl SubsystemAdapter for EmergencyStopAdapter {
    fn subsystem(&self) -> Subsystem {
        Subsystem::EmergencyStop
    }

    fn devices(&self) -> &DeviceSet {
        self.core.devices()
    }

    fn ingest(&self, signal: &RawSignal) -> Result<Option<Event>, MalformedInput> {
        let device = self.core.device(signal)?;
        if let Some(result) = self.core.health_signal(device, signal) {
            return result;
        }
        match (device.kind, signal.signal.as_str()) {
            (DeviceKind::StopButton, "pressed") => {
                Ok(Some(event(device, EventKind::StopPressed, signal)))
            }
            (DeviceKind::Damper, "isolated") => {
                Ok(Some(event(device, EventKind::IsolationConfirmed, signal)))
            }
            (DeviceKind::StopButton, "released") | (DeviceKind::Damper, "open") => Ok(None),
            _ => Err(unknown_signal(device, signal)),
        }
    }

    async fn execute(&self, command: &Command) -> Result<Ack, CommandFailure> {
        match command.kind {
            CommandKind::StopPower => {
                self.core
                    .actuate(command, Reach::Zone, &[DeviceKind::StopButton])
                    .await
            }
            CommandKind::IsolateZone => {
                self.core
                    .actuate(command, Reach::Zone, &[DeviceKind::Damper])
                    .await
            }
            _ => Err(unsupported(command, Subsystem::EmergencyStop)),
        }
    }
}
