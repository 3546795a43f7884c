//! Public address and general alarm.
//!
//! Alarm patterns sound on every speaker on board; announcements are made
//! in the zone concerned. Speakers only report health.

use std::sync::Arc;
use std::time::Duration;

use shipsafe_app::device_set::DeviceSet;
use shipsafe_app::ports::SubsystemAdapter;
use shipsafe_domain::command::{Ack, Command, CommandFailure, CommandKind};
use shipsafe_domain::device::DeviceKind;
use shipsafe_domain::error::MalformedInput;
use shipsafe_domain::event::Event;
use shipsafe_domain::registry::ZoneRegistry;
use shipsafe_domain::signal::RawSignal;
use shipsafe_domain::subsystem::Subsystem;

use crate::common::{AdapterCore, Reach, unknown_signal, unsupported};
use crate::plant::SimulatedPlant;

pub struct PagaAdapter {
    core: AdapterCore,
}

impl PagaAdapter {
    #[must_use]
    pub fn new(registry: &ZoneRegistry, plant: Arc<SimulatedPlant>, ack_timeout: Duration) -> Self {
        Self {
            core: AdapterCore::new(Subsystem::Paga, registry, plant, ack_timeout),
        }
    }
}

impl SubsystemAdapter for PagaAdapter {
    fn subsystem(&self) -> Subsystem {
        Subsystem::Paga
    }

    fn devices(&self) -> &DeviceSet {
        self.core.devices()
    }

    fn ingest(&self, signal: &RawSignal) -> Result<Option<Event>, MalformedInput> {
        let device = self.core.device(signal)?;
        self.core
            .health_signal(device, signal)
            .unwrap_or_else(|| Err(unknown_signal(device, signal)))
    }

    async fn execute(&self, command: &Command) -> Result<Ack, CommandFailure> {
        match &command.kind {
            CommandKind::SoundAlarm { alarm } => {
                tracing::info!(zone = %command.zone_id, %alarm, "sounding alarm");
                self.core
                    .actuate(command, Reach::Ship, &[DeviceKind::Speaker])
                    .await
            }
            CommandKind::Announce { message } => {
                tracing::info!(zone = %command.zone_id, %message, "announcing");
                self.core
                    .actuate(command, Reach::Zone, &[DeviceKind::Speaker])
                    .await
            }
            _ => Err(unsupported(command, Subsystem::Paga)),
        }
    }
}
