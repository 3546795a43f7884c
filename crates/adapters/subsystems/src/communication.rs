//! Radio and distress communication.
//!
//! A radio raises `mob` when a man-overboard alarm is keyed on it. Outgoing
//! safety and distress messages go through any healthy radio on board.

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

pub struct CommunicationAdapter {
    core: AdapterCore,
}

impl CommunicationAdapter {
    #[must_use]
    pub fn new(registry: &ZoneRegistry, plant: Arc<SimulatedPlant>, ack_timeout: Duration) -> Self {
        Self {
            core: AdapterCore::new(Subsystem::Communication, registry, plant, ack_timeout),
        }
    }
}

impl SubsystemAdapter for CommunicationAdapter {
    fn subsystem(&self) -> Subsystem {
        Subsystem::Communication
    }

    fn devices(&self) -> &DeviceSet {
        self.core.devices()
    }

    fn ingest(&self, signal: &RawSignal) -> Result<Option<Event>, MalformedInput> {
        let device = self.core.device(signal)?;
        if let Some(result) = self.core.health_signal(device, signal) {
            return result;
        }
        match signal.signal.as_str() {
            "mob" => Ok(Some(event(device, EventKind::ManOverboard, signal))),
            _ => Err(unknown_signal(device, signal)),
        }
    }

    async fn execute(&self, command: &Command) -> Result<Ack, CommandFailure> {
        match &command.kind {
            CommandKind::SendSafetyMessage { priority, message } => {
                tracing::info!(%priority, %message, "transmitting safety message");
                self.core
                    .actuate(command, Reach::Ship, &[DeviceKind::Radio])
                    .await
            }
            CommandKind::SendDistress { nature } => {
                tracing::warn!(%nature, "transmitting distress alert");
                self.core
                    .actuate(command, Reach::Ship, &[DeviceKind::Radio])
                    .await
            }
            _ => Err(unsupported(command, Subsystem::Communication)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shipsafe_domain::command::{Causation, FailureReason};
    use shipsafe_domain::id::EventId;
    use shipsafe_domain::zone::ZoneState;

    use crate::plant::Behavior;
    use crate::testing::deck;

    #[test]
    fn should_raise_man_overboard_with_reported_position() {
        let deck = deck();
        let adapter =
            CommunicationAdapter::new(&deck.registry, deck.plant, Duration::from_millis(200));

        let event = adapter
            .ingest(
                &RawSignal::new("VHF-BR-001", "mob")
                    .with_detail(json!({ "side": "starboard", "frame": 112 })),
            )
            .unwrap()
            .unwrap();

        assert_eq!(event.kind, EventKind::ManOverboard);
        assert_eq!(event.payload["detail"]["side"], "starboard");
    }

    #[tokio::test]
    async fn should_fail_distress_when_every_radio_is_down() {
        let deck = deck();
        let adapter = CommunicationAdapter::new(
            &deck.registry,
            Arc::clone(&deck.plant),
            Duration::from_millis(200),
        );
        deck.plant.set_behavior("VHF-BR-001", Behavior::Offline);
        deck.plant.set_behavior("VHF-BR-002", Behavior::Offline);
        let command = Command::new(
            deck.engine_room,
            CommandKind::SendDistress {
                nature: "fire".to_string(),
            },
            Causation {
                event_id: EventId::new(),
                incident_id: None,
            },
            ZoneState::Alarm,
        );

        let failure = adapter.execute(&command).await.unwrap_err();

        assert_eq!(failure.reason, FailureReason::DeviceOffline);
        assert!(failure.detail.contains("VHF-BR-002"));
    }
}
