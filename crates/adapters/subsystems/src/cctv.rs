//! CCTV: cameras with on-board motion analytics and tamper detection.

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

pub struct CctvAdapter {
    core: AdapterCore,
}

impl CctvAdapter {
    #[must_use]
    pub fn new(registry: &ZoneRegistry, plant: Arc<SimulatedPlant>, ack_timeout: Duration) -> Self {
        Self {
            core: AdapterCore::new(Subsystem::Cctv, registry, plant, ack_timeout),
        }
    }
}

impl SubsystemAdapter for CctvAdapter {
    fn subsystem(&self) -> Subsystem {
        Subsystem::Cctv
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
            "motion" => Ok(Some(event(device, EventKind::MotionDetected, signal))),
            "tamper" | "intrusion" => Ok(Some(event(device, EventKind::CameraAlarm, signal))),
            _ => Err(unknown_signal(device, signal)),
        }
    }

    async fn execute(&self, command: &Command) -> Result<Ack, CommandFailure> {
        match command.kind {
            CommandKind::FocusCameras | CommandKind::StartRecording => {
                self.core
                    .actuate(command, Reach::Zone, &[DeviceKind::Camera])
                    .await
            }
            _ => Err(unsupported(command, Subsystem::Cctv)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shipsafe_domain::command::Causation;
    use shipsafe_domain::id::EventId;
    use shipsafe_domain::zone::ZoneState;

    use crate::testing::deck;

    #[test]
    fn should_map_analytics_to_events() {
        let deck = deck();
        let adapter = CctvAdapter::new(&deck.registry, deck.plant, Duration::from_millis(200));

        let motion = adapter
            .ingest(&RawSignal::new("CAM-BR-001", "motion"))
            .unwrap()
            .unwrap();
        let tamper = adapter
            .ingest(&RawSignal::new("CAM-BR-001", "tamper"))
            .unwrap()
            .unwrap();

        assert_eq!(motion.kind, EventKind::MotionDetected);
        assert_eq!(motion.zone_id, deck.bridge);
        assert_eq!(tamper.kind, EventKind::CameraAlarm);
        assert!(
            adapter
                .ingest(&RawSignal::new("CAM-BR-001", "zoom"))
                .is_err()
        );
    }

    #[tokio::test]
    async fn should_record_only_with_cameras_of_the_zone() {
        let deck = deck();
        let adapter = CctvAdapter::new(
            &deck.registry,
            Arc::clone(&deck.plant),
            Duration::from_millis(200),
        );
        let command = Command::new(
            deck.bridge,
            CommandKind::StartRecording,
            Causation {
                event_id: EventId::new(),
                incident_id: None,
            },
            ZoneState::Alert,
        );

        adapter.execute(&command).await.unwrap();

        let devices: Vec<String> = deck
            .plant
            .actuations()
            .into_iter()
            .map(|actuation| actuation.device)
            .collect();
        assert_eq!(devices, vec!["CAM-BR-001".to_string()]);
    }
}
