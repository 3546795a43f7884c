//! Fire and gas detection: detectors plus the fixed suppression release.
//!
//! A detector reports either a sampled value named after its principle
//! (`smoke`, `heat`, `flame`, `gas`), compared against its threshold, or a
//! discrete `alarm`. Values under the threshold produce no event.

use std::sync::Arc;
use std::time::Duration;

use shipsafe_app::device_set::DeviceSet;
use shipsafe_app::ports::SubsystemAdapter;
use shipsafe_domain::command::{Ack, Command, CommandFailure, CommandKind};
use shipsafe_domain::device::{Device, DeviceKind};
use shipsafe_domain::error::MalformedInput;
use shipsafe_domain::event::{Event, EventKind};
use shipsafe_domain::registry::ZoneRegistry;
use shipsafe_domain::signal::RawSignal;
use shipsafe_domain::subsystem::Subsystem;

use crate::common::{AdapterCore, Reach, event, unknown_signal, unsupported};
use crate::plant::SimulatedPlant;

pub struct FireDetectionAdapter {
    core: AdapterCore,
}

impl FireDetectionAdapter {
    #[must_use]
    pub fn new(registry: &ZoneRegistry, plant: Arc<SimulatedPlant>, ack_timeout: Duration) -> Self {
        Self {
            core: AdapterCore::new(Subsystem::FireDetection, registry, plant, ack_timeout),
        }
    }

    fn sample(device: &Device, signal: &RawSignal) -> Result<Option<Event>, MalformedInput> {
        let Some(kind) = device.kind.detector() else {
            return Err(unknown_signal(device, signal));
        };
        if signal.signal == "alarm" {
            return Ok(Some(event(device, EventKind::detected(kind), signal)));
        }
        if signal.signal != kind.to_string() {
            return Err(unknown_signal(device, signal));
        }
        let value = signal.value.ok_or_else(|| MalformedInput::MissingValue {
            tag: device.tag.clone(),
            signal: signal.signal.clone(),
        })?;
        if !value.is_finite() {
            return Err(MalformedInput::NonFiniteValue {
                tag: device.tag.clone(),
                signal: signal.signal.clone(),
            });
        }
        if device.threshold.is_none() {
            return Err(MalformedInput::MissingThreshold(device.tag.clone()));
        }
        if device.is_over_threshold(value) {
            Ok(Some(event(device, EventKind::detected(kind), signal)))
        } else {
            Ok(None)
        }
    }
}

impl SubsystemAdapter for FireDetectionAdapter {
    fn subsystem(&self) -> Subsystem {
        Subsystem::FireDetection
    }

    fn devices(&self) -> &DeviceSet {
        self.core.devices()
    }

    fn ingest(&self, signal: &RawSignal) -> Result<Option<Event>, MalformedInput> {
        let device = self.core.device(signal)?;
        if let Some(result) = self.core.health_signal(device, signal) {
            return result;
        }
        match device.kind {
            DeviceKind::SuppressionRelease if signal.signal == "discharged" => Ok(None),
            _ => Self::sample(device, signal),
        }
    }

    async fn execute(&self, command: &Command) -> Result<Ack, CommandFailure> {
        match command.kind {
            CommandKind::ActivateSuppression { medium } => {
                tracing::info!(zone = %command.zone_id, %medium, "releasing fixed suppression");
                self.core
                    .actuate(command, Reach::Zone, &[DeviceKind::SuppressionRelease])
                    .await
            }
            _ => Err(unsupported(command, Subsystem::FireDetection)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shipsafe_domain::command::{Causation, FailureReason};
    use shipsafe_domain::id::EventId;
    use shipsafe_domain::time::now;
    use shipsafe_domain::zone::{SuppressionMedium, ZoneState};

    use crate::plant::Behavior;
    use crate::testing::{Deck, deck};

    fn adapter(deck: &Deck) -> FireDetectionAdapter {
        FireDetectionAdapter::new(
            &deck.registry,
            Arc::clone(&deck.plant),
            Duration::from_millis(200),
        )
    }

    #[test]
    fn should_detect_when_value_reaches_threshold() {
        let deck = deck();
        let adapter = adapter(&deck);
        let at = now();

        let event = adapter
            .ingest(&RawSignal::new("HT-ER-001", "heat").with_value(68.0).with_at(at))
            .unwrap()
            .unwrap();

        assert_eq!(event.kind, EventKind::HeatDetected);
        assert_eq!(event.occurred_at, at);
        assert_eq!(event.payload["value"], 68.0);
    }

    #[test]
    fn should_ignore_values_under_threshold() {
        let deck = deck();
        let adapter = adapter(&deck);
        let result = adapter.ingest(&RawSignal::new("SMK-ER-001", "smoke").with_value(0.02));
        assert_eq!(result, Ok(None));
    }

    #[test]
    fn should_accept_discrete_alarm_without_threshold() {
        let deck = deck();
        let adapter = adapter(&deck);
        let event = adapter
            .ingest(&RawSignal::new("GAS-ER-001", "alarm"))
            .unwrap()
            .unwrap();
        assert_eq!(event.kind, EventKind::GasDetected);
    }

    #[test]
    fn should_reject_malformed_samples() {
        let deck = deck();
        let adapter = adapter(&deck);

        assert!(matches!(
            adapter.ingest(&RawSignal::new("SMK-ER-001", "smoke")),
            Err(MalformedInput::MissingValue { .. })
        ));
        assert!(matches!(
            adapter.ingest(&RawSignal::new("SMK-ER-001", "smoke").with_value(f64::NAN)),
            Err(MalformedInput::NonFiniteValue { .. })
        ));
        assert!(matches!(
            adapter.ingest(&RawSignal::new("SMK-ER-001", "heat").with_value(90.0)),
            Err(MalformedInput::UnknownSignal { .. })
        ));
        assert_eq!(
            adapter.ingest(&RawSignal::new("GAS-ER-001", "gas").with_value(40.0)),
            Err(MalformedInput::MissingThreshold("GAS-ER-001".to_string()))
        );
        assert_eq!(
            adapter.ingest(&RawSignal::new("FD-XX-404", "smoke")),
            Err(MalformedInput::UnknownDevice("FD-XX-404".to_string()))
        );
    }

    #[tokio::test]
    async fn should_release_suppression_in_the_command_zone() {
        let deck = deck();
        let adapter = adapter(&deck);
        let command = Command::new(
            deck.engine_room,
            CommandKind::ActivateSuppression {
                medium: SuppressionMedium::Co2,
            },
            Causation {
                event_id: EventId::new(),
                incident_id: None,
            },
            ZoneState::Alarm,
        );

        adapter.execute(&command).await.unwrap();

        let actuations = deck.plant.actuations();
        assert_eq!(actuations[0].device, "SUP-ER-001");
        assert_eq!(actuations[0].command, "activate_suppression");
    }

    #[tokio::test(start_paused = true)]
    async fn should_time_out_when_release_never_confirms() {
        let deck = deck();
        let adapter = adapter(&deck);
        deck.plant.set_behavior("SUP-ER-001", Behavior::Silent);
        let command = Command::new(
            deck.engine_room,
            CommandKind::ActivateSuppression {
                medium: SuppressionMedium::Co2,
            },
            Causation {
                event_id: EventId::new(),
                incident_id: None,
            },
            ZoneState::Alarm,
        );

        let failure = adapter.execute(&command).await.unwrap_err();

        assert_eq!(failure.reason, FailureReason::Timeout);
    }

    #[tokio::test]
    async fn should_fail_suppression_where_none_is_fitted() {
        let deck = deck();
        let adapter = adapter(&deck);
        let command = Command::new(
            deck.bridge,
            CommandKind::ActivateSuppression {
                medium: SuppressionMedium::Sprinkler,
            },
            Causation {
                event_id: EventId::new(),
                incident_id: None,
            },
            ZoneState::Alarm,
        );

        let failure = adapter.execute(&command).await.unwrap_err();

        assert_eq!(failure.reason, FailureReason::DeviceOffline);
    }
}
