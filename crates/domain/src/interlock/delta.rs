//! State delta: the mutations one interlock decision makes.
//!
//! A delta is applied to a working copy of the snapshot as a whole. If any
//! operation fails the copy is discarded, so a decision never lands halfway.

use serde::{Deserialize, Serialize};

use crate::device::{DeviceHealth, Reading};
use crate::error::{NotFoundError, ShipSafeError, TransitionError};
use crate::id::{DeviceId, EventId, IncidentId, ZoneId};
use crate::incident::{Incident, IncidentCause, IncidentPhase};
use crate::snapshot::{Detection, Snapshot, healthy_detector_kinds};
use crate::time::Timestamp;
use crate::zone::ZoneState;

/// Why a zone changed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionCause {
    Rule,
    Acknowledgment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DeltaOp {
    SetZoneState {
        zone_id: ZoneId,
        from: ZoneState,
        to: ZoneState,
        cause: TransitionCause,
    },
    RecordDetection {
        zone_id: ZoneId,
        detection: Detection,
    },
    ClearDetections {
        zone_id: ZoneId,
    },
    SetDeviceHealth {
        device_id: DeviceId,
        health: DeviceHealth,
    },
    RecordReading {
        device_id: DeviceId,
        reading: Reading,
    },
    OpenIncident {
        incident: Box<Incident>,
    },
    AttachEvent {
        incident_id: IncidentId,
        event_id: EventId,
    },
    UpgradeCause {
        incident_id: IncidentId,
        cause: IncidentCause,
    },
    AdvanceIncident {
        incident_id: IncidentId,
        phase: IncidentPhase,
        at: Timestamp,
    },
    /// Start the incident's response clock.
    MarkResponseDue {
        incident_id: IncidentId,
        at: Timestamp,
    },
    AcknowledgeIncident {
        incident_id: IncidentId,
        operator: String,
    },
}

/// Ordered list of [`DeltaOp`]s.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDelta {
    pub ops: Vec<DeltaOp>,
}

impl StateDelta {
    pub fn push(&mut self, op: DeltaOp) {
        self.ops.push(op);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// The zone-state changes contained in this delta.
    pub fn transitions(&self) -> impl Iterator<Item = (ZoneId, ZoneState, ZoneState)> + '_ {
        self.ops.iter().filter_map(|op| match op {
            DeltaOp::SetZoneState {
                zone_id, from, to, ..
            } => Some((*zone_id, *from, *to)),
            _ => None,
        })
    }

    /// The zone state for `zone_id` once this delta is applied, if it sets one.
    #[must_use]
    pub fn resulting_state(&self, zone_id: ZoneId) -> Option<ZoneState> {
        self.transitions()
            .filter(|(id, _, _)| *id == zone_id)
            .map(|(_, _, to)| to)
            .last()
    }

    /// Apply every operation to `snapshot` in order, then refresh derived
    /// zone fields. Does not touch the version.
    ///
    /// # Errors
    ///
    /// - [`ShipSafeError::NotFound`] for an unknown zone, device or incident
    /// - [`ShipSafeError::Transition`] for a forbidden zone or incident transition
    ///
    /// On error `snapshot` may be partially modified; callers apply to a copy.
    pub fn apply(&self, snapshot: &mut Snapshot) -> Result<(), ShipSafeError> {
        for op in &self.ops {
            apply_op(snapshot, op)?;
        }
        refresh_derived(snapshot);
        Ok(())
    }
}

fn not_found(entity: &'static str, id: impl ToString) -> ShipSafeError {
    NotFoundError {
        entity,
        id: id.to_string(),
    }
    .into()
}

fn apply_op(snapshot: &mut Snapshot, op: &DeltaOp) -> Result<(), ShipSafeError> {
    match op {
        DeltaOp::SetZoneState {
            zone_id, to, cause, ..
        } => {
            let zone = snapshot
                .zones
                .iter_mut()
                .find(|zone| zone.id == *zone_id)
                .ok_or_else(|| not_found("zone", zone_id))?;
            zone.state = match cause {
                TransitionCause::Rule => zone.state.escalate_to(*to)?,
                TransitionCause::Acknowledgment => {
                    let next = zone.state.acknowledge()?;
                    if next != *to {
                        return Err(TransitionError::Downgrade {
                            from: zone.state,
                            to: *to,
                        }
                        .into());
                    }
                    next
                }
            };
        }
        DeltaOp::RecordDetection { zone_id, detection } => {
            let zone = snapshot
                .zones
                .iter_mut()
                .find(|zone| zone.id == *zone_id)
                .ok_or_else(|| not_found("zone", zone_id))?;
            zone.detections.push(*detection);
        }
        DeltaOp::ClearDetections { zone_id } => {
            let zone = snapshot
                .zones
                .iter_mut()
                .find(|zone| zone.id == *zone_id)
                .ok_or_else(|| not_found("zone", zone_id))?;
            zone.detections.clear();
        }
        DeltaOp::SetDeviceHealth { device_id, health } => {
            let device = snapshot
                .devices
                .iter_mut()
                .find(|device| device.id == *device_id)
                .ok_or_else(|| not_found("device", device_id))?;
            device.health = *health;
        }
        DeltaOp::RecordReading { device_id, reading } => {
            let device = snapshot
                .devices
                .iter_mut()
                .find(|device| device.id == *device_id)
                .ok_or_else(|| not_found("device", device_id))?;
            device.last_reading = Some(*reading);
        }
        DeltaOp::OpenIncident { incident } => {
            snapshot.incidents.push(incident.as_ref().clone());
        }
        DeltaOp::AttachEvent {
            incident_id,
            event_id,
        } => active_incident(snapshot, *incident_id)?.attach_event(*event_id),
        DeltaOp::UpgradeCause { incident_id, cause } => {
            active_incident(snapshot, *incident_id)?.upgrade_cause(*cause);
        }
        DeltaOp::AdvanceIncident {
            incident_id,
            phase,
            at,
        } => {
            active_incident(snapshot, *incident_id)?.advance(*phase, *at)?;
            if *phase == IncidentPhase::Closed {
                if let Some(idx) = snapshot
                    .incidents
                    .iter()
                    .position(|incident| incident.id == *incident_id)
                {
                    let closed = snapshot.incidents.remove(idx);
                    snapshot.closed_incidents.push(closed);
                }
            }
        }
        DeltaOp::MarkResponseDue { incident_id, at } => {
            active_incident(snapshot, *incident_id)?.mark_response_due(*at);
        }
        DeltaOp::AcknowledgeIncident {
            incident_id,
            operator,
        } => active_incident(snapshot, *incident_id)?
            .acknowledged_by
            .push(operator.clone()),
    }
    Ok(())
}

fn active_incident(
    snapshot: &mut Snapshot,
    incident_id: IncidentId,
) -> Result<&mut Incident, ShipSafeError> {
    snapshot
        .incidents
        .iter_mut()
        .find(|incident| incident.id == incident_id)
        .ok_or_else(|| not_found("incident", incident_id))
}

/// Recompute per-zone fields derived from device health.
pub fn refresh_derived(snapshot: &mut Snapshot) {
    let Snapshot { zones, devices, .. } = snapshot;
    for zone in zones.iter_mut() {
        zone.faulted = devices
            .iter()
            .filter(|device| device.zone_id == zone.id && !device.health.is_healthy())
            .map(|device| device.tag.clone())
            .collect();
        zone.corroboration_degraded = healthy_detector_kinds(devices, zone.id) < 2;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DetectorKind, Device, DeviceKind};
    use crate::event::{Event, EventKind, EventSource};
    use crate::registry::ZoneRegistry;
    use crate::time::now;
    use crate::zone::Zone;

    fn snapshot() -> (Snapshot, ZoneId, DeviceId) {
        let zone = Zone::builder().name("cargo_hold").build().unwrap();
        let smoke = Device::builder()
            .tag("FD-CH-001")
            .zone_id(zone.id)
            .kind(DeviceKind::SmokeSensor)
            .threshold(3.0)
            .build()
            .unwrap();
        let registry = ZoneRegistry::builder()
            .zone(zone.clone())
            .device(smoke.clone())
            .build()
            .unwrap();
        (Snapshot::initial(&registry), zone.id, smoke.id)
    }

    fn set_state(
        zone_id: ZoneId,
        from: ZoneState,
        to: ZoneState,
        cause: TransitionCause,
    ) -> DeltaOp {
        DeltaOp::SetZoneState {
            zone_id,
            from,
            to,
            cause,
        }
    }

    #[test]
    fn should_apply_escalation_and_detection() {
        let (mut snapshot, zone_id, device_id) = snapshot();
        let mut delta = StateDelta::default();
        delta.push(set_state(
            zone_id,
            ZoneState::Normal,
            ZoneState::Alert,
            TransitionCause::Rule,
        ));
        delta.push(DeltaOp::RecordDetection {
            zone_id,
            detection: Detection {
                event_id: EventId::new(),
                device_id: Some(device_id),
                kind: DetectorKind::Smoke,
                at: now(),
            },
        });
        delta.apply(&mut snapshot).unwrap();

        let zone = snapshot.zone(zone_id).unwrap();
        assert_eq!(zone.state, ZoneState::Alert);
        assert_eq!(zone.detections.len(), 1);
        assert_eq!(delta.resulting_state(zone_id), Some(ZoneState::Alert));
    }

    #[test]
    fn should_refuse_rule_driven_downgrade() {
        let (mut snapshot, zone_id, _) = snapshot();
        snapshot.zones[0].state = ZoneState::Alarm;
        let delta = StateDelta {
            ops: vec![set_state(
                zone_id,
                ZoneState::Alarm,
                ZoneState::Normal,
                TransitionCause::Rule,
            )],
        };
        assert!(matches!(
            delta.apply(&mut snapshot),
            Err(ShipSafeError::Transition(TransitionError::Downgrade { .. }))
        ));
    }

    #[test]
    fn should_refuse_acknowledgment_skipping_recovering() {
        let (mut snapshot, zone_id, _) = snapshot();
        snapshot.zones[0].state = ZoneState::EmergencyStop;
        let delta = StateDelta {
            ops: vec![set_state(
                zone_id,
                ZoneState::EmergencyStop,
                ZoneState::Normal,
                TransitionCause::Acknowledgment,
            )],
        };
        assert!(delta.apply(&mut snapshot).is_err());
    }

    #[test]
    fn should_move_closed_incident_out_of_active_list() {
        let (mut snapshot, zone_id, _) = snapshot();
        let event = Event::new(EventSource::Hub, zone_id, EventKind::SmokeDetected);
        let incident = Incident::open(IncidentCause::Fire, &event, now());
        let incident_id = incident.id;
        let delta = StateDelta {
            ops: vec![
                DeltaOp::OpenIncident {
                    incident: Box::new(incident),
                },
                DeltaOp::AdvanceIncident {
                    incident_id,
                    phase: IncidentPhase::Closed,
                    at: now(),
                },
            ],
        };
        delta.apply(&mut snapshot).unwrap();
        assert!(snapshot.incidents.is_empty());
        assert_eq!(snapshot.closed_incidents.len(), 1);
        assert!(snapshot.incident(incident_id).is_some());
    }

    #[test]
    fn should_list_faulted_devices_after_health_change() {
        let (mut snapshot, zone_id, device_id) = snapshot();
        let delta = StateDelta {
            ops: vec![DeltaOp::SetDeviceHealth {
                device_id,
                health: DeviceHealth::Offline,
            }],
        };
        delta.apply(&mut snapshot).unwrap();
        let zone = snapshot.zone(zone_id).unwrap();
        assert_eq!(zone.faulted, vec!["FD-CH-001".to_string()]);
        assert!(zone.corroboration_degraded);
    }
}
