//! Interlock engine: evaluates one event against the rule set.
//!
//! Evaluation is pure: it reads a snapshot and returns a [`Decision`]. The
//! hub applies the delta to a working copy and dispatches the commands.

use shipsafe_domain::command::{AlarmType, Causation, Command, CommandKind};
use shipsafe_domain::device::{DeviceHealth, Reading};
use shipsafe_domain::error::{NotFoundError, ShipSafeError, TransitionError};
use shipsafe_domain::event::{Event, EventKind};
use shipsafe_domain::id::IncidentId;
use shipsafe_domain::incident::{AckStage, Incident, IncidentCause, IncidentPhase};
use shipsafe_domain::interlock::{
    CommandTemplate, DeltaOp, InterlockPolicy, InterlockRule, RuleContext, StateDelta,
    TransitionCause, TransitionEffect, default_rules,
};
use shipsafe_domain::snapshot::{Detection, Snapshot, ZoneView};
use shipsafe_domain::time::{Timestamp, now};
use shipsafe_domain::zone::ZoneState;

/// Outcome of evaluating one event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decision {
    pub delta: StateDelta,
    /// Commands to dispatch, containment first.
    pub commands: Vec<Command>,
    /// Names of the rules that were applied.
    pub fired: Vec<String>,
    /// Rules that matched but lost to a higher class.
    pub suppressed: Vec<String>,
    /// The incident the event belongs to once the delta is applied.
    pub incident_id: Option<IncidentId>,
}

#[derive(Debug, Clone)]
pub struct InterlockEngine {
    rules: Vec<InterlockRule>,
    policy: InterlockPolicy,
}

impl InterlockEngine {
    #[must_use]
    pub fn new(rules: Vec<InterlockRule>, policy: InterlockPolicy) -> Self {
        Self { rules, policy }
    }

    #[must_use]
    pub fn with_default_rules(policy: InterlockPolicy) -> Self {
        Self::new(default_rules(), policy)
    }

    #[must_use]
    pub fn policy(&self) -> &InterlockPolicy {
        &self.policy
    }

    #[must_use]
    pub fn rules(&self) -> &[InterlockRule] {
        &self.rules
    }

    /// Evaluate `event` against `snapshot`.
    ///
    /// All matching rules of the highest class are applied together; the
    /// zone moves to the most severe target among them. Lower classes are
    /// reported as suppressed. Commands are deduplicated by kind and ordered
    /// containment, surveillance, broadcast, notification.
    ///
    /// # Errors
    ///
    /// - [`ShipSafeError::NotFound`] if the event's zone is unknown, or an
    ///   acknowledgment names an incident that is not open in that zone
    /// - [`ShipSafeError::Transition`] if an acknowledgment is not eligible
    pub fn evaluate(&self, snapshot: &Snapshot, event: &Event) -> Result<Decision, ShipSafeError> {
        let zone = snapshot.zone(event.zone_id).ok_or_else(|| NotFoundError {
            entity: "zone",
            id: event.zone_id.to_string(),
        })?;
        let device = event.device_id.and_then(|id| snapshot.device(id));
        let ctx = RuleContext {
            event,
            zone,
            device,
            policy: &self.policy,
        };
        let at = now();

        let matched: Vec<&InterlockRule> = self
            .rules
            .iter()
            .filter(|rule| rule.trigger.matches(&ctx))
            .collect();
        let top = matched.iter().map(|rule| rule.class).max();
        let (applied, suppressed): (Vec<&InterlockRule>, Vec<&InterlockRule>) = matched
            .into_iter()
            .partition(|rule| Some(rule.class) == top);

        let mut delta = StateDelta::default();
        record_observation(&mut delta, snapshot, event);

        let from = zone.state;
        let mut to = from;
        let mut ack_stage = None;
        let incident_id;

        if applied
            .iter()
            .any(|rule| rule.transition == TransitionEffect::Acknowledge)
        {
            let (incident, stage, operator) = acknowledgment_target(snapshot, zone, event)?;
            to = from.acknowledge()?;
            delta.push(DeltaOp::SetZoneState {
                zone_id: zone.id,
                from,
                to,
                cause: TransitionCause::Acknowledgment,
            });
            delta.push(DeltaOp::AcknowledgeIncident {
                incident_id: incident.id,
                operator: operator.to_string(),
            });
            let phase = match stage {
                AckStage::Resolve => {
                    delta.push(DeltaOp::ClearDetections { zone_id: zone.id });
                    IncidentPhase::Resolved
                }
                AckStage::Close => IncidentPhase::Closed,
            };
            delta.push(DeltaOp::AdvanceIncident {
                incident_id: incident.id,
                phase,
                at,
            });
            ack_stage = Some(stage);
            incident_id = Some(incident.id);
        } else {
            let escalating = || {
                applied.iter().filter_map(|rule| match rule.transition {
                    TransitionEffect::EscalateTo(target) => Some((rule, target)),
                    _ => None,
                })
            };
            if let Some(target) = escalating().map(|(_, target)| target).max()
                && target > from
            {
                to = from.escalate_to(target)?;
                delta.push(DeltaOp::SetZoneState {
                    zone_id: zone.id,
                    from,
                    to,
                    cause: TransitionCause::Rule,
                });
            }
            let cause = escalating()
                .filter_map(|(rule, _)| rule.class.incident_cause())
                .max();
            incident_id = track_incident(
                &mut delta,
                snapshot.active_incident(zone.id),
                event,
                cause,
                (from, to),
                at,
            );
        }

        let causation = Causation {
            event_id: event.id,
            incident_id,
        };
        let mut commands: Vec<Command> = Vec::new();
        for rule in &applied {
            for template in &rule.commands {
                let Some(command) = instantiate(template, &ctx, rule, causation, to, ack_stage)
                else {
                    continue;
                };
                if commands.iter().all(|issued| issued.kind != command.kind) {
                    commands.push(command);
                }
            }
        }
        commands.sort_by_key(Command::phase);

        Ok(Decision {
            delta,
            commands,
            fired: applied.iter().map(|rule| rule.name.clone()).collect(),
            suppressed: suppressed.iter().map(|rule| rule.name.clone()).collect(),
            incident_id,
        })
    }
}

/// Detections, readings and health changes carried by the event itself.
fn record_observation(delta: &mut StateDelta, snapshot: &Snapshot, event: &Event) {
    if let Some(kind) = event.kind.detector() {
        delta.push(DeltaOp::RecordDetection {
            zone_id: event.zone_id,
            detection: Detection {
                event_id: event.id,
                device_id: event.device_id,
                kind,
                at: event.occurred_at,
            },
        });
    }

    let Some(device) = event.device_id.and_then(|id| snapshot.device(id)) else {
        return;
    };
    if let Some(value) = event.payload.get("value").and_then(serde_json::Value::as_f64) {
        delta.push(DeltaOp::RecordReading {
            device_id: device.id,
            reading: Reading {
                value,
                at: event.occurred_at,
            },
        });
    }
    let health = match event.kind {
        EventKind::DeviceFault => Some(DeviceHealth::Fault),
        EventKind::DeviceOffline => Some(DeviceHealth::Offline),
        EventKind::DeviceRestored => Some(DeviceHealth::Ok),
        _ => None,
    };
    if let Some(health) = health.filter(|health| *health != device.health) {
        delta.push(DeltaOp::SetDeviceHealth {
            device_id: device.id,
            health,
        });
    }
}

fn acknowledgment_target<'a>(
    snapshot: &'a Snapshot,
    zone: &ZoneView,
    event: &'a Event,
) -> Result<(&'a Incident, AckStage, &'a str), ShipSafeError> {
    let EventKind::Acknowledged {
        incident_id,
        operator,
    } = &event.kind
    else {
        return Err(TransitionError::NotAcknowledgeable(zone.state).into());
    };
    let incident = snapshot
        .incidents
        .iter()
        .find(|incident| incident.id == *incident_id && incident.zone_id == zone.id)
        .ok_or_else(|| NotFoundError {
            entity: "incident",
            id: incident_id.to_string(),
        })?;
    let stage = AckStage::for_state(zone.state, incident)
        .map_err(|_| TransitionError::NotAcknowledgeable(zone.state))?;
    Ok((incident, stage, operator.as_str()))
}

/// Open, attach to, or supersede the zone's incident.
///
/// A zone holds at most one open incident. An escalation while the current
/// incident is resolved but not yet closed closes it and opens a new one.
/// The response clock starts at the event that escalates the zone to ALARM
/// or above, or that upgrades the cause of an incident already there.
fn track_incident(
    delta: &mut StateDelta,
    active: Option<&Incident>,
    event: &Event,
    cause: Option<IncidentCause>,
    (from, to): (ZoneState, ZoneState),
    at: Timestamp,
) -> Option<IncidentId> {
    let escalated = to > from;
    let mut upgraded = false;
    let incident_id = match (active, cause) {
        (Some(incident), Some(cause)) if escalated && incident.awaits_closure() => {
            delta.push(DeltaOp::AdvanceIncident {
                incident_id: incident.id,
                phase: IncidentPhase::Closed,
                at,
            });
            open_incident(delta, cause, event, at)
        }
        (Some(incident), cause) => {
            delta.push(DeltaOp::AttachEvent {
                incident_id: incident.id,
                event_id: event.id,
            });
            if let Some(cause) = cause.filter(|cause| *cause > incident.cause) {
                delta.push(DeltaOp::UpgradeCause {
                    incident_id: incident.id,
                    cause,
                });
                upgraded = true;
            }
            incident.id
        }
        (None, Some(cause)) if escalated => open_incident(delta, cause, event, at),
        (None, _) => return None,
    };

    let current = active
        .filter(|incident| incident.id == incident_id)
        .map_or(IncidentPhase::Opened, |incident| incident.phase);
    if let Some(phase) = phase_for(to).filter(|phase| *phase > current) {
        delta.push(DeltaOp::AdvanceIncident {
            incident_id,
            phase,
            at,
        });
    }
    if to >= ZoneState::Alarm && (escalated || upgraded) {
        delta.push(DeltaOp::MarkResponseDue {
            incident_id,
            at: event.occurred_at,
        });
    }
    Some(incident_id)
}

fn open_incident(
    delta: &mut StateDelta,
    cause: IncidentCause,
    event: &Event,
    at: Timestamp,
) -> IncidentId {
    let incident = Incident::open(cause, event, at);
    let id = incident.id;
    delta.push(DeltaOp::OpenIncident {
        incident: Box::new(incident),
    });
    id
}

fn phase_for(state: ZoneState) -> Option<IncidentPhase> {
    match state {
        ZoneState::Alarm | ZoneState::EmergencyStop => Some(IncidentPhase::Escalating),
        ZoneState::Isolated => Some(IncidentPhase::Contained),
        _ => None,
    }
}

fn instantiate(
    template: &CommandTemplate,
    ctx: &RuleContext<'_>,
    rule: &InterlockRule,
    causation: Causation,
    issued_under: ZoneState,
    ack_stage: Option<AckStage>,
) -> Option<Command> {
    let kind = match template {
        CommandTemplate::RetryFailed => {
            return match &ctx.event.kind {
                EventKind::CommandFailed { command, .. } => {
                    Some(command.retry(causation, issued_under))
                }
                _ => None,
            };
        }
        CommandTemplate::AllClearOnClose => {
            (ack_stage == Some(AckStage::Close)).then_some(CommandKind::SoundAlarm {
                alarm: AlarmType::AllClear,
            })?
        }
        template => template.render(ctx, rule.class.incident_cause())?,
    };
    Some(Command::new(ctx.zone.id, kind, causation, issued_under))
}
