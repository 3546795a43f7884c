//! Incident: a correlated group of events and decisions for one zone.
//!
//! Incidents are created, advanced and closed only by the coordination hub.
//! They reference events and commands by identity.

use serde::{Deserialize, Serialize};

use crate::command::Command;
use crate::error::{AckRejection, TransitionError};
use crate::event::Event;
use crate::id::{CommandId, EventId, IncidentId, ZoneId};
use crate::time::Timestamp;
use crate::zone::ZoneState;

/// Lifecycle phase. Phases only move forward; skipping is allowed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum IncidentPhase {
    #[default]
    Opened,
    Escalating,
    Contained,
    Resolved,
    Closed,
}

impl std::fmt::Display for IncidentPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Opened => f.write_str("opened"),
            Self::Escalating => f.write_str("escalating"),
            Self::Contained => f.write_str("contained"),
            Self::Resolved => f.write_str("resolved"),
            Self::Closed => f.write_str("closed"),
        }
    }
}

/// Root cause category, least severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentCause {
    DeviceFault,
    Intrusion,
    ManOverboard,
    Fire,
    EmergencyStop,
}

impl std::fmt::Display for IncidentCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DeviceFault => f.write_str("device_fault"),
            Self::Intrusion => f.write_str("intrusion"),
            Self::ManOverboard => f.write_str("man_overboard"),
            Self::Fire => f.write_str("fire"),
            Self::EmergencyStop => f.write_str("emergency_stop"),
        }
    }
}

/// The first corrective command dispatched for an incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub command_id: CommandId,
    pub issued_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incident {
    pub id: IncidentId,
    pub zone_id: ZoneId,
    pub cause: IncidentCause,
    pub phase: IncidentPhase,
    /// The first qualifying event and when it occurred.
    pub trigger_event: EventId,
    pub triggered_at: Timestamp,
    pub opened_at: Timestamp,
    /// When the event that first required a corrective response occurred.
    /// Unset while the incident only warrants observation.
    pub response_due_at: Option<Timestamp>,
    pub escalated_at: Option<Timestamp>,
    pub contained_at: Option<Timestamp>,
    pub resolved_at: Option<Timestamp>,
    pub closed_at: Option<Timestamp>,
    pub events: Vec<EventId>,
    pub commands: Vec<CommandId>,
    pub failed_commands: Vec<CommandId>,
    pub first_response: Option<ResponseRecord>,
    pub acknowledged_by: Vec<String>,
}

impl Incident {
    /// Open a new incident from its first qualifying event.
    #[must_use]
    pub fn open(cause: IncidentCause, event: &Event, at: Timestamp) -> Self {
        Self {
            id: IncidentId::new(),
            zone_id: event.zone_id,
            cause,
            phase: IncidentPhase::Opened,
            trigger_event: event.id,
            triggered_at: event.occurred_at,
            opened_at: at,
            response_due_at: None,
            escalated_at: None,
            contained_at: None,
            resolved_at: None,
            closed_at: None,
            events: vec![event.id],
            commands: Vec::new(),
            failed_commands: Vec::new(),
            first_response: None,
            acknowledged_by: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.phase != IncidentPhase::Closed
    }

    #[must_use]
    pub fn first_response_at(&self) -> Option<Timestamp> {
        self.first_response.map(|record| record.issued_at)
    }

    /// Time from the moment a response became due to the first corrective
    /// command.
    #[must_use]
    pub fn response_latency(&self) -> Option<chrono::Duration> {
        let due = self.response_due_at?;
        self.first_response
            .map(|record| (record.issued_at - due).max(chrono::Duration::zero()))
    }

    /// Whether a corrective response is due and none has been dispatched.
    #[must_use]
    pub fn awaits_response(&self) -> bool {
        self.response_due_at.is_some() && self.first_response.is_none()
    }

    /// Start the response clock at `at`.
    ///
    /// While no response has been dispatched a later call restarts the clock,
    /// so a cause upgrade is timed from the upgrading event. Once answered the
    /// clock is fixed.
    pub fn mark_response_due(&mut self, at: Timestamp) {
        if self.first_response.is_none() {
            self.response_due_at = Some(at);
        }
    }

    /// Move the incident forward to `phase`, stamping the milestone.
    ///
    /// Staying in the current phase is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::Incident`] when `phase` is behind the
    /// current phase.
    pub fn advance(&mut self, phase: IncidentPhase, at: Timestamp) -> Result<(), TransitionError> {
        if phase < self.phase {
            return Err(TransitionError::Incident {
                from: self.phase,
                to: phase,
            });
        }
        if phase == self.phase {
            return Ok(());
        }
        self.phase = phase;
        let milestone = match phase {
            IncidentPhase::Opened => return Ok(()),
            IncidentPhase::Escalating => &mut self.escalated_at,
            IncidentPhase::Contained => &mut self.contained_at,
            IncidentPhase::Resolved => &mut self.resolved_at,
            IncidentPhase::Closed => &mut self.closed_at,
        };
        milestone.get_or_insert(at);
        Ok(())
    }

    /// Raise the cause if `cause` is more severe.
    pub fn upgrade_cause(&mut self, cause: IncidentCause) {
        self.cause = self.cause.max(cause);
    }

    pub fn attach_event(&mut self, event_id: EventId) {
        if !self.events.contains(&event_id) {
            self.events.push(event_id);
        }
    }

    /// Record a dispatched command, tracking the first corrective response
    /// once one is due.
    pub fn record_command(&mut self, command: &Command) {
        if !self.commands.contains(&command.id) {
            self.commands.push(command.id);
        }
        if self.awaits_response() && command.kind.is_corrective() {
            self.first_response = Some(ResponseRecord {
                command_id: command.id,
                issued_at: command.issued_at,
            });
        }
    }

    pub fn record_failure(&mut self, command_id: CommandId) {
        if !self.failed_commands.contains(&command_id) {
            self.failed_commands.push(command_id);
        }
    }

    /// Whether a first-stage acknowledgment (to RESOLVED) applies.
    #[must_use]
    pub fn awaits_resolution(&self) -> bool {
        self.phase < IncidentPhase::Resolved
    }

    /// Whether a second-stage acknowledgment (to CLOSED) applies.
    #[must_use]
    pub fn awaits_closure(&self) -> bool {
        self.phase == IncidentPhase::Resolved
    }
}

/// Which step an operator acknowledgment performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckStage {
    /// Zone → RECOVERING, incident → RESOLVED.
    Resolve,
    /// Zone → NORMAL, incident → CLOSED.
    Close,
}

impl AckStage {
    /// Decide the acknowledgment step for `incident` in a zone at `zone_state`.
    ///
    /// # Errors
    ///
    /// - [`AckRejection::IncidentClosed`] when the incident is closed
    /// - [`AckRejection::NotEligible`] for any other combination than an
    ///   active zone with an unresolved incident, or a recovering zone with a
    ///   resolved incident
    pub fn for_state(zone_state: ZoneState, incident: &Incident) -> Result<Self, AckRejection> {
        if !incident.is_active() {
            return Err(AckRejection::IncidentClosed);
        }
        if zone_state.is_active() && incident.awaits_resolution() {
            return Ok(Self::Resolve);
        }
        if zone_state == ZoneState::Recovering && incident.awaits_closure() {
            return Ok(Self::Close);
        }
        Err(AckRejection::NotEligible {
            zone_state,
            phase: incident.phase,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Causation, CommandKind};
    use crate::event::{EventKind, EventSource};
    use crate::time::now;

    fn smoke_event() -> Event {
        Event::new(EventSource::Hub, ZoneId::new(), EventKind::SmokeDetected)
    }

    fn command(incident: &Incident, kind: CommandKind) -> Command {
        Command::new(
            incident.zone_id,
            kind,
            Causation {
                event_id: incident.trigger_event,
                incident_id: Some(incident.id),
            },
            ZoneState::Alarm,
        )
    }

    #[test]
    fn should_open_with_trigger_event_attached() {
        let event = smoke_event();
        let incident = Incident::open(IncidentCause::Fire, &event, now());
        assert_eq!(incident.phase, IncidentPhase::Opened);
        assert_eq!(incident.events, vec![event.id]);
        assert_eq!(incident.zone_id, event.zone_id);
        assert!(incident.is_active());
    }

    #[test]
    fn should_stamp_milestones_when_advancing() {
        let mut incident = Incident::open(IncidentCause::Fire, &smoke_event(), now());
        incident.advance(IncidentPhase::Escalating, now()).unwrap();
        incident.advance(IncidentPhase::Contained, now()).unwrap();
        assert!(incident.escalated_at.is_some());
        assert!(incident.contained_at.is_some());
        assert!(incident.resolved_at.is_none());
    }

    #[test]
    fn should_refuse_to_move_backwards() {
        let mut incident = Incident::open(IncidentCause::Fire, &smoke_event(), now());
        incident.advance(IncidentPhase::Resolved, now()).unwrap();
        let result = incident.advance(IncidentPhase::Escalating, now());
        assert_eq!(
            result,
            Err(TransitionError::Incident {
                from: IncidentPhase::Resolved,
                to: IncidentPhase::Escalating,
            })
        );
    }

    #[test]
    fn should_only_upgrade_cause() {
        let mut incident = Incident::open(IncidentCause::Fire, &smoke_event(), now());
        incident.upgrade_cause(IncidentCause::Intrusion);
        assert_eq!(incident.cause, IncidentCause::Fire);
        incident.upgrade_cause(IncidentCause::EmergencyStop);
        assert_eq!(incident.cause, IncidentCause::EmergencyStop);
    }

    #[test]
    fn should_track_first_corrective_command_only() {
        let mut incident = Incident::open(IncidentCause::Fire, &smoke_event(), now());
        incident.mark_response_due(now());
        let focus = command(&incident, CommandKind::FocusCameras);
        let isolate = command(&incident, CommandKind::IsolateZone);
        let stop = command(&incident, CommandKind::StopPower);

        incident.record_command(&focus);
        assert!(incident.first_response.is_none());
        incident.record_command(&isolate);
        incident.record_command(&stop);

        assert_eq!(incident.first_response.unwrap().command_id, isolate.id);
        assert_eq!(incident.commands.len(), 3);
        assert!(incident.response_latency().is_some());
    }

    #[test]
    fn should_not_count_commands_issued_before_a_response_is_due() {
        let mut incident = Incident::open(IncidentCause::Fire, &smoke_event(), now());
        let all_clear = command(
            &incident,
            CommandKind::SoundAlarm {
                alarm: crate::command::AlarmType::AllClear,
            },
        );
        incident.record_command(&all_clear);
        assert!(incident.first_response.is_none());
        assert!(incident.response_latency().is_none());
        assert!(!incident.awaits_response());
    }

    #[test]
    fn should_time_latency_from_when_response_became_due() {
        let event = smoke_event();
        let mut incident = Incident::open(IncidentCause::Fire, &event, event.occurred_at);
        let due = event.occurred_at + chrono::Duration::seconds(60);
        incident.mark_response_due(due);
        assert!(incident.awaits_response());

        let mut isolate = command(&incident, CommandKind::IsolateZone);
        isolate.issued_at = due + chrono::Duration::milliseconds(200);
        incident.record_command(&isolate);

        assert_eq!(
            incident.response_latency(),
            Some(chrono::Duration::milliseconds(200))
        );
        incident.mark_response_due(due + chrono::Duration::seconds(30));
        assert_eq!(incident.response_due_at, Some(due));
    }

    #[test]
    fn should_restart_response_clock_while_unanswered() {
        let event = smoke_event();
        let mut incident = Incident::open(IncidentCause::Intrusion, &event, event.occurred_at);
        incident.mark_response_due(event.occurred_at);
        let upgraded_at = event.occurred_at + chrono::Duration::seconds(90);
        incident.mark_response_due(upgraded_at);
        assert_eq!(incident.response_due_at, Some(upgraded_at));
    }

    #[test]
    fn should_not_duplicate_attached_events() {
        let event = smoke_event();
        let mut incident = Incident::open(IncidentCause::Fire, &event, now());
        incident.attach_event(event.id);
        assert_eq!(incident.events.len(), 1);
    }

    #[test]
    fn should_resolve_then_close_through_two_acknowledgments() {
        let mut incident = Incident::open(IncidentCause::Fire, &smoke_event(), now());
        assert_eq!(
            AckStage::for_state(ZoneState::Alarm, &incident),
            Ok(AckStage::Resolve)
        );
        incident.advance(IncidentPhase::Resolved, now()).unwrap();
        assert_eq!(
            AckStage::for_state(ZoneState::Recovering, &incident),
            Ok(AckStage::Close)
        );
        incident.advance(IncidentPhase::Closed, now()).unwrap();
        assert_eq!(
            AckStage::for_state(ZoneState::Normal, &incident),
            Err(AckRejection::IncidentClosed)
        );
    }

    #[test]
    fn should_reject_acknowledgment_of_resolved_incident_in_active_zone() {
        let mut incident = Incident::open(IncidentCause::Fire, &smoke_event(), now());
        incident.advance(IncidentPhase::Resolved, now()).unwrap();
        assert_eq!(
            AckStage::for_state(ZoneState::Alarm, &incident),
            Err(AckRejection::NotEligible {
                zone_state: ZoneState::Alarm,
                phase: IncidentPhase::Resolved,
            })
        );
    }
}
