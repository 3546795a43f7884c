//! Interlock rules: declarative (trigger, transition, commands) tuples.

use serde::{Deserialize, Serialize};

use crate::command::{AlarmType, CommandKind, CommandPhase, FailureReason, MessagePriority};
use crate::device::Device;
use crate::event::{Event, EventKind};
use crate::incident::IncidentCause;
use crate::snapshot::ZoneView;
use crate::time::to_chrono;
use crate::zone::ZoneState;

use super::InterlockPolicy;

/// Priority class of a rule, lowest first. When several rules match one
/// event, only the highest class is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleClass {
    Operator,
    Motion,
    Fault,
    Distress,
    Fire,
    Stop,
}

impl RuleClass {
    /// Cause of an incident opened by a rule of this class.
    #[must_use]
    pub fn incident_cause(self) -> Option<IncidentCause> {
        match self {
            Self::Operator => None,
            Self::Motion => Some(IncidentCause::Intrusion),
            Self::Fault => Some(IncidentCause::DeviceFault),
            Self::Distress => Some(IncidentCause::ManOverboard),
            Self::Fire => Some(IncidentCause::Fire),
            Self::Stop => Some(IncidentCause::EmergencyStop),
        }
    }
}

impl std::fmt::Display for RuleClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Operator => f.write_str("operator"),
            Self::Motion => f.write_str("motion"),
            Self::Fault => f.write_str("fault"),
            Self::Distress => f.write_str("distress"),
            Self::Fire => f.write_str("fire"),
            Self::Stop => f.write_str("stop"),
        }
    }
}

/// Everything a trigger may look at. Read-only.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub event: &'a Event,
    pub zone: &'a ZoneView,
    /// The reporting device, when the event came from one.
    pub device: Option<&'a Device>,
    pub policy: &'a InterlockPolicy,
}

impl RuleContext<'_> {
    /// A detection of another kind in the same zone, inside the window.
    #[must_use]
    pub fn is_corroborated(&self) -> bool {
        let Some(kind) = self.event.kind.detector() else {
            return false;
        };
        let window = to_chrono(self.policy.corroboration_window);
        self.zone.detections.iter().any(|detection| {
            detection.kind != kind
                && (self.event.occurred_at - detection.at).abs() <= window
        })
    }
}

/// Predicate over event and zone state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleTrigger {
    StopPressed,
    /// A containment command failed for good: device offline or retries exhausted.
    ContainmentFallback,
    /// A containment command failed transiently and attempts remain.
    ContainmentRetry,
    DetectorCorroborated,
    DetectorSingle,
    IsolationConfirmed,
    ManOverboard,
    BroadcastRetry,
    SafetyDeviceFault,
    RestrictedMotion,
    Motion,
    Acknowledged,
}

impl RuleTrigger {
    #[must_use]
    pub fn matches(self, ctx: &RuleContext<'_>) -> bool {
        let state = ctx.zone.state;
        match self {
            Self::StopPressed => ctx.event.kind == EventKind::StopPressed,
            Self::ContainmentFallback => match &ctx.event.kind {
                EventKind::CommandFailed { command, failure } => {
                    command.phase() == CommandPhase::Containment
                        && state < ZoneState::EmergencyStop
                        && (failure.reason == FailureReason::DeviceOffline
                            || command.attempt >= ctx.policy.containment_retries)
                }
                _ => false,
            },
            Self::ContainmentRetry => match &ctx.event.kind {
                EventKind::CommandFailed { command, failure } => {
                    command.phase() == CommandPhase::Containment
                        && failure.reason != FailureReason::DeviceOffline
                        && command.attempt < ctx.policy.containment_retries
                        && !command.is_superseded_by(state)
                }
                _ => false,
            },
            Self::DetectorCorroborated => {
                ctx.event.kind.detector().is_some()
                    && state < ZoneState::Alarm
                    && ctx.is_corroborated()
            }
            Self::DetectorSingle => {
                ctx.event.kind.detector().is_some()
                    && state < ZoneState::Alarm
                    && !ctx.is_corroborated()
            }
            Self::IsolationConfirmed => {
                ctx.event.kind == EventKind::IsolationConfirmed && state == ZoneState::Alarm
            }
            Self::ManOverboard => ctx.event.kind == EventKind::ManOverboard,
            Self::BroadcastRetry => match &ctx.event.kind {
                EventKind::CommandFailed { command, .. } => {
                    matches!(
                        command.phase(),
                        CommandPhase::Broadcast | CommandPhase::Notification
                    ) && command.attempt < ctx.policy.broadcast_retries
                        && !command.is_superseded_by(state)
                }
                _ => false,
            },
            Self::SafetyDeviceFault => {
                matches!(
                    ctx.event.kind,
                    EventKind::DeviceFault | EventKind::DeviceOffline
                ) && ctx
                    .device
                    .is_some_and(|device| device.kind.is_safety_critical())
            }
            Self::RestrictedMotion => match ctx.event.kind {
                EventKind::MotionDetected => ctx.zone.restricted,
                EventKind::CameraAlarm => true,
                _ => false,
            },
            Self::Motion => ctx.event.kind == EventKind::MotionDetected && !ctx.zone.restricted,
            Self::Acknowledged => matches!(ctx.event.kind, EventKind::Acknowledged { .. }),
        }
    }
}

/// Zone-state effect of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionEffect {
    None,
    EscalateTo(ZoneState),
    /// One acknowledgment step: active → RECOVERING, RECOVERING → NORMAL.
    Acknowledge,
}

/// A command a rule emits, rendered against the zone at evaluation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandTemplate {
    StopPower,
    IsolateZone,
    /// Only for zones with a fixed suppression medium.
    ActivateSuppression,
    FocusCameras,
    StartRecording,
    SoundAlarm(AlarmType),
    Announce(String),
    SafetyMessage(MessagePriority),
    Distress,
    /// Re-issue the failed command carried by the event.
    RetryFailed,
    /// All-clear alarm, only when the acknowledgment closes the incident.
    AllClearOnClose,
}

impl CommandTemplate {
    /// Render a command kind for the zone in `ctx`.
    ///
    /// Returns `None` when the template does not apply, and for the two
    /// templates that need hub context ([`RetryFailed`](Self::RetryFailed),
    /// [`AllClearOnClose`](Self::AllClearOnClose)).
    #[must_use]
    pub fn render(
        &self,
        ctx: &RuleContext<'_>,
        cause: Option<IncidentCause>,
    ) -> Option<CommandKind> {
        let zone = &ctx.zone.name;
        match self {
            Self::StopPower => Some(CommandKind::StopPower),
            Self::IsolateZone => Some(CommandKind::IsolateZone),
            Self::ActivateSuppression => ctx
                .zone
                .suppression
                .map(|medium| CommandKind::ActivateSuppression { medium }),
            Self::FocusCameras => Some(CommandKind::FocusCameras),
            Self::StartRecording => Some(CommandKind::StartRecording),
            Self::SoundAlarm(alarm) => Some(CommandKind::SoundAlarm { alarm: *alarm }),
            Self::Announce(message) => Some(CommandKind::Announce {
                message: format!("{zone}: {message}"),
            }),
            Self::SafetyMessage(priority) => Some(CommandKind::SendSafetyMessage {
                priority: *priority,
                message: match cause {
                    Some(cause) => format!("{cause} in {zone}"),
                    None => format!("safety event in {zone}"),
                },
            }),
            Self::Distress => Some(CommandKind::SendDistress {
                nature: format!("man overboard reported at {zone}"),
            }),
            Self::RetryFailed | Self::AllClearOnClose => None,
        }
    }
}

/// A declarative interlock rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterlockRule {
    pub name: String,
    pub class: RuleClass,
    pub trigger: RuleTrigger,
    pub transition: TransitionEffect,
    pub commands: Vec<CommandTemplate>,
}

impl InterlockRule {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        class: RuleClass,
        trigger: RuleTrigger,
        transition: TransitionEffect,
        commands: Vec<CommandTemplate>,
    ) -> Self {
        Self {
            name: name.into(),
            class,
            trigger,
            transition,
            commands,
        }
    }
}

/// The vessel's default interlock rule set.
#[must_use]
pub fn default_rules() -> Vec<InterlockRule> {
    use CommandTemplate as C;

    vec![
        InterlockRule::new(
            "stop-pressed",
            RuleClass::Stop,
            RuleTrigger::StopPressed,
            TransitionEffect::EscalateTo(ZoneState::EmergencyStop),
            vec![
                C::StopPower,
                C::FocusCameras,
                C::SoundAlarm(AlarmType::General),
                C::SafetyMessage(MessagePriority::Urgency),
            ],
        ),
        InterlockRule::new(
            "isolation-fallback",
            RuleClass::Stop,
            RuleTrigger::ContainmentFallback,
            TransitionEffect::EscalateTo(ZoneState::EmergencyStop),
            vec![
                C::StopPower,
                C::SoundAlarm(AlarmType::General),
                C::SafetyMessage(MessagePriority::Urgency),
            ],
        ),
        InterlockRule::new(
            "fire-corroborated",
            RuleClass::Fire,
            RuleTrigger::DetectorCorroborated,
            TransitionEffect::EscalateTo(ZoneState::Alarm),
            vec![
                C::IsolateZone,
                C::ActivateSuppression,
                C::FocusCameras,
                C::SoundAlarm(AlarmType::Fire),
                C::SafetyMessage(MessagePriority::Urgency),
            ],
        ),
        InterlockRule::new(
            "fire-single-detector",
            RuleClass::Fire,
            RuleTrigger::DetectorSingle,
            TransitionEffect::EscalateTo(ZoneState::Alert),
            Vec::new(),
        ),
        InterlockRule::new(
            "isolation-confirmed",
            RuleClass::Fire,
            RuleTrigger::IsolationConfirmed,
            TransitionEffect::EscalateTo(ZoneState::Isolated),
            vec![C::Announce("zone isolated".to_string())],
        ),
        InterlockRule::new(
            "containment-retry",
            RuleClass::Fire,
            RuleTrigger::ContainmentRetry,
            TransitionEffect::None,
            vec![C::RetryFailed],
        ),
        InterlockRule::new(
            "man-overboard",
            RuleClass::Distress,
            RuleTrigger::ManOverboard,
            TransitionEffect::EscalateTo(ZoneState::Alarm),
            vec![
                C::FocusCameras,
                C::SoundAlarm(AlarmType::ManOverboard),
                C::Distress,
            ],
        ),
        InterlockRule::new(
            "broadcast-retry",
            RuleClass::Distress,
            RuleTrigger::BroadcastRetry,
            TransitionEffect::None,
            vec![C::RetryFailed],
        ),
        InterlockRule::new(
            "safety-device-fault",
            RuleClass::Fault,
            RuleTrigger::SafetyDeviceFault,
            TransitionEffect::EscalateTo(ZoneState::Alert),
            vec![C::FocusCameras],
        ),
        InterlockRule::new(
            "restricted-motion",
            RuleClass::Motion,
            RuleTrigger::RestrictedMotion,
            TransitionEffect::EscalateTo(ZoneState::Alert),
            vec![C::StartRecording],
        ),
        InterlockRule::new(
            "motion-recording",
            RuleClass::Motion,
            RuleTrigger::Motion,
            TransitionEffect::None,
            vec![C::StartRecording],
        ),
        InterlockRule::new(
            "operator-acknowledgment",
            RuleClass::Operator,
            RuleTrigger::Acknowledged,
            TransitionEffect::Acknowledge,
            vec![C::AllClearOnClose],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Causation, Command, CommandFailure};
    use crate::device::DetectorKind;
    use crate::event::EventSource;
    use crate::id::{EventId, ZoneId};
    use crate::snapshot::Detection;
    use crate::time::now;

    fn zone(state: ZoneState) -> ZoneView {
        ZoneView {
            id: ZoneId::new(),
            name: "engine_room".to_string(),
            restricted: false,
            suppression: None,
            state,
            devices: Vec::new(),
            faulted: Vec::new(),
            detections: Vec::new(),
            corroboration_degraded: false,
        }
    }

    fn event(zone: &ZoneView, kind: EventKind) -> Event {
        Event::new(EventSource::Hub, zone.id, kind)
    }

    fn failed(zone: &ZoneView, kind: CommandKind, attempt: u32, failure: CommandFailure) -> Event {
        let mut command = Command::new(
            zone.id,
            kind,
            Causation {
                event_id: EventId::new(),
                incident_id: None,
            },
            ZoneState::Alarm,
        );
        command.attempt = attempt;
        Event::command_failed(command, failure)
    }

    fn matches(trigger: RuleTrigger, zone: &ZoneView, event: &Event) -> bool {
        let policy = InterlockPolicy::default();
        trigger.matches(&RuleContext {
            event,
            zone,
            device: None,
            policy: &policy,
        })
    }

    #[test]
    fn should_match_stop_pressed_in_any_state() {
        for state in [ZoneState::Normal, ZoneState::Alarm, ZoneState::EmergencyStop] {
            let zone = zone(state);
            let event = event(&zone, EventKind::StopPressed);
            assert!(matches(RuleTrigger::StopPressed, &zone, &event));
        }
    }

    #[test]
    fn should_corroborate_only_different_kind_inside_window() {
        let mut zone = zone(ZoneState::Alert);
        let heat = event(&zone, EventKind::HeatDetected);
        zone.detections.push(Detection {
            event_id: EventId::new(),
            device_id: None,
            kind: DetectorKind::Heat,
            at: heat.occurred_at - chrono::Duration::seconds(2),
        });
        assert!(!matches(RuleTrigger::DetectorCorroborated, &zone, &heat));
        assert!(matches(RuleTrigger::DetectorSingle, &zone, &heat));

        let smoke = event(&zone, EventKind::SmokeDetected);
        assert!(matches(RuleTrigger::DetectorCorroborated, &zone, &smoke));

        let late = event(&zone, EventKind::SmokeDetected)
            .with_occurred_at(now() + chrono::Duration::seconds(30));
        assert!(!matches(RuleTrigger::DetectorCorroborated, &zone, &late));
    }

    #[test]
    fn should_ignore_detectors_once_zone_is_in_alarm() {
        let zone = zone(ZoneState::Alarm);
        let smoke = event(&zone, EventKind::SmokeDetected);
        assert!(!matches(RuleTrigger::DetectorSingle, &zone, &smoke));
        assert!(!matches(RuleTrigger::DetectorCorroborated, &zone, &smoke));
    }

    #[test]
    fn should_fall_back_when_isolation_device_is_offline() {
        let zone = zone(ZoneState::Alarm);
        let event = failed(
            &zone,
            CommandKind::IsolateZone,
            0,
            CommandFailure::device_offline("damper offline"),
        );
        assert!(matches(RuleTrigger::ContainmentFallback, &zone, &event));
        assert!(!matches(RuleTrigger::ContainmentRetry, &zone, &event));
    }

    #[test]
    fn should_not_fall_back_when_zone_already_stopped() {
        let zone = zone(ZoneState::EmergencyStop);
        let event = failed(
            &zone,
            CommandKind::IsolateZone,
            0,
            CommandFailure::timeout("no ack"),
        );
        assert!(!matches(RuleTrigger::ContainmentFallback, &zone, &event));
        assert!(!matches(RuleTrigger::ContainmentRetry, &zone, &event));
    }

    #[test]
    fn should_retry_broadcast_until_limit() {
        let zone = zone(ZoneState::Alarm);
        let alarm = CommandKind::SoundAlarm {
            alarm: AlarmType::Fire,
        };
        let first = failed(&zone, alarm.clone(), 0, CommandFailure::timeout("no ack"));
        let second = failed(&zone, alarm, 1, CommandFailure::timeout("no ack"));
        assert!(matches(RuleTrigger::BroadcastRetry, &zone, &first));
        assert!(!matches(RuleTrigger::BroadcastRetry, &zone, &second));
    }

    #[test]
    fn should_treat_camera_alarm_as_restricted_motion() {
        let zone = zone(ZoneState::Normal);
        let alarm = event(&zone, EventKind::CameraAlarm);
        let motion = event(&zone, EventKind::MotionDetected);
        assert!(matches(RuleTrigger::RestrictedMotion, &zone, &alarm));
        assert!(!matches(RuleTrigger::RestrictedMotion, &zone, &motion));
        assert!(matches(RuleTrigger::Motion, &zone, &motion));
    }

    #[test]
    fn should_render_suppression_only_for_equipped_zone() {
        let policy = InterlockPolicy::default();
        let bare = zone(ZoneState::Alert);
        let event = event(&bare, EventKind::SmokeDetected);
        let ctx = RuleContext {
            event: &event,
            zone: &bare,
            device: None,
            policy: &policy,
        };
        assert_eq!(CommandTemplate::ActivateSuppression.render(&ctx, None), None);

        let equipped = ZoneView {
            suppression: Some(crate::zone::SuppressionMedium::Co2),
            ..bare.clone()
        };
        let ctx = RuleContext {
            zone: &equipped,
            ..ctx
        };
        assert_eq!(
            CommandTemplate::ActivateSuppression.render(&ctx, None),
            Some(CommandKind::ActivateSuppression {
                medium: crate::zone::SuppressionMedium::Co2
            })
        );
    }

    #[test]
    fn should_declare_stop_rules_with_highest_class() {
        let rules = default_rules();
        let top = rules.iter().map(|rule| rule.class).max().unwrap();
        assert_eq!(top, RuleClass::Stop);
        let stop = rules.iter().find(|r| r.name == "stop-pressed").unwrap();
        assert_eq!(
            stop.transition,
            TransitionEffect::EscalateTo(ZoneState::EmergencyStop)
        );
    }
}
