//! Command: a directive from the hub to one subsystem adapter.

use serde::{Deserialize, Serialize};

use crate::id::{CommandId, EventId, IncidentId, ZoneId};
use crate::subsystem::Subsystem;
use crate::time::{Timestamp, now};
use crate::zone::{SuppressionMedium, ZoneState};

/// Alarm patterns the PA/GA system can sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmType {
    General,
    Fire,
    ManOverboard,
    AbandonShip,
    EmergencyStations,
    AllClear,
}

impl std::fmt::Display for AlarmType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::General => f.write_str("general"),
            Self::Fire => f.write_str("fire"),
            Self::ManOverboard => f.write_str("man_overboard"),
            Self::AbandonShip => f.write_str("abandon_ship"),
            Self::EmergencyStations => f.write_str("emergency_stations"),
            Self::AllClear => f.write_str("all_clear"),
        }
    }
}

/// Radio message priority, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessagePriority {
    Routine,
    Safety,
    Urgency,
    Distress,
}

impl std::fmt::Display for MessagePriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Routine => f.write_str("routine"),
            Self::Safety => f.write_str("safety"),
            Self::Urgency => f.write_str("urgency"),
            Self::Distress => f.write_str("distress"),
        }
    }
}

/// Emission order within one decision: contain before broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandPhase {
    Containment,
    Surveillance,
    Broadcast,
    Notification,
}

/// What a command asks the subsystem to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandKind {
    StopPower,
    IsolateZone,
    ActivateSuppression { medium: SuppressionMedium },
    FocusCameras,
    StartRecording,
    SoundAlarm { alarm: AlarmType },
    Announce { message: String },
    SendSafetyMessage {
        priority: MessagePriority,
        message: String,
    },
    SendDistress { nature: String },
}

impl CommandKind {
    /// The subsystem that executes this command.
    #[must_use]
    pub fn subsystem(&self) -> Subsystem {
        match self {
            Self::StopPower | Self::IsolateZone => Subsystem::EmergencyStop,
            Self::ActivateSuppression { .. } => Subsystem::FireDetection,
            Self::FocusCameras | Self::StartRecording => Subsystem::Cctv,
            Self::SoundAlarm { .. } | Self::Announce { .. } => Subsystem::Paga,
            Self::SendSafetyMessage { .. } | Self::SendDistress { .. } => {
                Subsystem::Communication
            }
        }
    }

    #[must_use]
    pub fn phase(&self) -> CommandPhase {
        match self {
            Self::StopPower | Self::IsolateZone | Self::ActivateSuppression { .. } => {
                CommandPhase::Containment
            }
            Self::FocusCameras | Self::StartRecording => CommandPhase::Surveillance,
            Self::SoundAlarm { .. } | Self::Announce { .. } => CommandPhase::Broadcast,
            Self::SendSafetyMessage { .. } | Self::SendDistress { .. } => {
                CommandPhase::Notification
            }
        }
    }

    /// Whether this command counts as a response for latency accounting.
    /// Surveillance only observes, everything else acts.
    #[must_use]
    pub fn is_corrective(&self) -> bool {
        self.phase() != CommandPhase::Surveillance
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::StopPower => "stop_power",
            Self::IsolateZone => "isolate_zone",
            Self::ActivateSuppression { .. } => "activate_suppression",
            Self::FocusCameras => "focus_cameras",
            Self::StartRecording => "start_recording",
            Self::SoundAlarm { .. } => "sound_alarm",
            Self::Announce { .. } => "announce",
            Self::SendSafetyMessage { .. } => "send_safety_message",
            Self::SendDistress { .. } => "send_distress",
        }
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ActivateSuppression { medium } => write!(f, "activate_suppression({medium})"),
            Self::SoundAlarm { alarm } => write!(f, "sound_alarm({alarm})"),
            Self::SendSafetyMessage { priority, .. } => {
                write!(f, "send_safety_message({priority})")
            }
            other => f.write_str(other.name()),
        }
    }
}

/// What triggered a command, for audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Causation {
    pub event_id: EventId,
    pub incident_id: Option<IncidentId>,
}

/// A directive issued to a subsystem adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub id: CommandId,
    pub zone_id: ZoneId,
    pub kind: CommandKind,
    pub causation: Causation,
    /// 0 for the first issue, incremented on every retry.
    pub attempt: u32,
    /// Zone state in effect once the issuing decision was applied.
    pub issued_under: ZoneState,
    pub issued_at: Timestamp,
}

impl Command {
    #[must_use]
    pub fn new(
        zone_id: ZoneId,
        kind: CommandKind,
        causation: Causation,
        issued_under: ZoneState,
    ) -> Self {
        Self {
            id: CommandId::new(),
            zone_id,
            kind,
            causation,
            attempt: 0,
            issued_under,
            issued_at: now(),
        }
    }

    #[must_use]
    pub fn subsystem(&self) -> Subsystem {
        self.kind.subsystem()
    }

    #[must_use]
    pub fn phase(&self) -> CommandPhase {
        self.kind.phase()
    }

    /// A fresh copy of this command for another attempt.
    #[must_use]
    pub fn retry(&self, causation: Causation, issued_under: ZoneState) -> Self {
        Self {
            id: CommandId::new(),
            zone_id: self.zone_id,
            kind: self.kind.clone(),
            causation,
            attempt: self.attempt.saturating_add(1),
            issued_under,
            issued_at: now(),
        }
    }

    /// Whether an emergency stop declared after this command was issued
    /// makes it obsolete. Commands issued under the stop itself never are.
    #[must_use]
    pub fn is_superseded_by(&self, zone_state: ZoneState) -> bool {
        zone_state == ZoneState::EmergencyStop && self.issued_under < ZoneState::EmergencyStop
    }
}

/// Positive confirmation that a command took effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub command_id: CommandId,
    pub acknowledged_at: Timestamp,
}

impl Ack {
    #[must_use]
    pub fn now(command_id: CommandId) -> Self {
        Self {
            command_id,
            acknowledged_at: now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    DeviceOffline,
    Timeout,
    Rejected,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DeviceOffline => f.write_str("device_offline"),
            Self::Timeout => f.write_str("timeout"),
            Self::Rejected => f.write_str("rejected"),
        }
    }
}

/// A command did not take effect. This is a value the hub re-evaluates,
/// never a silent success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandFailure {
    pub reason: FailureReason,
    pub detail: String,
}

impl CommandFailure {
    #[must_use]
    pub fn new(reason: FailureReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
        }
    }

    #[must_use]
    pub fn device_offline(detail: impl Into<String>) -> Self {
        Self::new(FailureReason::DeviceOffline, detail)
    }

    #[must_use]
    pub fn timeout(detail: impl Into<String>) -> Self {
        Self::new(FailureReason::Timeout, detail)
    }

    #[must_use]
    pub fn rejected(detail: impl Into<String>) -> Self {
        Self::new(FailureReason::Rejected, detail)
    }
}

impl std::fmt::Display for CommandFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.reason, self.detail)
    }
}
