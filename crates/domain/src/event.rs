//! Event: an immutable fact reported by a subsystem, the hub, or an operator.
//!
//! Events are append-only. Once created they are never mutated; the hub
//! references them by [`EventId`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::command::{Command, CommandFailure};
use crate::device::{Device, DetectorKind};
use crate::id::{DeviceId, EventId, IncidentId, ZoneId};
use crate::subsystem::Subsystem;
use crate::time::{Timestamp, monotonic, now};

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    SmokeDetected,
    HeatDetected,
    FlameDetected,
    GasDetected,
    StopPressed,
    MotionDetected,
    /// Camera tamper or intrusion alarm.
    CameraAlarm,
    ManOverboard,
    /// Damper feedback: the zone's ventilation is closed off.
    IsolationConfirmed,
    DeviceFault,
    DeviceOffline,
    DeviceRestored,
    /// Synthetic: a dispatched command did not take effect.
    CommandFailed {
        command: Box<Command>,
        failure: CommandFailure,
    },
    /// Operator acknowledgment, serialized through the hub like any event.
    Acknowledged {
        incident_id: IncidentId,
        operator: String,
    },
}

impl EventKind {
    /// The detection event for a detector principle.
    #[must_use]
    pub fn detected(kind: DetectorKind) -> Self {
        match kind {
            DetectorKind::Smoke => Self::SmokeDetected,
            DetectorKind::Heat => Self::HeatDetected,
            DetectorKind::Flame => Self::FlameDetected,
            DetectorKind::Gas => Self::GasDetected,
        }
    }

    /// The detector principle behind a detection event.
    #[must_use]
    pub fn detector(&self) -> Option<DetectorKind> {
        match self {
            Self::SmokeDetected => Some(DetectorKind::Smoke),
            Self::HeatDetected => Some(DetectorKind::Heat),
            Self::FlameDetected => Some(DetectorKind::Flame),
            Self::GasDetected => Some(DetectorKind::Gas),
            _ => None,
        }
    }

    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            Self::StopPressed | Self::ManOverboard => Severity::Emergency,
            Self::SmokeDetected
            | Self::HeatDetected
            | Self::FlameDetected
            | Self::GasDetected
            | Self::CommandFailed { .. } => Severity::Critical,
            Self::CameraAlarm | Self::DeviceFault | Self::DeviceOffline => Severity::Warning,
            Self::MotionDetected
            | Self::IsolationConfirmed
            | Self::DeviceRestored
            | Self::Acknowledged { .. } => Severity::Info,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::SmokeDetected => "smoke_detected",
            Self::HeatDetected => "heat_detected",
            Self::FlameDetected => "flame_detected",
            Self::GasDetected => "gas_detected",
            Self::StopPressed => "stop_pressed",
            Self::MotionDetected => "motion_detected",
            Self::CameraAlarm => "camera_alarm",
            Self::ManOverboard => "man_overboard",
            Self::IsolationConfirmed => "isolation_confirmed",
            Self::DeviceFault => "device_fault",
            Self::DeviceOffline => "device_offline",
            Self::DeviceRestored => "device_restored",
            Self::CommandFailed { .. } => "command_failed",
            Self::Acknowledged { .. } => "acknowledged",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Severity, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
    Emergency,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => f.write_str("info"),
            Self::Warning => f.write_str("warning"),
            Self::Critical => f.write_str("critical"),
            Self::Emergency => f.write_str("emergency"),
        }
    }
}

/// Who produced the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    Subsystem(Subsystem),
    Hub,
    Operator,
}

impl std::fmt::Display for EventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Subsystem(subsystem) => subsystem.fmt(f),
            Self::Hub => f.write_str("hub"),
            Self::Operator => f.write_str("operator"),
        }
    }
}

/// An immutable fact about one zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub source: EventSource,
    pub zone_id: ZoneId,
    pub device_id: Option<DeviceId>,
    pub kind: EventKind,
    pub severity: Severity,
    /// Wall-clock time of the fact, used by time windows.
    pub occurred_at: Timestamp,
    /// Offset from the process clock origin when the event was created.
    pub monotonic: Duration,
    pub payload: serde_json::Value,
}

impl Event {
    #[must_use]
    pub fn new(source: EventSource, zone_id: ZoneId, kind: EventKind) -> Self {
        Self {
            id: EventId::new(),
            source,
            zone_id,
            device_id: None,
            severity: kind.severity(),
            kind,
            occurred_at: now(),
            monotonic: monotonic(),
            payload: serde_json::Value::Null,
        }
    }

    /// An event raised by a device, attributed to its subsystem and zone.
    #[must_use]
    pub fn from_device(device: &Device, kind: EventKind) -> Self {
        Self::new(
            EventSource::Subsystem(device.subsystem()),
            device.zone_id,
            kind,
        )
        .with_device(device.id)
    }

    /// Synthetic failure of a dispatched command.
    #[must_use]
    pub fn command_failed(command: Command, failure: CommandFailure) -> Self {
        Self::new(
            EventSource::Hub,
            command.zone_id,
            EventKind::CommandFailed {
                command: Box::new(command),
                failure,
            },
        )
    }

    #[must_use]
    pub fn acknowledged(
        zone_id: ZoneId,
        incident_id: IncidentId,
        operator: impl Into<String>,
    ) -> Self {
        Self::new(
            EventSource::Operator,
            zone_id,
            EventKind::Acknowledged {
                incident_id,
                operator: operator.into(),
            },
        )
    }

    #[must_use]
    pub fn with_device(mut self, device_id: DeviceId) -> Self {
        self.device_id = Some(device_id);
        self
    }

    #[must_use]
    pub fn with_occurred_at(mut self, at: Timestamp) -> Self {
        self.occurred_at = at;
        self
    }

    #[must_use]
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Events from the emergency stop circuit bypass the normal queue.
    #[must_use]
    pub fn is_priority(&self) -> bool {
        self.source == EventSource::Subsystem(Subsystem::EmergencyStop)
    }
}
