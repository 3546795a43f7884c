//! Audit records: the ordered, append-only trail of everything the core did.

use serde::{Deserialize, Serialize};

use crate::command::{Ack, Command, CommandFailure};
use crate::compliance::ComplianceViolation;
use crate::event::Event;
use crate::id::{CommandId, ZoneId};
use crate::time::Timestamp;

/// One entry of the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "record", rename_all = "snake_case")]
pub enum AuditEntry {
    Event(Event),
    CommandIssued(Command),
    CommandOutcome {
        command_id: CommandId,
        zone_id: ZoneId,
        outcome: Result<Ack, CommandFailure>,
    },
    Violation(ComplianceViolation),
    Snapshot { version: u64 },
}

impl AuditEntry {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Event(_) => "event",
            Self::CommandIssued(_) => "command_issued",
            Self::CommandOutcome { .. } => "command_outcome",
            Self::Violation(_) => "violation",
            Self::Snapshot { .. } => "snapshot",
        }
    }

    /// The zone the entry is about, when there is one.
    #[must_use]
    pub fn zone_id(&self) -> Option<ZoneId> {
        match self {
            Self::Event(event) => Some(event.zone_id),
            Self::CommandIssued(command) => Some(command.zone_id),
            Self::CommandOutcome { zone_id, .. } => Some(*zone_id),
            Self::Violation(violation) => violation.zone_id,
            Self::Snapshot { .. } => None,
        }
    }
}

/// An [`AuditEntry`] stamped with its position in the trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Gap-free sequence number in recording order.
    pub seq: u64,
    pub recorded_at: Timestamp,
    pub entry: AuditEntry,
}
