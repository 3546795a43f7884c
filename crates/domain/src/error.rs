//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`ShipSafeError`] via `#[from]`. There are no stringly-typed variants at
//! the base; free-form context lives in the typed sub-errors.

use crate::device::DeviceKind;
use crate::incident::IncidentPhase;
use crate::subsystem::Subsystem;
use crate::zone::ZoneState;

/// Base error for the whole workspace.
#[derive(Debug, thiserror::Error)]
pub enum ShipSafeError {
    #[error("validation error")]
    Validation(#[from] ValidationError),

    #[error("not found")]
    NotFound(#[from] NotFoundError),

    #[error("invalid transition")]
    Transition(#[from] TransitionError),

    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("{0} is unavailable")]
    Unavailable(&'static str),
}

/// A domain invariant was violated while constructing or validating a value.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("duplicate zone name `{0}`")]
    DuplicateZone(String),

    #[error("duplicate device tag `{0}`")]
    DuplicateTag(String),

    #[error("device `{tag}` references unknown zone `{zone}`")]
    UnknownZone { tag: String, zone: String },

    #[error("threshold for `{tag}` must be finite and positive, got {value}")]
    InvalidThreshold { tag: String, value: f64 },

    #[error("device kind {kind} does not take a threshold")]
    UnexpectedThreshold { kind: DeviceKind },

    #[error("`{0}` must be greater than zero")]
    NotPositive(&'static str),

    #[error("registry must contain at least one zone")]
    NoZones,
}

/// A referenced entity does not exist.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} `{id}` not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// A state machine refused to move.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("zone cannot move from {from} down to {to} without acknowledgment")]
    Downgrade { from: ZoneState, to: ZoneState },

    #[error("zone in state {0} has nothing to acknowledge")]
    NotAcknowledgeable(ZoneState),

    #[error("incident cannot move from {from} to {to}")]
    Incident {
        from: IncidentPhase,
        to: IncidentPhase,
    },
}

/// A raw subsystem signal could not be normalized into an event.
///
/// Malformed input is adapter-local: it is logged and dropped, never fatal.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MalformedInput {
    #[error("unknown device tag `{0}`")]
    UnknownDevice(String),

    #[error("device `{tag}` belongs to {actual}, not {expected}")]
    WrongSubsystem {
        tag: String,
        expected: Subsystem,
        actual: Subsystem,
    },

    #[error("signal `{signal}` is not understood for device `{tag}` ({kind})")]
    UnknownSignal {
        tag: String,
        kind: DeviceKind,
        signal: String,
    },

    #[error("signal `{signal}` from `{tag}` requires a value")]
    MissingValue { tag: String, signal: String },

    #[error("signal `{signal}` from `{tag}` carries a non-finite value")]
    NonFiniteValue { tag: String, signal: String },

    #[error("device `{0}` has no alarm threshold configured")]
    MissingThreshold(String),
}

/// Why an operator acknowledgment was refused by the hub.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AckRejection {
    #[error("unknown zone")]
    UnknownZone,

    #[error("unknown incident")]
    UnknownIncident,

    #[error("incident belongs to another zone")]
    ZoneMismatch,

    #[error("incident is already closed")]
    IncidentClosed,

    #[error("zone state {zone_state} with incident {phase} is not eligible for acknowledgment")]
    NotEligible {
        zone_state: ZoneState,
        phase: IncidentPhase,
    },

    #[error("coordination hub is unavailable")]
    HubUnavailable,
}
