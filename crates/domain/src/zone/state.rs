//! Zone state: the per-zone safety state machine.

use serde::{Deserialize, Serialize};

use crate::error::TransitionError;

/// Current safety state of a zone.
///
/// Variants are declared in rank order, so the derived `Ord` is the
/// escalation order: `Normal < Recovering < Alert < Alarm < Isolated <
/// EmergencyStop`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ZoneState {
    #[default]
    Normal,
    Recovering,
    Alert,
    Alarm,
    Isolated,
    EmergencyStop,
}

impl ZoneState {
    /// The more severe of the two states.
    #[must_use]
    pub fn escalate(self, other: Self) -> Self {
        self.max(other)
    }

    /// Whether the zone is in a state an operator must acknowledge.
    #[must_use]
    pub fn is_active(self) -> bool {
        self >= Self::Alert
    }

    /// Move to `next` because an interlock rule fired.
    ///
    /// Rules can only raise the state. Staying put is accepted.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::Downgrade`] when `next` ranks below `self`.
    pub fn escalate_to(self, next: Self) -> Result<Self, TransitionError> {
        if next < self {
            return Err(TransitionError::Downgrade {
                from: self,
                to: next,
            });
        }
        Ok(next)
    }

    /// The state reached by an explicit operator acknowledgment.
    ///
    /// Any active state steps down to [`Recovering`](Self::Recovering);
    /// `Recovering` steps down to [`Normal`](Self::Normal).
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::NotAcknowledgeable`] for `Normal`.
    pub fn acknowledge(self) -> Result<Self, TransitionError> {
        match self {
            Self::Normal => Err(TransitionError::NotAcknowledgeable(self)),
            Self::Recovering => Ok(Self::Normal),
            Self::Alert | Self::Alarm | Self::Isolated | Self::EmergencyStop => {
                Ok(Self::Recovering)
            }
        }
    }
}

impl std::fmt::Display for ZoneState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Normal => f.write_str("normal"),
            Self::Recovering => f.write_str("recovering"),
            Self::Alert => f.write_str("alert"),
            Self::Alarm => f.write_str("alarm"),
            Self::Isolated => f.write_str("isolated"),
            Self::EmergencyStop => f.write_str("emergency_stop"),
        }
    }
}
