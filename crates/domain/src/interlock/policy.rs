//! Interlock policy values. These are configuration inputs, never constants.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ShipSafeError, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterlockPolicy {
    /// Two detections of different kinds within this window corroborate.
    pub corroboration_window: Duration,
    /// Retries of a failed containment command before falling back to a stop.
    pub containment_retries: u32,
    /// Retries of a failed broadcast or notification command.
    pub broadcast_retries: u32,
}

impl Default for InterlockPolicy {
    fn default() -> Self {
        Self {
            corroboration_window: Duration::from_secs(5),
            containment_retries: 0,
            broadcast_retries: 1,
        }
    }
}

impl InterlockPolicy {
    /// # Errors
    ///
    /// Returns [`ValidationError::NotPositive`] for a zero corroboration window.
    pub fn validate(&self) -> Result<(), ShipSafeError> {
        if self.corroboration_window.is_zero() {
            return Err(ValidationError::NotPositive("corroboration_window").into());
        }
        Ok(())
    }
}
