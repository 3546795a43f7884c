//! Zone: a safety compartment of the vessel owning a set of devices.

mod state;

pub use state::ZoneState;

use serde::{Deserialize, Serialize};

use crate::error::{ShipSafeError, ValidationError};
use crate::id::{DeviceId, ZoneId};

/// Fixed fire-suppression medium installed in a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressionMedium {
    Co2,
    WaterMist,
    Sprinkler,
    Foam,
    WetChemical,
}

impl std::fmt::Display for SuppressionMedium {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Co2 => f.write_str("co2"),
            Self::WaterMist => f.write_str("water_mist"),
            Self::Sprinkler => f.write_str("sprinkler"),
            Self::Foam => f.write_str("foam"),
            Self::WetChemical => f.write_str("wet_chemical"),
        }
    }
}

/// A zone of the vessel. Static topology, the live state is held by the hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: ZoneId,
    pub name: String,
    /// Motion inside a restricted zone raises an alert.
    pub restricted: bool,
    pub suppression: Option<SuppressionMedium>,
    pub devices: Vec<DeviceId>,
}

impl Zone {
    /// Create a builder for constructing a [`Zone`].
    #[must_use]
    pub fn builder() -> ZoneBuilder {
        ZoneBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ShipSafeError::Validation`] when `name` is empty.
    pub fn validate(&self) -> Result<(), ShipSafeError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        Ok(())
    }
}

/// Step-by-step builder for [`Zone`].
#[derive(Debug, Default)]
pub struct ZoneBuilder {
    id: Option<ZoneId>,
    name: Option<String>,
    restricted: bool,
    suppression: Option<SuppressionMedium>,
}

impl ZoneBuilder {
    #[must_use]
    pub fn id(mut self, id: ZoneId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn restricted(mut self, restricted: bool) -> Self {
        self.restricted = restricted;
        self
    }

    #[must_use]
    pub fn suppression(mut self, medium: SuppressionMedium) -> Self {
        self.suppression = Some(medium);
        self
    }

    /// Consume the builder, validate, and return a [`Zone`].
    ///
    /// Devices are attached by the [`ZoneRegistry`](crate::registry::ZoneRegistry).
    ///
    /// # Errors
    ///
    /// Returns [`ShipSafeError::Validation`] if `name` is missing or empty.
    pub fn build(self) -> Result<Zone, ShipSafeError> {
        let zone = Zone {
            id: self.id.unwrap_or_default(),
            name: self.name.unwrap_or_default(),
            restricted: self.restricted,
            suppression: self.suppression,
            devices: Vec::new(),
        };
        zone.validate()?;
        Ok(zone)
    }
}
