//! Device: a physical safety device owned by exactly one zone.

use serde::{Deserialize, Serialize};

use crate::error::{ShipSafeError, ValidationError};
use crate::id::{DeviceId, ZoneId};
use crate::subsystem::Subsystem;
use crate::time::Timestamp;

/// What a device is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    StopButton,
    /// Ventilation/door damper, the actuator behind zone isolation.
    Damper,
    SmokeSensor,
    HeatSensor,
    FlameSensor,
    GasSensor,
    SuppressionRelease,
    Camera,
    Speaker,
    Radio,
}

/// The detection principle of a fire/gas detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    Smoke,
    Heat,
    Flame,
    Gas,
}

impl DetectorKind {
    pub const ALL: [Self; 4] = [Self::Smoke, Self::Heat, Self::Flame, Self::Gas];
}

impl std::fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Smoke => f.write_str("smoke"),
            Self::Heat => f.write_str("heat"),
            Self::Flame => f.write_str("flame"),
            Self::Gas => f.write_str("gas"),
        }
    }
}

impl DeviceKind {
    /// The subsystem that owns devices of this kind.
    #[must_use]
    pub fn subsystem(self) -> Subsystem {
        match self {
            Self::StopButton | Self::Damper => Subsystem::EmergencyStop,
            Self::SmokeSensor
            | Self::HeatSensor
            | Self::FlameSensor
            | Self::GasSensor
            | Self::SuppressionRelease => Subsystem::FireDetection,
            Self::Camera => Subsystem::Cctv,
            Self::Speaker => Subsystem::Paga,
            Self::Radio => Subsystem::Communication,
        }
    }

    /// The detection principle, for detectors only.
    #[must_use]
    pub fn detector(self) -> Option<DetectorKind> {
        match self {
            Self::SmokeSensor => Some(DetectorKind::Smoke),
            Self::HeatSensor => Some(DetectorKind::Heat),
            Self::FlameSensor => Some(DetectorKind::Flame),
            Self::GasSensor => Some(DetectorKind::Gas),
            _ => None,
        }
    }

    /// Devices whose loss degrades the zone's protection.
    #[must_use]
    pub fn is_safety_critical(self) -> bool {
        self.detector().is_some() || matches!(self, Self::StopButton | Self::Damper)
    }
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StopButton => f.write_str("stop_button"),
            Self::Damper => f.write_str("damper"),
            Self::SmokeSensor => f.write_str("smoke_sensor"),
            Self::HeatSensor => f.write_str("heat_sensor"),
            Self::FlameSensor => f.write_str("flame_sensor"),
            Self::GasSensor => f.write_str("gas_sensor"),
            Self::SuppressionRelease => f.write_str("suppression_release"),
            Self::Camera => f.write_str("camera"),
            Self::Speaker => f.write_str("speaker"),
            Self::Radio => f.write_str("radio"),
        }
    }
}

/// Last known health of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceHealth {
    #[default]
    Ok,
    Fault,
    Offline,
}

impl DeviceHealth {
    #[must_use]
    pub fn is_healthy(self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl std::fmt::Display for DeviceHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => f.write_str("ok"),
            Self::Fault => f.write_str("fault"),
            Self::Offline => f.write_str("offline"),
        }
    }
}

/// A sampled value reported by a device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub value: f64,
    pub at: Timestamp,
}

/// A safety device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    /// Human tag used by raw signals and configuration, e.g. `FD-ER-001`.
    pub tag: String,
    /// Owning zone (lookup only).
    pub zone_id: ZoneId,
    pub kind: DeviceKind,
    /// Alarm threshold for detectors; a reading at or above it is a detection.
    pub threshold: Option<f64>,
    pub health: DeviceHealth,
    pub last_reading: Option<Reading>,
}

impl Device {
    /// Create a builder for constructing a [`Device`].
    #[must_use]
    pub fn builder() -> DeviceBuilder {
        DeviceBuilder::default()
    }

    #[must_use]
    pub fn subsystem(&self) -> Subsystem {
        self.kind.subsystem()
    }

    /// Whether `value` crosses this device's alarm threshold.
    #[must_use]
    pub fn is_over_threshold(&self, value: f64) -> bool {
        self.threshold.is_some_and(|limit| value >= limit)
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ShipSafeError::Validation`] when:
    /// - `tag` is empty ([`ValidationError::EmptyName`])
    /// - a threshold is not finite and positive ([`ValidationError::InvalidThreshold`])
    /// - a non-detector carries a threshold ([`ValidationError::UnexpectedThreshold`])
    pub fn validate(&self) -> Result<(), ShipSafeError> {
        if self.tag.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if let Some(value) = self.threshold {
            if self.kind.detector().is_none() {
                return Err(ValidationError::UnexpectedThreshold { kind: self.kind }.into());
            }
            if !value.is_finite() || value <= 0.0 {
                return Err(ValidationError::InvalidThreshold {
                    tag: self.tag.clone(),
                    value,
                }
                .into());
            }
        }
        Ok(())
    }
}

/// Step-by-step builder for [`Device`].
#[derive(Debug, Default)]
pub struct DeviceBuilder {
    id: Option<DeviceId>,
    tag: Option<String>,
    zone_id: Option<ZoneId>,
    kind: Option<DeviceKind>,
    threshold: Option<f64>,
}

impl DeviceBuilder {
    #[must_use]
    pub fn id(mut self, id: DeviceId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    #[must_use]
    pub fn zone_id(mut self, zone_id: ZoneId) -> Self {
        self.zone_id = Some(zone_id);
        self
    }

    #[must_use]
    pub fn kind(mut self, kind: DeviceKind) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    /// Consume the builder, validate, and return a [`Device`].
    ///
    /// # Errors
    ///
    /// Returns [`ShipSafeError::Validation`] if `zone_id` or `kind` is
    /// missing, or if the assembled device is invalid.
    pub fn build(self) -> Result<Device, ShipSafeError> {
        let device = Device {
            id: self.id.unwrap_or_default(),
            tag: self.tag.unwrap_or_default(),
            zone_id: self
                .zone_id
                .ok_or(ValidationError::MissingField("zone_id"))?,
            kind: self.kind.ok_or(ValidationError::MissingField("kind"))?,
            threshold: self.threshold,
            health: DeviceHealth::Ok,
            last_reading: None,
        };
        device.validate()?;
        Ok(device)
    }
}
