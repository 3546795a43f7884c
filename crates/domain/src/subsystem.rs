//! Subsystem: the independent safety domains feeding the coordination core.

use serde::{Deserialize, Serialize};

/// One of the vessel's independent safety subsystems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subsystem {
    EmergencyStop,
    FireDetection,
    Cctv,
    Paga,
    Communication,
}

impl Subsystem {
    /// Every subsystem, in a stable order.
    pub const ALL: [Self; 5] = [
        Self::EmergencyStop,
        Self::FireDetection,
        Self::Cctv,
        Self::Paga,
        Self::Communication,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EmergencyStop => "emergency_stop",
            Self::FireDetection => "fire_detection",
            Self::Cctv => "cctv",
            Self::Paga => "paga",
            Self::Communication => "communication",
        }
    }
}

impl std::fmt::Display for Subsystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
