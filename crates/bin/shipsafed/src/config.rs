//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `shipsafe.toml` in the working directory, or the file named by
//! `SHIPSAFE_CONFIG`. Every field has a default, including the zone topology,
//! so the file is optional. Environment variables take precedence over file
//! values.

use std::time::Duration;

use serde::Deserialize;

use shipsafe_app::hub::HubConfig;
use shipsafe_domain::compliance::{ComplianceBounds, ComplianceRule, default_rules};
use shipsafe_domain::device::{Device, DeviceKind};
use shipsafe_domain::error::ShipSafeError;
use shipsafe_domain::interlock::InterlockPolicy;
use shipsafe_domain::registry::ZoneRegistry;
use shipsafe_domain::zone::{SuppressionMedium, Zone};

/// Top-level configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub interlock: InterlockConfig,
    pub hub: HubSettings,
    pub adapters: AdaptersConfig,
    pub compliance: ComplianceConfig,
    /// Vessel topology. Replaces the built-in one when present.
    pub zones: Vec<ZoneConfig>,
}

/// Audit log storage.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL. Empty keeps the audit log in the tracing
    /// output only.
    pub url: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct InterlockConfig {
    pub corroboration_window_secs: u64,
    pub containment_retries: u32,
    pub broadcast_retries: u32,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HubSettings {
    pub ack_timeout_ms: u64,
    pub snapshot_capacity: usize,
    pub closed_incident_history: usize,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AdaptersConfig {
    /// Silence after which a device is reported offline.
    pub watchdog_secs: u64,
    /// How long an adapter waits for the plant to confirm a command.
    pub command_timeout_ms: u64,
    pub feed_capacity: usize,
    pub mailbox_capacity: usize,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ComplianceConfig {
    pub check_interval_secs: u64,
    pub emergency_stop_response_secs: u64,
    pub fire_response_secs: u64,
    pub man_overboard_response_secs: u64,
    pub intrusion_response_secs: u64,
    pub acknowledgment_secs: u64,
    pub min_healthy_detectors: usize,
    pub min_healthy_radios: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ZoneConfig {
    pub name: String,
    #[serde(default)]
    pub restricted: bool,
    #[serde(default)]
    pub suppression: Option<SuppressionMedium>,
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    pub tag: String,
    pub kind: DeviceKind,
    #[serde(default)]
    pub threshold: Option<f64>,
}

impl Config {
    /// Load configuration from the config file (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting values are inconsistent.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("SHIPSAFE_CONFIG").unwrap_or_else(|_| "shipsafe.toml".to_string());
        let mut config = Self::from_file(&path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("SHIPSAFE_DATABASE_URL") {
            self.database.url = val;
        }
        if let Ok(val) = std::env::var("SHIPSAFE_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("SHIPSAFE_CORROBORATION_WINDOW_SECS")
            && let Ok(secs) = val.parse()
        {
            self.interlock.corroboration_window_secs = secs;
        }
        if let Ok(val) = std::env::var("SHIPSAFE_WATCHDOG_SECS")
            && let Ok(secs) = val.parse()
        {
            self.adapters.watchdog_secs = secs;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("interlock.corroboration_window_secs", self.interlock.corroboration_window_secs),
            ("hub.ack_timeout_ms", self.hub.ack_timeout_ms),
            ("adapters.watchdog_secs", self.adapters.watchdog_secs),
            ("adapters.command_timeout_ms", self.adapters.command_timeout_ms),
            ("compliance.check_interval_secs", self.compliance.check_interval_secs),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Validation(format!("{name} must be non-zero")));
        }
        if self.adapters.command_timeout_ms >= self.hub.ack_timeout_ms {
            return Err(ConfigError::Validation(
                "adapters.command_timeout_ms must be below hub.ack_timeout_ms".to_string(),
            ));
        }
        if self.zones.is_empty() {
            return Err(ConfigError::Validation(
                "at least one zone must be configured".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the vessel topology from the `zones` section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Topology`] when a zone, a device or the
    /// topology as a whole fails validation.
    pub fn registry(&self) -> Result<ZoneRegistry, ConfigError> {
        let mut builder = ZoneRegistry::builder();
        for section in &self.zones {
            let mut zone = Zone::builder()
                .name(section.name.as_str())
                .restricted(section.restricted);
            if let Some(medium) = section.suppression {
                zone = zone.suppression(medium);
            }
            let zone = zone.build()?;
            for entry in &section.devices {
                let mut device = Device::builder()
                    .tag(entry.tag.as_str())
                    .zone_id(zone.id)
                    .kind(entry.kind);
                if let Some(threshold) = entry.threshold {
                    device = device.threshold(threshold);
                }
                builder = builder.device(device.build()?);
            }
            builder = builder.zone(zone);
        }
        Ok(builder.build()?)
    }

    #[must_use]
    pub fn policy(&self) -> InterlockPolicy {
        InterlockPolicy {
            corroboration_window: Duration::from_secs(self.interlock.corroboration_window_secs),
            containment_retries: self.interlock.containment_retries,
            broadcast_retries: self.interlock.broadcast_retries,
        }
    }

    #[must_use]
    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            ack_timeout: Duration::from_millis(self.hub.ack_timeout_ms),
            snapshot_capacity: self.hub.snapshot_capacity,
            closed_incident_history: self.hub.closed_incident_history,
        }
    }

    #[must_use]
    pub fn compliance_rules(&self) -> Vec<ComplianceRule> {
        let c = &self.compliance;
        default_rules(&ComplianceBounds {
            emergency_stop_response: Duration::from_secs(c.emergency_stop_response_secs),
            fire_response: Duration::from_secs(c.fire_response_secs),
            man_overboard_response: Duration::from_secs(c.man_overboard_response_secs),
            intrusion_response: Duration::from_secs(c.intrusion_response_secs),
            acknowledgment: Duration::from_secs(c.acknowledgment_secs),
            min_healthy_detectors: c.min_healthy_detectors,
            min_healthy_radios: c.min_healthy_radios,
        })
    }

    #[must_use]
    pub fn watchdog(&self) -> Duration {
        Duration::from_secs(self.adapters.watchdog_secs)
    }

    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.adapters.command_timeout_ms)
    }

    #[must_use]
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.compliance.check_interval_secs)
    }

    /// The database URL, `None` when persistence is disabled.
    #[must_use]
    pub fn database_url(&self) -> Option<&str> {
        let url = self.database.url.trim();
        (!url.is_empty()).then_some(url)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            interlock: InterlockConfig::default(),
            hub: HubSettings::default(),
            adapters: AdaptersConfig::default(),
            compliance: ComplianceConfig::default(),
            zones: default_zones(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:shipsafe.db?mode=rwc".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "shipsafed=info,shipsafe=info,shipsafe_app=info".to_string(),
        }
    }
}

impl Default for InterlockConfig {
    fn default() -> Self {
        let policy = InterlockPolicy::default();
        Self {
            corroboration_window_secs: policy.corroboration_window.as_secs(),
            containment_retries: policy.containment_retries,
            broadcast_retries: policy.broadcast_retries,
        }
    }
}

impl Default for HubSettings {
    fn default() -> Self {
        let hub = HubConfig::default();
        Self {
            ack_timeout_ms: u64::try_from(hub.ack_timeout.as_millis()).unwrap_or(u64::MAX),
            snapshot_capacity: hub.snapshot_capacity,
            closed_incident_history: hub.closed_incident_history,
        }
    }
}

impl Default for AdaptersConfig {
    fn default() -> Self {
        Self {
            watchdog_secs: 30,
            command_timeout_ms: 1_500,
            feed_capacity: 64,
            mailbox_capacity: 16,
        }
    }
}

impl Default for ComplianceConfig {
    fn default() -> Self {
        let bounds = ComplianceBounds::default();
        Self {
            check_interval_secs: 5,
            emergency_stop_response_secs: bounds.emergency_stop_response.as_secs(),
            fire_response_secs: bounds.fire_response.as_secs(),
            man_overboard_response_secs: bounds.man_overboard_response.as_secs(),
            intrusion_response_secs: bounds.intrusion_response.as_secs(),
            acknowledgment_secs: bounds.acknowledgment.as_secs(),
            min_healthy_detectors: bounds.min_healthy_detectors,
            min_healthy_radios: bounds.min_healthy_radios,
        }
    }
}

fn device(tag: &str, kind: DeviceKind) -> DeviceConfig {
    DeviceConfig {
        tag: tag.to_string(),
        kind,
        threshold: None,
    }
}

fn detector(tag: &str, kind: DeviceKind, threshold: f64) -> DeviceConfig {
    DeviceConfig {
        threshold: Some(threshold),
        ..device(tag, kind)
    }
}

/// The built-in vessel: machinery, galley, bridge, cargo, accommodation and
/// the open main deck.
fn default_zones() -> Vec<ZoneConfig> {
    use DeviceKind as K;

    vec![
        ZoneConfig {
            name: "engine_room".to_string(),
            restricted: false,
            suppression: Some(SuppressionMedium::Co2),
            devices: vec![
                detector("SMK-ER-001", K::SmokeSensor, 0.15),
                detector("HT-ER-001", K::HeatSensor, 68.0),
                device("FLM-ER-001", K::FlameSensor),
                detector("GAS-ER-001", K::GasSensor, 25.0),
                device("ESB-ER-001", K::StopButton),
                device("DMP-ER-001", K::Damper),
                device("SUP-ER-001", K::SuppressionRelease),
                device("CAM-ER-001", K::Camera),
                device("SPK-ER-001", K::Speaker),
            ],
        },
        ZoneConfig {
            name: "galley".to_string(),
            restricted: false,
            suppression: Some(SuppressionMedium::WetChemical),
            devices: vec![
                detector("SMK-GL-001", K::SmokeSensor, 0.15),
                detector("HT-GL-001", K::HeatSensor, 57.0),
                device("ESB-GL-001", K::StopButton),
                device("DMP-GL-001", K::Damper),
                device("SUP-GL-001", K::SuppressionRelease),
                device("CAM-GL-001", K::Camera),
                device("SPK-GL-001", K::Speaker),
            ],
        },
        ZoneConfig {
            name: "bridge".to_string(),
            restricted: true,
            suppression: None,
            devices: vec![
                detector("SMK-BR-001", K::SmokeSensor, 0.15),
                device("ESB-BR-001", K::StopButton),
                device("CAM-BR-001", K::Camera),
                device("SPK-BR-001", K::Speaker),
                device("VHF-BR-001", K::Radio),
                device("VHF-BR-002", K::Radio),
            ],
        },
        ZoneConfig {
            name: "cargo_hold".to_string(),
            restricted: false,
            suppression: Some(SuppressionMedium::Co2),
            devices: vec![
                detector("SMK-CH-001", K::SmokeSensor, 0.15),
                detector("HT-CH-001", K::HeatSensor, 68.0),
                device("DMP-CH-001", K::Damper),
                device("SUP-CH-001", K::SuppressionRelease),
                device("CAM-CH-001", K::Camera),
                device("SPK-CH-001", K::Speaker),
            ],
        },
        ZoneConfig {
            name: "crew_quarters".to_string(),
            restricted: false,
            suppression: Some(SuppressionMedium::WaterMist),
            devices: vec![
                detector("SMK-CQ-001", K::SmokeSensor, 0.15),
                detector("HT-CQ-001", K::HeatSensor, 57.0),
                device("SUP-CQ-001", K::SuppressionRelease),
                device("CAM-CQ-001", K::Camera),
                device("SPK-CQ-001", K::Speaker),
            ],
        },
        ZoneConfig {
            name: "main_deck".to_string(),
            restricted: false,
            suppression: None,
            devices: vec![
                device("CAM-MD-001", K::Camera),
                device("SPK-MD-001", K::Speaker),
                device("VHF-MD-001", K::Radio),
            ],
        },
    ]
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
    /// The zone topology does not hold together.
    #[error("invalid zone topology")]
    Topology(#[from] ShipSafeError),
}
