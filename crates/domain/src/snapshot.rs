//! Snapshot: a consistent, versioned, read-only view of all safety state.
//!
//! The hub publishes one snapshot per processed event. Consumers detect
//! missed updates through gaps in [`Snapshot::version`].

use serde::{Deserialize, Serialize};

use crate::device::{DetectorKind, Device};
use crate::id::{DeviceId, EventId, IncidentId, ZoneId};
use crate::incident::Incident;
use crate::registry::ZoneRegistry;
use crate::time::{Timestamp, now};
use crate::zone::{SuppressionMedium, ZoneState};

/// A detection that is still inside the corroboration window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detection {
    pub event_id: EventId,
    pub device_id: Option<DeviceId>,
    pub kind: DetectorKind,
    pub at: Timestamp,
}

/// Live view of one zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneView {
    pub id: ZoneId,
    pub name: String,
    pub restricted: bool,
    pub suppression: Option<SuppressionMedium>,
    pub state: ZoneState,
    pub devices: Vec<DeviceId>,
    /// Tags of devices currently in FAULT or OFFLINE.
    pub faulted: Vec<String>,
    pub detections: Vec<Detection>,
    /// Fewer than two healthy detector kinds remain in the zone.
    pub corroboration_degraded: bool,
}

impl ZoneView {
    /// Whether a detection of another kind than `kind` is recorded.
    #[must_use]
    pub fn has_other_detection(&self, kind: DetectorKind) -> bool {
        self.detections.iter().any(|detection| detection.kind != kind)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Strictly increasing; 0 is the initial state.
    pub version: u64,
    pub published_at: Timestamp,
    /// The event whose processing produced this version.
    pub last_event: Option<EventId>,
    pub zones: Vec<ZoneView>,
    pub devices: Vec<Device>,
    /// Incidents that are not CLOSED, one at most per zone.
    pub incidents: Vec<Incident>,
    /// Recently closed incidents, newest last, bounded by the hub.
    pub closed_incidents: Vec<Incident>,
}

impl Snapshot {
    /// Version 0: every zone NORMAL, every device as registered.
    #[must_use]
    pub fn initial(registry: &ZoneRegistry) -> Self {
        let devices = registry.devices().to_vec();
        let zones = registry
            .zones()
            .iter()
            .map(|zone| {
                let mut view = ZoneView {
                    id: zone.id,
                    name: zone.name.clone(),
                    restricted: zone.restricted,
                    suppression: zone.suppression,
                    state: ZoneState::Normal,
                    devices: zone.devices.clone(),
                    faulted: Vec::new(),
                    detections: Vec::new(),
                    corroboration_degraded: false,
                };
                view.corroboration_degraded = healthy_detector_kinds(&devices, zone.id) < 2;
                view
            })
            .collect();
        Self {
            version: 0,
            published_at: now(),
            last_event: None,
            zones,
            devices,
            incidents: Vec::new(),
            closed_incidents: Vec::new(),
        }
    }

    #[must_use]
    pub fn zone(&self, id: ZoneId) -> Option<&ZoneView> {
        self.zones.iter().find(|zone| zone.id == id)
    }

    #[must_use]
    pub fn zone_by_name(&self, name: &str) -> Option<&ZoneView> {
        self.zones.iter().find(|zone| zone.name == name)
    }

    #[must_use]
    pub fn zone_state(&self, id: ZoneId) -> Option<ZoneState> {
        self.zone(id).map(|zone| zone.state)
    }

    #[must_use]
    pub fn device(&self, id: DeviceId) -> Option<&Device> {
        self.devices.iter().find(|device| device.id == id)
    }

    pub fn devices_in_zone(&self, zone_id: ZoneId) -> impl Iterator<Item = &Device> {
        self.devices
            .iter()
            .filter(move |device| device.zone_id == zone_id)
    }

    /// The active incident of a zone.
    #[must_use]
    pub fn active_incident(&self, zone_id: ZoneId) -> Option<&Incident> {
        self.incidents
            .iter()
            .find(|incident| incident.zone_id == zone_id)
    }

    /// Any incident still known to this snapshot, active or recently closed.
    #[must_use]
    pub fn incident(&self, id: IncidentId) -> Option<&Incident> {
        self.incidents
            .iter()
            .chain(self.closed_incidents.iter())
            .find(|incident| incident.id == id)
    }

    /// The most severe zone state on board.
    #[must_use]
    pub fn overall_state(&self) -> ZoneState {
        self.zones
            .iter()
            .map(|zone| zone.state)
            .max()
            .unwrap_or_default()
    }
}

/// Number of distinct detector kinds with at least one healthy device in the zone.
#[must_use]
pub fn healthy_detector_kinds(devices: &[Device], zone_id: ZoneId) -> usize {
    let mut kinds: Vec<DetectorKind> = devices
        .iter()
        .filter(|device| device.zone_id == zone_id && device.health.is_healthy())
        .filter_map(|device| device.kind.detector())
        .collect();
    kinds.sort_unstable();
    kinds.dedup();
    kinds.len()
}
