//! Zone registry: the static vessel topology.
//!
//! The registry is built once at start-up and never mutated afterwards.
//! Live device health and zone state are owned by the coordination hub.

use std::collections::HashMap;

use crate::device::Device;
use crate::error::{ShipSafeError, ValidationError};
use crate::id::{DeviceId, ZoneId};
use crate::subsystem::Subsystem;
use crate::zone::Zone;

/// Immutable lookup structure over all zones and devices.
#[derive(Debug, Clone)]
pub struct ZoneRegistry {
    zones: Vec<Zone>,
    devices: Vec<Device>,
    zone_index: HashMap<ZoneId, usize>,
    device_index: HashMap<DeviceId, usize>,
    tag_index: HashMap<String, usize>,
}

impl ZoneRegistry {
    #[must_use]
    pub fn builder() -> ZoneRegistryBuilder {
        ZoneRegistryBuilder::default()
    }

    #[must_use]
    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    #[must_use]
    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    #[must_use]
    pub fn zone(&self, id: ZoneId) -> Option<&Zone> {
        self.zone_index.get(&id).map(|idx| &self.zones[*idx])
    }

    #[must_use]
    pub fn zone_by_name(&self, name: &str) -> Option<&Zone> {
        self.zones.iter().find(|zone| zone.name == name)
    }

    #[must_use]
    pub fn device(&self, id: DeviceId) -> Option<&Device> {
        self.device_index.get(&id).map(|idx| &self.devices[*idx])
    }

    #[must_use]
    pub fn device_by_tag(&self, tag: &str) -> Option<&Device> {
        self.tag_index.get(tag).map(|idx| &self.devices[*idx])
    }

    pub fn devices_in_zone(&self, zone_id: ZoneId) -> impl Iterator<Item = &Device> {
        self.devices
            .iter()
            .filter(move |device| device.zone_id == zone_id)
    }

    /// Devices owned by one subsystem, across all zones.
    pub fn devices_for(&self, subsystem: Subsystem) -> impl Iterator<Item = &Device> {
        self.devices
            .iter()
            .filter(move |device| device.subsystem() == subsystem)
    }

    /// Look a zone up, failing with [`ShipSafeError::NotFound`].
    ///
    /// # Errors
    ///
    /// Returns [`ShipSafeError::NotFound`] when no zone has this id.
    pub fn require_zone(&self, id: ZoneId) -> Result<&Zone, ShipSafeError> {
        self.zone(id).ok_or_else(|| {
            crate::error::NotFoundError {
                entity: "zone",
                id: id.to_string(),
            }
            .into()
        })
    }
}

/// Collects zones and devices, then validates the topology as a whole.
#[derive(Debug, Default)]
pub struct ZoneRegistryBuilder {
    zones: Vec<Zone>,
    devices: Vec<Device>,
}

impl ZoneRegistryBuilder {
    #[must_use]
    pub fn zone(mut self, zone: Zone) -> Self {
        self.zones.push(zone);
        self
    }

    #[must_use]
    pub fn device(mut self, device: Device) -> Self {
        self.devices.push(device);
        self
    }

    /// Validate the topology and build the registry.
    ///
    /// # Errors
    ///
    /// Returns [`ShipSafeError::Validation`] when:
    /// - there is no zone ([`ValidationError::NoZones`])
    /// - two zones share a name ([`ValidationError::DuplicateZone`])
    /// - two devices share a tag ([`ValidationError::DuplicateTag`])
    /// - a device points at a zone that is not registered ([`ValidationError::UnknownZone`])
    /// - any zone or device fails its own validation
    pub fn build(self) -> Result<ZoneRegistry, ShipSafeError> {
        let Self {
            mut zones,
            devices,
        } = self;
        if zones.is_empty() {
            return Err(ValidationError::NoZones.into());
        }

        let mut zone_index = HashMap::with_capacity(zones.len());
        let mut names = HashMap::with_capacity(zones.len());
        for (idx, zone) in zones.iter_mut().enumerate() {
            zone.validate()?;
            if names.insert(zone.name.clone(), idx).is_some() {
                return Err(ValidationError::DuplicateZone(zone.name.clone()).into());
            }
            zone.devices.clear();
            zone_index.insert(zone.id, idx);
        }

        let mut device_index = HashMap::with_capacity(devices.len());
        let mut tag_index = HashMap::with_capacity(devices.len());
        for (idx, device) in devices.iter().enumerate() {
            device.validate()?;
            let Some(zone_idx) = zone_index.get(&device.zone_id) else {
                return Err(ValidationError::UnknownZone {
                    tag: device.tag.clone(),
                    zone: device.zone_id.to_string(),
                }
                .into());
            };
            if tag_index.insert(device.tag.clone(), idx).is_some() {
                return Err(ValidationError::DuplicateTag(device.tag.clone()).into());
            }
            device_index.insert(device.id, idx);
            zones[*zone_idx].devices.push(device.id);
        }

        Ok(ZoneRegistry {
            zones,
            devices,
            zone_index,
            device_index,
            tag_index,
        })
    }
}
