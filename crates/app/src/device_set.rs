//! Device set: an adapter's own devices with local health and liveness.
//!
//! This is adapter-local bookkeeping used for watchdog and command routing.
//! The authoritative device health in snapshots is owned by the hub and only
//! changes through events.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use tokio::time::Instant;

use shipsafe_domain::device::{Device, DeviceHealth};
use shipsafe_domain::id::{DeviceId, ZoneId};
use shipsafe_domain::registry::ZoneRegistry;
use shipsafe_domain::subsystem::Subsystem;

#[derive(Debug, Clone, Copy)]
struct Liveness {
    health: DeviceHealth,
    last_seen: Instant,
}

#[derive(Debug)]
pub struct DeviceSet {
    subsystem: Subsystem,
    devices: Vec<Device>,
    by_tag: HashMap<String, usize>,
    liveness: RwLock<HashMap<DeviceId, Liveness>>,
}

impl DeviceSet {
    /// Copy the devices of `subsystem` out of the registry.
    ///
    /// Every device starts healthy and freshly seen.
    #[must_use]
    pub fn new(subsystem: Subsystem, registry: &ZoneRegistry) -> Self {
        let devices: Vec<Device> = registry.devices_for(subsystem).cloned().collect();
        let by_tag = devices
            .iter()
            .enumerate()
            .map(|(idx, device)| (device.tag.clone(), idx))
            .collect();
        let now = Instant::now();
        let liveness = devices
            .iter()
            .map(|device| {
                (
                    device.id,
                    Liveness {
                        health: DeviceHealth::Ok,
                        last_seen: now,
                    },
                )
            })
            .collect();
        Self {
            subsystem,
            devices,
            by_tag,
            liveness: RwLock::new(liveness),
        }
    }

    #[must_use]
    pub fn subsystem(&self) -> Subsystem {
        self.subsystem
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter()
    }

    #[must_use]
    pub fn by_tag(&self, tag: &str) -> Option<&Device> {
        self.by_tag.get(tag).map(|idx| &self.devices[*idx])
    }

    pub fn in_zone(&self, zone_id: ZoneId) -> impl Iterator<Item = &Device> {
        self.devices
            .iter()
            .filter(move |device| device.zone_id == zone_id)
    }

    #[must_use]
    pub fn health(&self, id: DeviceId) -> DeviceHealth {
        let liveness = self.liveness.read().unwrap_or_else(PoisonError::into_inner);
        liveness
            .get(&id)
            .map_or(DeviceHealth::Offline, |entry| entry.health)
    }

    /// Healthy devices of the zone, optionally restricted by `filter`.
    pub fn healthy_in_zone<'a>(
        &'a self,
        zone_id: ZoneId,
        filter: impl Fn(&Device) -> bool + 'a,
    ) -> Vec<&'a Device> {
        let liveness = self.liveness.read().unwrap_or_else(PoisonError::into_inner);
        self.in_zone(zone_id)
            .filter(|device| filter(*device))
            .filter(|device| {
                liveness
                    .get(&device.id)
                    .is_some_and(|entry| entry.health.is_healthy())
            })
            .collect()
    }

    /// Set the health reported by the device itself (`fault` / `ok`).
    ///
    /// Returns the previous health.
    pub fn set_health(&self, id: DeviceId, health: DeviceHealth) -> DeviceHealth {
        let mut liveness = self.liveness.write().unwrap_or_else(PoisonError::into_inner);
        match liveness.get_mut(&id) {
            Some(entry) => std::mem::replace(&mut entry.health, health),
            None => DeviceHealth::Offline,
        }
    }

    /// Record that the device spoke at `now`.
    ///
    /// Returns `true` when the device was offline and is now back.
    pub fn touch(&self, id: DeviceId, now: Instant) -> bool {
        let mut liveness = self.liveness.write().unwrap_or_else(PoisonError::into_inner);
        let Some(entry) = liveness.get_mut(&id) else {
            return false;
        };
        entry.last_seen = now;
        if entry.health == DeviceHealth::Offline {
            entry.health = DeviceHealth::Ok;
            return true;
        }
        false
    }

    /// Mark every device unseen for longer than `interval` as offline.
    ///
    /// Returns only the devices that just went offline, so each silence is
    /// reported once.
    pub fn expire(&self, now: Instant, interval: Duration) -> Vec<&Device> {
        let mut liveness = self.liveness.write().unwrap_or_else(PoisonError::into_inner);
        self.devices
            .iter()
            .filter(|device| {
                let Some(entry) = liveness.get_mut(&device.id) else {
                    return false;
                };
                if entry.health != DeviceHealth::Offline
                    && now.saturating_duration_since(entry.last_seen) > interval
                {
                    entry.health = DeviceHealth::Offline;
                    return true;
                }
                false
            })
            .collect()
    }
}
