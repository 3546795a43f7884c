//! Fixtures shared by the adapter tests.

use std::sync::Arc;

use shipsafe_domain::device::{Device, DeviceKind};
use shipsafe_domain::id::ZoneId;
use shipsafe_domain::registry::ZoneRegistry;
use shipsafe_domain::zone::{SuppressionMedium, Zone};

use crate::plant::SimulatedPlant;

pub(crate) struct Deck {
    pub registry: ZoneRegistry,
    pub plant: Arc<SimulatedPlant>,
    pub engine_room: ZoneId,
    pub bridge: ZoneId,
}

/// Engine room with detectors and every actuator, bridge with radios.
pub(crate) fn deck() -> Deck {
    let engine_room = Zone::builder()
        .name("engine_room")
        .suppression(SuppressionMedium::Co2)
        .build()
        .unwrap();
    let bridge = Zone::builder()
        .name("bridge")
        .restricted(true)
        .build()
        .unwrap();
    let device = |tag: &str, zone: &Zone, kind: DeviceKind| {
        Device::builder()
            .tag(tag)
            .zone_id(zone.id)
            .kind(kind)
            .build()
            .unwrap()
    };
    let detector = |tag: &str, kind: DeviceKind, threshold: f64| {
        Device::builder()
            .tag(tag)
            .zone_id(engine_room.id)
            .kind(kind)
            .threshold(threshold)
            .build()
            .unwrap()
    };
    let registry = ZoneRegistry::builder()
        .zone(engine_room.clone())
        .zone(bridge.clone())
        .device(detector("SMK-ER-001", DeviceKind::SmokeSensor, 0.15))
        .device(detector("HT-ER-001", DeviceKind::HeatSensor, 68.0))
        .device(device("GAS-ER-001", &engine_room, DeviceKind::GasSensor))
        .device(device("ESB-ER-001", &engine_room, DeviceKind::StopButton))
        .device(device("DMP-ER-001", &engine_room, DeviceKind::Damper))
        .device(device("SUP-ER-001", &engine_room, DeviceKind::SuppressionRelease))
        .device(device("CAM-ER-001", &engine_room, DeviceKind::Camera))
        .device(device("SPK-ER-001", &engine_room, DeviceKind::Speaker))
        .device(device("CAM-BR-001", &bridge, DeviceKind::Camera))
        .device(device("SPK-BR-001", &bridge, DeviceKind::Speaker))
        .device(device("VHF-BR-001", &bridge, DeviceKind::Radio))
        .device(device("VHF-BR-002", &bridge, DeviceKind::Radio))
        .build()
        .unwrap();
    Deck {
        registry,
        plant: Arc::new(SimulatedPlant::new()),
        engine_room: engine_room.id,
        bridge: bridge.id,
    }
}
