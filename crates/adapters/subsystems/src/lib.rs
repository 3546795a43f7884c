//! # shipsafe-adapter-subsystems
//!
//! The five safety subsystems, driving a [`SimulatedPlant`] instead of real
//! hardware. Used by the daemon's demo mode and by the end-to-end tests.
//!
//! ## Provided adapters
//!
//! | Adapter | Devices | Signals | Commands |
//! |---------|---------|---------|----------|
//! | [`EmergencyStopAdapter`] | stop buttons, dampers | `pressed`, `isolated` | stop power, isolate zone |
//! | [`FireDetectionAdapter`] | detectors, suppression release | `smoke`/`heat`/`flame`/`gas` + value, `alarm` | activate suppression |
//! | [`CctvAdapter`] | cameras | `motion`, `tamper` | focus cameras, start recording |
//! | [`PagaAdapter`] | speakers | none | sound alarm, announce |
//! | [`CommunicationAdapter`] | radios | `mob` | safety message, distress |
//!
//! Every device also understands `heartbeat`, `fault` and `ok`.
//!
//! ## Dependency rule
//!
//! Depends on `shipsafe-app` (port traits) and `shipsafe-domain` only.

mod cctv;
mod common;
mod communication;
mod emergency_stop;
mod fire_detection;
mod paga;
pub mod plant;

#[cfg(test)]
mod testing;

pub use cctv::CctvAdapter;
pub use communication::CommunicationAdapter;
pub use emergency_stop::EmergencyStopAdapter;
pub use fire_detection::FireDetectionAdapter;
pub use paga::PagaAdapter;
pub use plant::{Behavior, SimulatedPlant};
