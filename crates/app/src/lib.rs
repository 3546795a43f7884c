//! # shipsafe-app
//!
//! Application layer: the coordination core and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `SubsystemAdapter`: normalize raw signals, execute commands
//!   - `SensorFeed`: pull raw signals from a subsystem
//!   - `AckChannel`: wait for a device acknowledgment
//!   - `AuditSink`: append audit records
//! - Provide the **interlock engine** (pure rule evaluation)
//! - Provide the **coordination hub**: the single serialized owner of safety state
//! - Provide **in-process infrastructure** that doesn't need IO: snapshot bus,
//!   audit trail, adapter runner with watchdog, compliance monitor
//!
//! ## Dependency rule
//! Depends on `shipsafe-domain` only (plus `tokio` for tasks, channels and time).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod audit_trail;
pub mod compliance_monitor;
pub mod device_set;
pub mod hub;
pub mod interlock_engine;
pub mod ports;
pub mod runner;
pub mod snapshot_bus;

#[cfg(test)]
mod testing;
