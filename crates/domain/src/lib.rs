//! # shipsafe-domain
//!
//! Pure domain model for the shipsafe vessel safety coordination core.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Zones** (safety compartments) and their state machine
//! - Define **Devices** (detectors, stop circuits, cameras, speakers, radios, …)
//! - Define the **Zone registry** (static vessel topology)
//! - Define **Events** (immutable facts reported by subsystems or the hub)
//! - Define **Commands** (directives sent back to subsystems) and their outcomes
//! - Define **Incidents** (correlated events + decisions for one zone)
//! - Define **Snapshots** (atomic, versioned views of all safety state)
//! - Define **Interlock rules** (trigger → transition → commands) and state deltas
//! - Define **Compliance rules** and violations
//! - Contain all invariant enforcement and domain logic
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod audit;
pub mod command;
pub mod compliance;
pub mod device;
pub mod event;
pub mod incident;
pub mod interlock;
pub mod registry;
pub mod signal;
pub mod snapshot;
pub mod subsystem;
pub mod zone;
