//! # shipsafed: safety coordination daemon
//!
//! Composition root that wires the coordination core to its adapters.
//!
//! ## Responsibilities
//! - Load configuration (config file, env vars) and build the zone topology
//! - Initialize the `SQLite` audit log and run migrations
//! - Start the coordination hub, one runner per subsystem adapter, the
//!   compliance monitor and the audit writer
//! - Route raw signals and operator acknowledgments read from stdin
//! - Handle graceful shutdown (SIGINT)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer; no domain logic belongs here.

pub mod config;
pub mod ingress;
pub mod system;
