//! # shipsafe-adapter-storage-sqlite-sqlx
//!
//! `SQLite` audit log using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the `AuditSink` port defined in `shipsafe-app::ports`
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (sqlx embedded migrations)
//! - Read the trail back for inspection
//!
//! ## Dependency rule
//! Depends on `shipsafe-app` (for port traits) and `shipsafe-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

pub mod audit_log;
pub mod error;
pub mod pool;

pub use audit_log::SqliteAuditSink;
pub use pool::{Config, Database};
