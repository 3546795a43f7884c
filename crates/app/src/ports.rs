//! Port definitions: traits that adapters implement.
//!
//! Ports are the boundaries between the coordination core and the outside
//! world. They are defined here (in `app`) so that both the core and the
//! adapter crates can depend on them without creating circular dependencies.

pub mod ack;
pub mod adapter;
pub mod audit;
pub mod feed;

pub use ack::{AckChannel, AckTimeout};
pub use adapter::SubsystemAdapter;
pub use audit::AuditSink;
pub use feed::{ChannelFeed, SensorFeed};
