//! Ack channel port: device-level confirmation that a command took effect.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use shipsafe_domain::command::Ack;
use shipsafe_domain::id::CommandId;

/// No acknowledgment arrived within the bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("no acknowledgment within {0:?}")]
pub struct AckTimeout(pub Duration);

pub trait AckChannel: Send + Sync {
    /// Wait for the device acknowledgment of `command_id`, at most `timeout`.
    fn wait_for_ack(
        &self,
        command_id: CommandId,
        timeout: Duration,
    ) -> impl Future<Output = Result<Ack, AckTimeout>> + Send;
}

impl<T: AckChannel> AckChannel for Arc<T> {
    fn wait_for_ack(
        &self,
        command_id: CommandId,
        timeout: Duration,
    ) -> impl Future<Output = Result<Ack, AckTimeout>> + Send {
        (**self).wait_for_ack(command_id, timeout)
    }
}
