//! Subsystem adapter port: the generic contract every safety subsystem implements.
//!
//! An adapter bridges one subsystem (emergency stop, fire detection, …) into
//! the core. It only ever:
//! 1. turns raw signals into normalized [`Event`]s ([`ingest`](SubsystemAdapter::ingest)),
//! 2. executes [`Command`]s against its own devices ([`execute`](SubsystemAdapter::execute)).
//!
//! Adapters never write shared state. Cross-subsystem coupling lives in the
//! interlock engine only.

use std::future::Future;
use std::sync::Arc;

use shipsafe_domain::command::{Ack, Command, CommandFailure};
use shipsafe_domain::error::MalformedInput;
use shipsafe_domain::event::Event;
use shipsafe_domain::signal::RawSignal;
use shipsafe_domain::subsystem::Subsystem;

use crate::device_set::DeviceSet;

pub trait SubsystemAdapter: Send + Sync {
    fn subsystem(&self) -> Subsystem;

    /// The devices this adapter owns, with adapter-local health tracking.
    fn devices(&self) -> &DeviceSet;

    /// Validate and normalize a raw signal.
    ///
    /// `Ok(None)` is a valid signal that yields no event (heartbeat, reading
    /// under threshold).
    ///
    /// # Errors
    ///
    /// Returns [`MalformedInput`] when the signal cannot be interpreted. The
    /// caller logs and drops it.
    fn ingest(&self, signal: &RawSignal) -> Result<Option<Event>, MalformedInput>;

    /// Perform the command on this adapter's devices in the command's zone.
    ///
    /// A [`CommandFailure`] is never a silent success: the hub re-evaluates it.
    fn execute(
        &self,
        command: &Command,
    ) -> impl Future<Output = Result<Ack, CommandFailure>> + Send;
}

impl<T: SubsystemAdapter> SubsystemAdapter for Arc<T> {
    fn subsystem(&self) -> Subsystem {
        (**self).subsystem()
    }

    fn devices(&self) -> &DeviceSet {
        (**self).devices()
    }

    fn ingest(&self, signal: &RawSignal) -> Result<Option<Event>, MalformedInput> {
        (**self).ingest(signal)
    }

    fn execute(
        &self,
        command: &Command,
    ) -> impl Future<Output = Result<Ack, CommandFailure>> + Send {
        (**self).execute(command)
    }
}
