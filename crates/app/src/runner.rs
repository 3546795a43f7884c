//! Adapter runner: drives one subsystem adapter.
//!
//! The runner owns the adapter's sensor feed and command mailbox. It
//! normalizes signals into events for the hub, executes commands, and runs
//! the liveness watchdog. It never waits on the hub: submission is a
//! non-blocking send.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};

use shipsafe_domain::error::ShipSafeError;
use shipsafe_domain::event::{Event, EventKind};
use shipsafe_domain::signal::RawSignal;

use crate::hub::{CommandEnvelope, HubHandle};
use crate::ports::{SensorFeed, SubsystemAdapter};

/// Counters of a finished runner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunnerStats {
    pub events: u64,
    pub malformed: u64,
    pub commands: u64,
}

pub struct AdapterRunner<A, F> {
    adapter: Arc<A>,
    feed: F,
    mailbox: mpsc::Receiver<CommandEnvelope>,
    hub: HubHandle,
    watchdog: Duration,
    stats: RunnerStats,
}

impl<A, F> AdapterRunner<A, F>
where
    A: SubsystemAdapter + 'static,
    F: SensorFeed,
{
    /// `watchdog` is the silence after which a device is reported offline.
    #[must_use]
    pub fn new(
        adapter: Arc<A>,
        feed: F,
        mailbox: mpsc::Receiver<CommandEnvelope>,
        hub: HubHandle,
        watchdog: Duration,
    ) -> Self {
        Self {
            adapter,
            feed,
            mailbox,
            hub,
            watchdog,
            stats: RunnerStats::default(),
        }
    }

    /// Run until shutdown is signalled or the hub stops.
    ///
    /// The feed's `next_raw_signal` must be cancel safe. Commands already
    /// handed to the adapter keep running after the runner stops.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> RunnerStats {
        let subsystem = self.adapter.subsystem();
        let mut ticker = tokio::time::interval((self.watchdog / 2).max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut feed_open = true;
        tracing::info!(
            %subsystem,
            devices = self.adapter.devices().len(),
            watchdog_ms = self.watchdog.as_millis(),
            "adapter started"
        );

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }
            let submitted = tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    Ok(())
                }
                Some(envelope) = self.mailbox.recv() => {
                    self.execute(envelope);
                    Ok(())
                }
                signal = self.feed.next_raw_signal(), if feed_open => match signal {
                    Some(signal) => self.handle_signal(&signal),
                    None => {
                        tracing::warn!(%subsystem, "sensor feed ended, watchdog will mark devices offline");
                        feed_open = false;
                        Ok(())
                    }
                },
                _ = ticker.tick() => self.check_liveness(),
            };
            if let Err(err) = submitted {
                tracing::warn!(%subsystem, error = %err, "hub is gone, stopping adapter");
                break;
            }
        }

        tracing::info!(
            %subsystem,
            events = self.stats.events,
            malformed = self.stats.malformed,
            commands = self.stats.commands,
            "adapter stopped"
        );
        self.stats
    }

    fn execute(&mut self, envelope: CommandEnvelope) {
        self.stats.commands += 1;
        let adapter = Arc::clone(&self.adapter);
        tokio::spawn(async move {
            let CommandEnvelope { command, reply } = envelope;
            let outcome = adapter.execute(&command).await;
            if reply.send(outcome).is_err() {
                tracing::debug!(command = %command.kind, "hub stopped waiting for the outcome");
            }
        });
    }

    fn handle_signal(&mut self, signal: &RawSignal) -> Result<(), ShipSafeError> {
        let devices = self.adapter.devices();
        if let Some(device) = devices.by_tag(&signal.device)
            && devices.touch(device.id, Instant::now())
        {
            tracing::info!(device = %device.tag, "device back online");
            self.hub
                .submit(Event::from_device(device, EventKind::DeviceRestored))?;
            self.stats.events += 1;
        }

        match self.adapter.ingest(signal) {
            Ok(Some(event)) => {
                self.hub.submit(event)?;
                self.stats.events += 1;
            }
            Ok(None) => {}
            Err(err) => {
                self.stats.malformed += 1;
                tracing::warn!(
                    subsystem = %self.adapter.subsystem(),
                    device = %signal.device,
                    signal = %signal.signal,
                    error = %err,
                    "malformed signal dropped"
                );
            }
        }
        Ok(())
    }

    fn check_liveness(&mut self) -> Result<(), ShipSafeError> {
        for device in self.adapter.devices().expire(Instant::now(), self.watchdog) {
            tracing::warn!(device = %device.tag, zone = %device.zone_id, "device silent, marking offline");
            self.hub
                .submit(Event::from_device(device, EventKind::DeviceOffline))?;
            self.stats.events += 1;
        }
        Ok(())
    }
}
