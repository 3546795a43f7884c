//! Wiring of the running system: hub, one runner per subsystem, the
//! compliance monitor and the audit writer, all tied to one shutdown signal.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};

use shipsafe_adapter_subsystems::{
    CctvAdapter, CommunicationAdapter, EmergencyStopAdapter, FireDetectionAdapter, PagaAdapter,
    SimulatedPlant,
};
use shipsafe_app::audit_trail::{AuditTrail, RetryPolicy, WriterStats, run_audit_writer};
use shipsafe_app::compliance_monitor::ComplianceMonitor;
use shipsafe_app::hub::{CommandDispatcher, CommandEnvelope, CoordinationHub, HubHandle};
use shipsafe_app::interlock_engine::InterlockEngine;
use shipsafe_app::ports::{AuditSink, ChannelFeed, SubsystemAdapter};
use shipsafe_app::runner::{AdapterRunner, RunnerStats};
use shipsafe_domain::compliance::{ComplianceStandard, ComplianceStatus, ComplianceViolation};
use shipsafe_domain::registry::ZoneRegistry;
use shipsafe_domain::signal::RawSignal;
use shipsafe_domain::snapshot::Snapshot;
use shipsafe_domain::subsystem::Subsystem;

use crate::config::Config;

/// Why a raw signal could not be handed to an adapter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("no device tagged `{0}`")]
    UnknownDevice(String),

    #[error("{0} adapter has stopped")]
    AdapterStopped(Subsystem),
}

/// What the system looked like when it stopped.
#[derive(Debug)]
pub struct ShutdownReport {
    pub snapshot: Arc<Snapshot>,
    pub runners: Vec<(Subsystem, RunnerStats)>,
    pub violations: Vec<ComplianceViolation>,
    pub compliance: BTreeMap<ComplianceStandard, ComplianceStatus>,
    pub audit: WriterStats,
}

pub struct System {
    handle: HubHandle,
    plant: Arc<SimulatedPlant>,
    feeds: HashMap<Subsystem, mpsc::Sender<RawSignal>>,
    routes: HashMap<String, Subsystem>,
    shutdown: watch::Sender<bool>,
    hub: JoinHandle<Arc<Snapshot>>,
    runners: Vec<(Subsystem, JoinHandle<RunnerStats>)>,
    monitor: JoinHandle<ComplianceMonitor>,
    writer: JoinHandle<WriterStats>,
}

impl System {
    /// Spawn every task of the system on the current runtime.
    ///
    /// Adapters act on `plant`; audit records go to `sink`.
    pub fn start<S>(
        config: &Config,
        registry: &ZoneRegistry,
        plant: Arc<SimulatedPlant>,
        sink: S,
    ) -> Self
    where
        S: AuditSink + 'static,
    {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let (trail, audit) = AuditTrail::channel();
        let writer = tokio::spawn(run_audit_writer(audit, sink, RetryPolicy::default()));

        let mut dispatcher = CommandDispatcher::new();
        let mut mailboxes: HashMap<_, _> = Subsystem::ALL
            .into_iter()
            .map(|subsystem| {
                let mailbox = dispatcher.register(subsystem, config.adapters.mailbox_capacity);
                (subsystem, mailbox)
            })
            .collect();

        let engine = InterlockEngine::with_default_rules(config.policy());
        let (hub, handle, inbox) = CoordinationHub::new(
            registry,
            engine,
            dispatcher,
            trail.clone(),
            config.hub_config(),
        );
        let hub = hub.spawn(inbox, shutdown_rx.clone());

        let mut wiring = Wiring {
            config,
            handle: &handle,
            shutdown: &shutdown_rx,
            feeds: HashMap::new(),
            runners: Vec::new(),
        };
        let timeout = config.command_timeout();
        for subsystem in Subsystem::ALL {
            let Some(mailbox) = mailboxes.remove(&subsystem) else {
                continue;
            };
            let plant = Arc::clone(&plant);
            match subsystem {
                Subsystem::EmergencyStop => {
                    wiring.spawn(EmergencyStopAdapter::new(registry, plant, timeout), mailbox);
                }
                Subsystem::FireDetection => {
                    wiring.spawn(FireDetectionAdapter::new(registry, plant, timeout), mailbox);
                }
                Subsystem::Cctv => {
                    wiring.spawn(CctvAdapter::new(registry, plant, timeout), mailbox);
                }
                Subsystem::Paga => {
                    wiring.spawn(PagaAdapter::new(registry, plant, timeout), mailbox);
                }
                Subsystem::Communication => {
                    wiring.spawn(CommunicationAdapter::new(registry, plant, timeout), mailbox);
                }
            }
        }
        let Wiring { feeds, runners, .. } = wiring;

        let monitor = ComplianceMonitor::new(config.compliance_rules(), trail);
        let monitor = tokio::spawn(monitor.run(
            handle.subscribe_snapshots(),
            config.check_interval(),
            shutdown_rx,
        ));

        let routes = registry
            .devices()
            .iter()
            .map(|device| (device.tag.clone(), device.subsystem()))
            .collect();

        tracing::info!(
            zones = registry.zones().len(),
            devices = registry.devices().len(),
            "safety coordination started"
        );

        Self {
            handle,
            plant,
            feeds,
            routes,
            shutdown,
            hub,
            runners,
            monitor,
            writer,
        }
    }

    #[must_use]
    pub fn handle(&self) -> &HubHandle {
        &self.handle
    }

    #[must_use]
    pub fn plant(&self) -> &Arc<SimulatedPlant> {
        &self.plant
    }

    /// Hand `signal` to the adapter owning its device.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError`] for an unknown tag or a stopped adapter.
    pub async fn route(&self, signal: RawSignal) -> Result<(), RouteError> {
        let subsystem = *self
            .routes
            .get(&signal.device)
            .ok_or_else(|| RouteError::UnknownDevice(signal.device.clone()))?;
        let feed = self
            .feeds
            .get(&subsystem)
            .ok_or(RouteError::AdapterStopped(subsystem))?;
        feed.send(signal)
            .await
            .map_err(|_| RouteError::AdapterStopped(subsystem))
    }

    /// Signal shutdown and wait for every task, the audit writer last so it
    /// drains everything the others recorded.
    ///
    /// # Errors
    ///
    /// Returns the [`JoinError`] of a task that panicked.
    pub async fn shutdown(self) -> Result<ShutdownReport, JoinError> {
        let Self {
            shutdown,
            hub,
            runners,
            monitor,
            writer,
            feeds,
            ..
        } = self;
        // Receivers may all be gone already.
        let _ = shutdown.send(true);
        drop(feeds);

        let snapshot = hub.await?;
        let mut stats = Vec::with_capacity(runners.len());
        for (subsystem, runner) in runners {
            stats.push((subsystem, runner.await?));
        }
        let monitor = monitor.await?;
        let violations = monitor.violations().to_vec();
        let compliance = monitor.summary();
        drop(monitor);
        let audit = writer.await?;

        tracing::info!(version = snapshot.version, "safety coordination stopped");
        Ok(ShutdownReport {
            snapshot,
            runners: stats,
            violations,
            compliance,
            audit,
        })
    }
}

struct Wiring<'a> {
    config: &'a Config,
    handle: &'a HubHandle,
    shutdown: &'a watch::Receiver<bool>,
    feeds: HashMap<Subsystem, mpsc::Sender<RawSignal>>,
    runners: Vec<(Subsystem, JoinHandle<RunnerStats>)>,
}

impl Wiring<'_> {
    fn spawn<A>(&mut self, adapter: A, mailbox: mpsc::Receiver<CommandEnvelope>)
    where
        A: SubsystemAdapter + 'static,
    {
        let subsystem = adapter.subsystem();
        let (sender, feed) = ChannelFeed::channel(self.config.adapters.feed_capacity.max(1));
        let runner = AdapterRunner::new(
            Arc::new(adapter),
            feed,
            mailbox,
            self.handle.clone(),
            self.config.watchdog(),
        );
        let task = tokio::spawn(runner.run(self.shutdown.clone()));
        self.feeds.insert(subsystem, sender);
        self.runners.push((subsystem, task));
    }
}
