//! Coordination hub: the single serialized owner of safety state.
//!
//! Every event, from any adapter or operator, goes through one task that
//! evaluates it, applies the resulting delta to a working copy, dispatches
//! the commands, records their outcomes and publishes exactly one new
//! snapshot. Nothing else mutates zone, device or incident state.

mod dispatch;
mod handle;

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use shipsafe_domain::audit::AuditEntry;
use shipsafe_domain::command::{Command, CommandPhase};
use shipsafe_domain::error::{AckRejection, ShipSafeError};
use shipsafe_domain::event::Event;
use shipsafe_domain::id::{EventId, IncidentId, ZoneId};
use shipsafe_domain::incident::{AckStage, IncidentPhase};
use shipsafe_domain::registry::ZoneRegistry;
use shipsafe_domain::snapshot::Snapshot;
use shipsafe_domain::time::{Timestamp, now, to_chrono};

use crate::audit_trail::AuditTrail;
use crate::interlock_engine::{Decision, InterlockEngine};
use crate::snapshot_bus::SnapshotBus;

pub use dispatch::{CommandDispatcher, CommandEnvelope, CommandReply};
pub use handle::{AckReceipt, HubHandle, HubInbox};
use handle::HubMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubConfig {
    /// Deadline for all command replies of one decision.
    pub ack_timeout: Duration,
    /// Snapshots buffered per subscriber before it lags.
    pub snapshot_capacity: usize,
    /// Closed incidents kept in snapshots for observers.
    pub closed_incident_history: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            ack_timeout: Duration::from_secs(2),
            snapshot_capacity: 256,
            closed_incident_history: 32,
        }
    }
}

pub struct CoordinationHub {
    engine: InterlockEngine,
    dispatcher: CommandDispatcher,
    audit: AuditTrail,
    snapshots: Arc<SnapshotBus>,
    state: Arc<Snapshot>,
    follow_ups: VecDeque<Event>,
    config: HubConfig,
}

impl CoordinationHub {
    /// Build the hub for `registry` and publish the initial snapshot
    /// (version 0).
    #[must_use]
    pub fn new(
        registry: &ZoneRegistry,
        engine: InterlockEngine,
        dispatcher: CommandDispatcher,
        audit: AuditTrail,
        config: HubConfig,
    ) -> (Self, HubHandle, HubInbox) {
        let initial = Snapshot::initial(registry);
        let snapshots = Arc::new(SnapshotBus::new(config.snapshot_capacity, initial.clone()));
        let (handle, inbox) = HubHandle::channel(Arc::clone(&snapshots));
        let hub = Self {
            engine,
            dispatcher,
            audit,
            snapshots,
            state: Arc::new(initial),
            follow_ups: VecDeque::new(),
            config,
        };
        (hub, handle, inbox)
    }

    #[must_use]
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.state)
    }

    /// Synthetic failure events waiting to be processed.
    #[must_use]
    pub fn pending_follow_ups(&self) -> usize {
        self.follow_ups.len()
    }

    /// Process one event to completion and return the snapshot it produced.
    ///
    /// A decision that cannot be applied leaves the state untouched; a
    /// snapshot is published regardless so every event has its version.
    pub async fn process(&mut self, event: Event) -> Arc<Snapshot> {
        tracing::debug!(
            event_id = %event.id,
            kind = event.kind.name(),
            zone = %event.zone_id,
            source = ?event.source,
            "processing event"
        );
        self.audit.record(AuditEntry::Event(event.clone()));

        let mut next = (*self.state).clone();
        prune_detections(
            &mut next,
            event.occurred_at,
            to_chrono(self.engine.policy().corroboration_window),
        );
        let decision = match self.decide(&mut next, &event) {
            Ok(decision) => decision,
            Err(err) => {
                tracing::error!(
                    event_id = %event.id,
                    kind = event.kind.name(),
                    zone = %event.zone_id,
                    error = %err,
                    "interlock decision rejected, state unchanged"
                );
                next = (*self.state).clone();
                Decision::default()
            }
        };

        for (zone_id, from, to) in decision.delta.transitions() {
            let zone = next.zone(zone_id).map_or("?", |zone| zone.name.as_str());
            tracing::info!(
                zone,
                %from,
                %to,
                trigger = event.kind.name(),
                rules = ?decision.fired,
                "zone state changed"
            );
        }
        if !decision.suppressed.is_empty() {
            tracing::debug!(
                fired = ?decision.fired,
                suppressed = ?decision.suppressed,
                "lower rule classes suppressed"
            );
        }

        for command in &decision.commands {
            self.audit.record(AuditEntry::CommandIssued(command.clone()));
        }
        let outcomes = self
            .dispatcher
            .dispatch(&decision.commands, self.config.ack_timeout)
            .await;
        self.record_outcomes(&mut next, &decision.commands, outcomes);

        self.publish(next, event.id)
    }

    fn decide(&self, next: &mut Snapshot, event: &Event) -> Result<Decision, ShipSafeError> {
        let decision = self.engine.evaluate(next, event)?;
        decision.delta.apply(next)?;
        Ok(decision)
    }

    /// Attach commands and their outcomes to incidents and queue a
    /// synthetic event for every failure.
    fn record_outcomes(
        &mut self,
        next: &mut Snapshot,
        commands: &[Command],
        outcomes: Vec<CommandReply>,
    ) {
        let at = now();
        let mut containment: Option<(IncidentId, bool)> = None;

        for (command, outcome) in commands.iter().zip(outcomes) {
            self.audit.record(AuditEntry::CommandOutcome {
                command_id: command.id,
                zone_id: command.zone_id,
                outcome: outcome.clone(),
            });

            let mut incident = command.causation.incident_id.and_then(|id| {
                next.incidents
                    .iter_mut()
                    .chain(next.closed_incidents.iter_mut())
                    .find(|incident| incident.id == id)
            });
            if let Some(incident) = incident.as_deref_mut() {
                incident.record_command(command);
            }

            let succeeded = outcome.is_ok();
            match outcome {
                Ok(ack) => tracing::debug!(
                    command = %command.kind,
                    zone = %command.zone_id,
                    latency_ms = (ack.acknowledged_at - command.issued_at).num_milliseconds(),
                    "command acknowledged"
                ),
                Err(failure) => {
                    tracing::warn!(
                        command = %command.kind,
                        zone = %command.zone_id,
                        attempt = command.attempt,
                        reason = %failure,
                        "command failed"
                    );
                    if let Some(incident) = incident {
                        incident.record_failure(command.id);
                    }
                    self.follow_ups
                        .push_back(Event::command_failed(command.clone(), failure));
                }
            }

            if command.phase() == CommandPhase::Containment
                && let Some(incident_id) = command.causation.incident_id
            {
                let all_ok = containment.is_none_or(|(_, ok)| ok) && succeeded;
                containment = Some((incident_id, all_ok));
            }
        }

        // Every containment command acknowledged: the hazard is contained.
        if let Some((incident_id, true)) = containment
            && let Some(incident) = next
                .incidents
                .iter_mut()
                .find(|incident| incident.id == incident_id)
            && incident.phase < IncidentPhase::Contained
            && incident.advance(IncidentPhase::Contained, at).is_ok()
        {
            tracing::info!(incident = %incident_id, "incident contained");
        }
    }

    fn publish(&mut self, mut next: Snapshot, event_id: EventId) -> Arc<Snapshot> {
        next.version = self.state.version + 1;
        next.published_at = now();
        next.last_event = Some(event_id);
        let overflow = next
            .closed_incidents
            .len()
            .saturating_sub(self.config.closed_incident_history);
        next.closed_incidents.drain(..overflow);

        let snapshot = Arc::new(next);
        self.state = Arc::clone(&snapshot);
        self.snapshots.publish(Arc::clone(&snapshot));
        self.audit.record(AuditEntry::Snapshot {
            version: snapshot.version,
        });
        snapshot
    }

    /// Validate an operator acknowledgment, then process it like any event.
    ///
    /// # Errors
    ///
    /// Returns the [`AckRejection`] that applies to the current state.
    pub async fn acknowledge(
        &mut self,
        zone_id: ZoneId,
        incident_id: IncidentId,
        operator: String,
    ) -> Result<AckReceipt, AckRejection> {
        let zone = self.state.zone(zone_id).ok_or(AckRejection::UnknownZone)?;
        let incident = self
            .state
            .incident(incident_id)
            .ok_or(AckRejection::UnknownIncident)?;
        if incident.zone_id != zone_id {
            return Err(AckRejection::ZoneMismatch);
        }
        let stage = AckStage::for_state(zone.state, incident)?;
        let rejection = AckRejection::NotEligible {
            zone_state: zone.state,
            phase: incident.phase,
        };
        let expected = zone.state.acknowledge().map_err(|_| rejection.clone())?;

        tracing::info!(
            zone = %zone.name,
            incident = %incident_id,
            operator = %operator,
            ?stage,
            "operator acknowledgment"
        );
        let snapshot = self
            .process(Event::acknowledged(zone_id, incident_id, operator))
            .await;
        if snapshot.zone_state(zone_id) != Some(expected) {
            return Err(rejection);
        }
        Ok(AckReceipt {
            zone_id,
            incident_id,
            stage,
            zone_state: expected,
            version: snapshot.version,
        })
    }

    /// Serve the inbox until shutdown is signalled or every handle is gone.
    ///
    /// Lanes are served in priority order: emergency-stop events, then
    /// synthetic command failures, then everything else. Returns the final
    /// snapshot.
    pub async fn run(
        mut self,
        mut inbox: HubInbox,
        mut shutdown: watch::Receiver<bool>,
    ) -> Arc<Snapshot> {
        tracing::info!(zones = self.state.zones.len(), "coordination hub started");
        loop {
            if *shutdown.borrow_and_update() {
                break;
            }
            if let Ok(event) = inbox.priority.try_recv() {
                self.process(event).await;
                continue;
            }
            if let Some(event) = self.follow_ups.pop_front() {
                self.process(event).await;
                continue;
            }
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                Some(event) = inbox.priority.recv() => {
                    self.process(event).await;
                }
                message = inbox.normal.recv() => match message {
                    Some(HubMessage::Event(event)) => {
                        self.process(event).await;
                    }
                    Some(HubMessage::Acknowledge { zone_id, incident_id, operator, reply }) => {
                        let result = self.acknowledge(zone_id, incident_id, operator).await;
                        if reply.send(result).is_err() {
                            tracing::debug!(incident = %incident_id, "acknowledging operator went away");
                        }
                    }
                    None => {
                        while let Ok(event) = inbox.priority.try_recv() {
                            self.process(event).await;
                        }
                        break;
                    }
                },
            }
        }
        tracing::info!(
            version = self.state.version,
            pending_follow_ups = self.follow_ups.len(),
            "coordination hub stopped"
        );
        self.state
    }

    pub fn spawn(
        self,
        inbox: HubInbox,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<Arc<Snapshot>> {
        tokio::spawn(self.run(inbox, shutdown))
    }
}

/// Drop detections that can no longer corroborate an event at `at`.
fn prune_detections(snapshot: &mut Snapshot, at: Timestamp, window: chrono::Duration) {
    for zone in &mut snapshot.zones {
        zone.detections
            .retain(|detection| (at - detection.at).abs() <= window);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use shipsafe_domain::command::{CommandFailure, CommandKind, FailureReason};
    use shipsafe_domain::event::EventKind;
    use shipsafe_domain::interlock::InterlockPolicy;
    use shipsafe_domain::subsystem::Subsystem;
    use shipsafe_domain::zone::ZoneState;
    use tokio_stream::StreamExt;

    use crate::audit_trail::AuditReceiver;
    use crate::testing::{CommandLog, RecordingSink, Ship, acking, serving_dispatcher, ship};

    struct Harness {
        ship: Ship,
        hub: CoordinationHub,
        handle: HubHandle,
        inbox: HubInbox,
        log: CommandLog,
        audit: AuditReceiver,
    }

    fn harness<F>(respond: F) -> Harness
    where
        F: Fn(&Command) -> Option<CommandReply> + Send + Sync + 'static,
    {
        let ship = ship();
        let (dispatcher, log) = serving_dispatcher(respond);
        let (trail, audit) = AuditTrail::channel();
        let (hub, handle, inbox) = CoordinationHub::new(
            &ship.registry,
            InterlockEngine::with_default_rules(InterlockPolicy::default()),
            dispatcher,
            trail,
            HubConfig {
                ack_timeout: Duration::from_millis(500),
                closed_incident_history: 1,
                ..HubConfig::default()
            },
        );
        Harness {
            ship,
            hub,
            handle,
            inbox,
            log,
            audit,
        }
    }

    fn detect(ship: &Ship, tag: &str) -> Event {
        let device = ship.device(tag);
        Event::from_device(device, EventKind::detected(device.kind.detector().unwrap()))
    }

    fn stop(ship: &Ship) -> Event {
        Event::from_device(ship.device("ESB-ER-001"), EventKind::StopPressed)
    }

    fn logged(log: &CommandLog) -> Vec<CommandKind> {
        log.lock()
            .unwrap()
            .iter()
            .map(|command| command.kind.clone())
            .collect()
    }

    #[tokio::test]
    async fn should_publish_initial_snapshot() {
        let h = harness(acking);
        let snapshot = h.handle.latest_snapshot();
        assert_eq!(snapshot.version, 0);
        assert!(
            snapshot
                .zones
                .iter()
                .all(|zone| zone.state == ZoneState::Normal)
        );
    }

    #[tokio::test]
    async fn should_reach_alarm_with_isolation_before_broadcast() {
        let mut h = harness(acking);
        let smoke = detect(&h.ship, "SMK-ER-001");
        let heat = detect(&h.ship, "HT-ER-001");

        h.hub.process(smoke).await;
        let snapshot = h.hub.process(heat).await;

        assert_eq!(snapshot.version, 2);
        assert_eq!(snapshot.zone_state(h.ship.engine_room), Some(ZoneState::Alarm));
        let kinds = logged(&h.log);
        let isolate = kinds
            .iter()
            .position(|kind| *kind == CommandKind::IsolateZone)
            .unwrap();
        let alarm = kinds
            .iter()
            .position(|kind| matches!(kind, CommandKind::SoundAlarm { .. }))
            .unwrap();
        assert!(isolate < alarm);
        assert_eq!(
            kinds
                .iter()
                .filter(|kind| **kind == CommandKind::IsolateZone)
                .count(),
            1
        );

        let incident = snapshot.active_incident(h.ship.engine_room).unwrap();
        assert_eq!(incident.phase, IncidentPhase::Contained);
        assert!(incident.first_response.is_some());
        assert_eq!(h.hub.pending_follow_ups(), 0);
    }

    #[tokio::test]
    async fn should_queue_synthetic_failure_for_offline_isolation() {
        let mut h = harness(|command| {
            Some(match command.kind {
                CommandKind::IsolateZone => Err(CommandFailure::device_offline("DMP-ER-001")),
                _ => Ok(shipsafe_domain::command::Ack::now(command.id)),
            })
        });
        h.hub.process(detect(&h.ship, "SMK-ER-001")).await;
        let snapshot = h.hub.process(detect(&h.ship, "HT-ER-001")).await;

        let incident = snapshot.active_incident(h.ship.engine_room).unwrap();
        assert_eq!(incident.failed_commands.len(), 1);
        assert_eq!(incident.phase, IncidentPhase::Escalating);
        assert_eq!(h.hub.pending_follow_ups(), 1);

        let follow_up = h.hub.follow_ups.pop_front().unwrap();
        assert!(matches!(
            &follow_up.kind,
            EventKind::CommandFailed { failure, .. } if failure.reason == FailureReason::DeviceOffline
        ));
        let snapshot = h.hub.process(follow_up).await;
        assert_eq!(
            snapshot.zone_state(h.ship.engine_room),
            Some(ZoneState::EmergencyStop)
        );
        assert!(logged(&h.log).contains(&CommandKind::StopPower));
    }

    #[tokio::test(start_paused = true)]
    async fn should_treat_silent_adapter_as_timeout() {
        let mut h = harness(|command| match command.subsystem() {
            Subsystem::Paga => None,
            _ => Some(Ok(shipsafe_domain::command::Ack::now(command.id))),
        });
        h.hub.process(detect(&h.ship, "SMK-ER-001")).await;
        h.hub.process(detect(&h.ship, "HT-ER-001")).await;

        let follow_up = h.hub.follow_ups.pop_front().unwrap();
        let EventKind::CommandFailed { command, failure } = &follow_up.kind else {
            panic!("expected a command failure");
        };
        assert_eq!(failure.reason, FailureReason::Timeout);
        assert_eq!(command.subsystem(), Subsystem::Paga);
    }

    #[tokio::test]
    async fn should_keep_state_when_decision_cannot_apply() {
        let mut h = harness(acking);
        let stray = Event::new(
            shipsafe_domain::event::EventSource::Hub,
            ZoneId::new(),
            EventKind::SmokeDetected,
        );
        let snapshot = h.hub.process(stray).await;
        assert_eq!(snapshot.version, 1);
        assert!(h.log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn should_run_two_stage_acknowledgment() {
        let mut h = harness(acking);
        h.hub.process(detect(&h.ship, "SMK-ER-001")).await;
        let incident_id = h
            .hub
            .snapshot()
            .active_incident(h.ship.engine_room)
            .unwrap()
            .id;

        let first = h
            .hub
            .acknowledge(h.ship.engine_room, incident_id, "oow".to_string())
            .await
            .unwrap();
        assert_eq!(first.stage, AckStage::Resolve);
        assert_eq!(first.zone_state, ZoneState::Recovering);

        let second = h
            .hub
            .acknowledge(h.ship.engine_room, incident_id, "master".to_string())
            .await
            .unwrap();
        assert_eq!(second.stage, AckStage::Close);
        assert_eq!(second.zone_state, ZoneState::Normal);
        assert_eq!(second.version, first.version + 1);

        let again = h
            .hub
            .acknowledge(h.ship.engine_room, incident_id, "master".to_string())
            .await;
        assert_eq!(again, Err(AckRejection::IncidentClosed));
        assert!(logged(&h.log).contains(&CommandKind::SoundAlarm {
            alarm: shipsafe_domain::command::AlarmType::AllClear
        }));
    }

    #[tokio::test]
    async fn should_reject_acknowledgment_for_wrong_zone_or_incident() {
        let mut h = harness(acking);
        h.hub.process(detect(&h.ship, "SMK-ER-001")).await;
        let incident_id = h
            .hub
            .snapshot()
            .active_incident(h.ship.engine_room)
            .unwrap()
            .id;

        let wrong_zone = h
            .hub
            .acknowledge(h.ship.bridge, incident_id, "oow".to_string())
            .await;
        assert_eq!(wrong_zone, Err(AckRejection::ZoneMismatch));

        let unknown = h
            .hub
            .acknowledge(h.ship.engine_room, IncidentId::new(), "oow".to_string())
            .await;
        assert_eq!(unknown, Err(AckRejection::UnknownIncident));

        let before = h.hub.snapshot().version;
        let unknown_zone = h
            .hub
            .acknowledge(ZoneId::new(), incident_id, "oow".to_string())
            .await;
        assert_eq!(unknown_zone, Err(AckRejection::UnknownZone));
        assert_eq!(h.hub.snapshot().version, before);
    }

    #[tokio::test]
    async fn should_bound_closed_incident_history() {
        let mut h = harness(acking);
        for _ in 0..2 {
            h.hub.process(detect(&h.ship, "SMK-ER-001")).await;
            let id = h
                .hub
                .snapshot()
                .active_incident(h.ship.engine_room)
                .unwrap()
                .id;
            for operator in ["oow", "master"] {
                h.hub
                    .acknowledge(h.ship.engine_room, id, operator.to_string())
                    .await
                    .unwrap();
            }
        }
        assert_eq!(h.hub.snapshot().closed_incidents.len(), 1);
    }

    #[tokio::test]
    async fn should_serve_priority_lane_first() {
        let h = harness(acking);
        let (shutdown_tx, shutdown) = watch::channel(false);
        h.handle.submit(detect(&h.ship, "SMK-ER-001")).unwrap();
        h.handle.submit(stop(&h.ship)).unwrap();
        let mut snapshots = h.handle.subscribe_snapshots();
        let task = h.hub.spawn(h.inbox, shutdown);

        assert_eq!(snapshots.next().await.unwrap().version, 0);
        let first = snapshots.next().await.unwrap();
        assert_eq!(first.version, 1);
        assert_eq!(
            first.zone_state(h.ship.engine_room),
            Some(ZoneState::EmergencyStop)
        );
        let second = snapshots.next().await.unwrap();
        assert_eq!(second.version, 2);

        shutdown_tx.send(true).unwrap();
        let last = task.await.unwrap();
        assert_eq!(last.version, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn should_let_stop_override_alarm_still_being_dispatched() {
        let slot: Arc<Mutex<Option<(HubHandle, Event)>>> = Arc::default();
        let pending = Arc::clone(&slot);
        let h = harness(move |command| match command.kind {
            CommandKind::IsolateZone => {
                if let Some((handle, stop)) = pending.lock().unwrap().take() {
                    handle.submit(stop).unwrap();
                }
                Some(Ok(shipsafe_domain::command::Ack::now(command.id)))
            }
            _ if command.subsystem() == Subsystem::Paga => None,
            _ => Some(Ok(shipsafe_domain::command::Ack::now(command.id))),
        });
        *slot.lock().unwrap() = Some((h.handle.clone(), stop(&h.ship)));
        let (_shutdown_tx, shutdown) = watch::channel(false);
        h.handle.submit(detect(&h.ship, "SMK-ER-001")).unwrap();
        h.handle.submit(detect(&h.ship, "HT-ER-001")).unwrap();
        let mut snapshots = h.handle.subscribe_snapshots();
        let _task = h.hub.spawn(h.inbox, shutdown);

        let mut states = Vec::new();
        while let Some(snapshot) = snapshots.next().await {
            states.push(snapshot.zone_state(h.ship.engine_room).unwrap());
            if snapshot.version == 5 {
                break;
            }
        }
        // smoke, heat, stop, then the timed-out alarm-era and stop-era broadcasts
        assert_eq!(
            states,
            vec![
                ZoneState::Normal,
                ZoneState::Alert,
                ZoneState::Alarm,
                ZoneState::EmergencyStop,
                ZoneState::EmergencyStop,
                ZoneState::EmergencyStop,
            ]
        );

        let log = h.log.lock().unwrap();
        let stop_power = log
            .iter()
            .position(|command| command.kind == CommandKind::StopPower)
            .unwrap();
        assert!(
            log[..stop_power]
                .iter()
                .all(|command| command.issued_under == ZoneState::Alarm)
        );
        assert!(
            log[stop_power..]
                .iter()
                .all(|command| command.issued_under == ZoneState::EmergencyStop)
        );
        assert!(
            log.iter()
                .filter(|command| command.kind == CommandKind::IsolateZone)
                .all(|command| command.attempt == 0)
        );
    }

    #[tokio::test]
    async fn should_answer_acknowledgments_through_handle() {
        let h = harness(acking);
        let (_shutdown_tx, shutdown) = watch::channel(false);
        let handle = h.handle.clone();
        let task = h.hub.spawn(h.inbox, shutdown);

        handle.submit(detect(&h.ship, "SMK-ER-001")).unwrap();
        let mut snapshots = handle.subscribe_snapshots();
        let incident_id = loop {
            let snapshot = snapshots.next().await.unwrap();
            if let Some(incident) = snapshot.active_incident(h.ship.engine_room) {
                break incident.id;
            }
        };

        let receipt = handle
            .submit_acknowledgment(h.ship.engine_room, incident_id, "oow")
            .await
            .unwrap();
        assert_eq!(receipt.zone_state, ZoneState::Recovering);

        drop(handle);
        drop(h.handle);
        let last = task.await.unwrap();
        assert_eq!(last.version, receipt.version);
    }

    #[tokio::test]
    async fn should_process_follow_ups_before_new_events() {
        let failures = Arc::new(Mutex::new(0_u32));
        let counter = Arc::clone(&failures);
        let h = harness(move |command| {
            Some(match command.kind {
                CommandKind::IsolateZone => {
                    *counter.lock().unwrap() += 1;
                    Err(CommandFailure::device_offline("DMP-ER-001"))
                }
                _ => Ok(shipsafe_domain::command::Ack::now(command.id)),
            })
        });
        let (_shutdown_tx, shutdown) = watch::channel(false);
        h.handle.submit(detect(&h.ship, "SMK-ER-001")).unwrap();
        h.handle.submit(detect(&h.ship, "HT-ER-001")).unwrap();
        let motion = Event::from_device(h.ship.device("CAM-BR-001"), EventKind::MotionDetected);
        h.handle.submit(motion).unwrap();
        let mut snapshots = h.handle.subscribe_snapshots();
        let _task = h.hub.spawn(h.inbox, shutdown);

        let mut states = Vec::new();
        while let Some(snapshot) = snapshots.next().await {
            states.push((
                snapshot.zone_state(h.ship.engine_room).unwrap(),
                snapshot.zone_state(h.ship.bridge).unwrap(),
            ));
            if snapshot.version == 4 {
                break;
            }
        }
        // smoke, heat, synthetic failure, then motion
        assert_eq!(states[3].0, ZoneState::EmergencyStop);
        assert_eq!(states[3].1, ZoneState::Normal);
        assert_eq!(states[4].1, ZoneState::Alert);
        assert_eq!(*failures.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn should_audit_in_processing_order() {
        let mut h = harness(acking);
        h.hub.process(stop(&h.ship)).await;
        drop(h.hub);

        let sink = Arc::new(RecordingSink::default());
        crate::audit_trail::run_audit_writer(
            h.audit,
            Arc::clone(&sink),
            crate::audit_trail::RetryPolicy::default(),
        )
        .await;

        let records = sink.records.lock().unwrap();
        let kinds: Vec<&str> = records.iter().map(|record| record.entry.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                "event",
                "command_issued",
                "command_issued",
                "command_issued",
                "command_issued",
                "command_outcome",
                "command_outcome",
                "command_outcome",
                "command_outcome",
                "snapshot",
            ]
        );
        assert!(records.windows(2).all(|pair| pair[0].seq < pair[1].seq));
    }
}
