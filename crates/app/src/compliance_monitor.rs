//! Compliance monitor: read-only observer of the snapshot stream.
//!
//! The monitor evaluates the regulatory rule set on every published snapshot
//! and on a periodic schedule. Violations are reported once per rule, zone
//! and incident while the condition persists, written to the audit trail and
//! kept for the compliance report. Nothing here feeds back into the hub.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_stream::{Stream, StreamExt};

use shipsafe_domain::audit::AuditEntry;
use shipsafe_domain::compliance::{
    ComplianceRule, ComplianceStandard, ComplianceStatus, ComplianceViolation, RuleCheck,
};
use shipsafe_domain::device::DeviceKind;
use shipsafe_domain::id::{IncidentId, ZoneId};
use shipsafe_domain::incident::{Incident, IncidentPhase};
use shipsafe_domain::snapshot::Snapshot;
use shipsafe_domain::time::{Timestamp, now, to_chrono};

use crate::audit_trail::AuditTrail;

type ViolationKey = (String, Option<ZoneId>, Option<IncidentId>);

/// Outcome of one rule evaluated against one subject.
enum Finding {
    Pass,
    Breach(String),
}

pub struct ComplianceMonitor {
    rules: Vec<ComplianceRule>,
    audit: AuditTrail,
    /// Keys whose condition is currently violated and already reported.
    active: HashSet<ViolationKey>,
    violations: Vec<ComplianceViolation>,
    latest: Option<Arc<Snapshot>>,
}

impl ComplianceMonitor {
    #[must_use]
    pub fn new(rules: Vec<ComplianceRule>, audit: AuditTrail) -> Self {
        Self {
            rules,
            audit,
            active: HashSet::new(),
            violations: Vec::new(),
            latest: None,
        }
    }

    /// Every violation reported so far, oldest first.
    #[must_use]
    pub fn violations(&self) -> &[ComplianceViolation] {
        &self.violations
    }

    /// Worst status per standard among the violations still in force.
    ///
    /// Standards without an active violation are compliant.
    #[must_use]
    pub fn summary(&self) -> BTreeMap<ComplianceStandard, ComplianceStatus> {
        let mut summary: BTreeMap<_, _> = self
            .rules
            .iter()
            .map(|rule| (rule.standard, ComplianceStatus::Compliant))
            .collect();
        for violation in &self.violations {
            let key = (
                violation.rule_id.clone(),
                violation.zone_id,
                violation.incident_id,
            );
            if !self.active.contains(&key) {
                continue;
            }
            let status = summary
                .entry(violation.standard)
                .or_insert(ComplianceStatus::Compliant);
            *status = (*status).max(violation.status);
        }
        summary
    }

    /// Evaluate the transition checks against a freshly published snapshot.
    pub fn observe(&mut self, snapshot: &Snapshot) {
        let at = snapshot.published_at;
        let rules = std::mem::take(&mut self.rules);
        for rule in rules.iter().filter(|rule| rule.check.is_transition_check()) {
            for incident in snapshot.incidents.iter().chain(&snapshot.closed_incidents) {
                let finding = check_incident(&rule.check, incident, at);
                self.settle(rule, Some(incident.zone_id), Some(incident.id), finding, at);
            }
        }
        self.rules = rules;
    }

    /// Evaluate the scheduled checks at `at`.
    pub fn periodic_check(&mut self, snapshot: &Snapshot, at: Timestamp) {
        let rules = std::mem::take(&mut self.rules);
        for rule in rules.iter().filter(|rule| rule.check.is_periodic_check()) {
            match &rule.check {
                RuleCheck::AcknowledgmentTime { .. } => {
                    for incident in &snapshot.incidents {
                        let finding = check_incident(&rule.check, incident, at);
                        self.settle(rule, Some(incident.zone_id), Some(incident.id), finding, at);
                    }
                }
                RuleCheck::DetectionCoverage {
                    min_healthy_detectors,
                } => {
                    for zone in &snapshot.zones {
                        let (healthy, total) = count_devices(snapshot, Some(zone.id), |kind| {
                            kind.detector().is_some()
                        });
                        if total == 0 {
                            continue;
                        }
                        let finding = if healthy < *min_healthy_detectors {
                            Finding::Breach(format!(
                                "{healthy} of {total} detectors healthy in {}, {min_healthy_detectors} required",
                                zone.name
                            ))
                        } else {
                            Finding::Pass
                        };
                        self.settle(rule, Some(zone.id), None, finding, at);
                    }
                }
                RuleCheck::RadioAvailability { min_healthy_radios } => {
                    let (healthy, total) =
                        count_devices(snapshot, None, |kind| kind == DeviceKind::Radio);
                    let finding = if healthy < *min_healthy_radios {
                        Finding::Breach(format!(
                            "{healthy} of {total} radios healthy, {min_healthy_radios} required"
                        ))
                    } else {
                        Finding::Pass
                    };
                    self.settle(rule, None, None, finding, at);
                }
                RuleCheck::ResponseTime { .. } => {}
            }
        }
        self.rules = rules;
    }

    fn settle(
        &mut self,
        rule: &ComplianceRule,
        zone_id: Option<ZoneId>,
        incident_id: Option<IncidentId>,
        finding: Finding,
        at: Timestamp,
    ) {
        let key = (rule.id.clone(), zone_id, incident_id);
        match finding {
            Finding::Pass => {
                // Incident findings are final once reported.
                if incident_id.is_none() {
                    self.active.remove(&key);
                }
            }
            Finding::Breach(detail) => {
                if !self.active.insert(key) {
                    return;
                }
                tracing::warn!(
                    rule = %rule.id,
                    standard = %rule.standard,
                    status = %rule.on_violation,
                    zone = ?zone_id,
                    incident = ?incident_id,
                    %detail,
                    "compliance violation"
                );
                let violation = ComplianceViolation::new(rule, zone_id, incident_id, at, detail);
                self.audit.record(AuditEntry::Violation(violation.clone()));
                self.violations.push(violation);
            }
        }
    }

    /// Follow `snapshots` and run the periodic check every `interval` until
    /// shutdown or the end of the stream.
    ///
    /// Returns the monitor so its report survives the task.
    pub async fn run<S>(
        mut self,
        mut snapshots: S,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> Self
    where
        S: Stream<Item = Arc<Snapshot>> + Unpin,
    {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            if *shutdown.borrow_and_update() {
                break;
            }
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                snapshot = snapshots.next() => match snapshot {
                    Some(snapshot) => {
                        self.observe(&snapshot);
                        self.latest = Some(snapshot);
                    }
                    None => break,
                },
                _ = ticker.tick() => {
                    if let Some(latest) = self.latest.clone() {
                        self.periodic_check(&latest, now());
                    }
                }
            }
        }
        tracing::info!(
            violations = self.violations.len(),
            active = self.active.len(),
            "compliance monitor stopped"
        );
        self
    }
}

fn check_incident(check: &RuleCheck, incident: &Incident, at: Timestamp) -> Finding {
    match check {
        RuleCheck::ResponseTime { cause, bound } if incident.cause == *cause => {
            match incident.response_latency() {
                Some(latency) if latency > to_chrono(*bound) => Finding::Breach(format!(
                    "first response after {}ms, bound {}ms",
                    latency.num_milliseconds(),
                    bound.as_millis()
                )),
                Some(_) => Finding::Pass,
                // Incidents that only warrant observation are never due.
                None if incident.awaits_response() => Finding::Breach(format!(
                    "incident reached {} without a corrective response",
                    incident.phase
                )),
                None => Finding::Pass,
            }
        }
        RuleCheck::AcknowledgmentTime { bound } => {
            let waiting = matches!(
                incident.phase,
                IncidentPhase::Escalating | IncidentPhase::Contained
            ) && incident.acknowledged_by.is_empty();
            match incident.escalated_at {
                Some(escalated_at) if waiting && at - escalated_at > to_chrono(*bound) => {
                    Finding::Breach(format!(
                        "unacknowledged for {}s, bound {}s",
                        (at - escalated_at).num_seconds(),
                        bound.as_secs()
                    ))
                }
                _ => Finding::Pass,
            }
        }
        _ => Finding::Pass,
    }
}

/// Healthy and total devices matching `kind`, in one zone or ship-wide.
fn count_devices(
    snapshot: &Snapshot,
    zone_id: Option<ZoneId>,
    kind: impl Fn(DeviceKind) -> bool,
) -> (usize, usize) {
    snapshot
        .devices
        .iter()
        .filter(|device| zone_id.is_none_or(|zone_id| device.zone_id == zone_id))
        .filter(|device| kind(device.kind))
        .fold((0, 0), |(healthy, total), device| {
            (healthy + usize::from(device.health.is_healthy()), total + 1)
        })
}
