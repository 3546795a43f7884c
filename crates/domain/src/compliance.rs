//! Compliance rules: regulatory checks over snapshots and incident history.
//!
//! Compliance is observational. Nothing here may feed back into safety
//! decisions.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::id::{IncidentId, ViolationId, ZoneId};
use crate::incident::IncidentCause;
use crate::time::Timestamp;

/// Regulatory framework a rule derives from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStandard {
    /// International Convention for the Safety of Life at Sea.
    Solas,
    /// International Safety Management code.
    Ism,
    /// DNV class rules.
    Dnv,
}

impl std::fmt::Display for ComplianceStandard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Solas => f.write_str("solas"),
            Self::Ism => f.write_str("ism"),
            Self::Dnv => f.write_str("dnv"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    Compliant,
    Warning,
    NonCompliant,
}

impl std::fmt::Display for ComplianceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Compliant => f.write_str("compliant"),
            Self::Warning => f.write_str("warning"),
            Self::NonCompliant => f.write_str("non_compliant"),
        }
    }
}

/// The predicate a rule evaluates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleCheck {
    /// First corrective command within `bound` of the triggering event.
    ResponseTime {
        cause: IncidentCause,
        bound: Duration,
    },
    /// An escalated incident is acknowledged within `bound`.
    AcknowledgmentTime { bound: Duration },
    /// Every zone owning detectors keeps at least this many healthy ones.
    DetectionCoverage { min_healthy_detectors: usize },
    /// The vessel keeps at least this many healthy radios.
    RadioAvailability { min_healthy_radios: usize },
}

impl RuleCheck {
    /// Evaluated on every incident transition.
    #[must_use]
    pub fn is_transition_check(&self) -> bool {
        matches!(
            self,
            Self::ResponseTime { .. } | Self::AcknowledgmentTime { .. }
        )
    }

    /// Evaluated on the scheduled periodic check.
    #[must_use]
    pub fn is_periodic_check(&self) -> bool {
        !matches!(self, Self::ResponseTime { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceRule {
    pub id: String,
    pub standard: ComplianceStandard,
    pub description: String,
    pub check: RuleCheck,
    /// Status a standard falls to while this rule is violated.
    pub on_violation: ComplianceStatus,
}

impl ComplianceRule {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        standard: ComplianceStandard,
        description: impl Into<String>,
        check: RuleCheck,
    ) -> Self {
        Self {
            id: id.into(),
            standard,
            description: description.into(),
            check,
            on_violation: ComplianceStatus::NonCompliant,
        }
    }

    #[must_use]
    pub fn warning_only(mut self) -> Self {
        self.on_violation = ComplianceStatus::Warning;
        self
    }
}

/// Parameters of the default rule set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComplianceBounds {
    pub emergency_stop_response: Duration,
    pub fire_response: Duration,
    pub man_overboard_response: Duration,
    pub intrusion_response: Duration,
    pub acknowledgment: Duration,
    pub min_healthy_detectors: usize,
    pub min_healthy_radios: usize,
}

impl Default for ComplianceBounds {
    fn default() -> Self {
        Self {
            emergency_stop_response: Duration::from_secs(15),
            fire_response: Duration::from_secs(30),
            man_overboard_response: Duration::from_secs(10),
            intrusion_response: Duration::from_secs(45),
            acknowledgment: Duration::from_secs(600),
            min_healthy_detectors: 1,
            min_healthy_radios: 2,
        }
    }
}

/// The standard rule set, parameterized by `bounds`.
#[must_use]
pub fn default_rules(bounds: &ComplianceBounds) -> Vec<ComplianceRule> {
    vec![
        ComplianceRule::new(
            "estop-response-time",
            ComplianceStandard::Solas,
            "emergency shutdown executed within the protocol response time",
            RuleCheck::ResponseTime {
                cause: IncidentCause::EmergencyStop,
                bound: bounds.emergency_stop_response,
            },
        ),
        ComplianceRule::new(
            "fire-response-time",
            ComplianceStandard::Solas,
            "fire containment started within the protocol response time",
            RuleCheck::ResponseTime {
                cause: IncidentCause::Fire,
                bound: bounds.fire_response,
            },
        ),
        ComplianceRule::new(
            "mob-response-time",
            ComplianceStandard::Solas,
            "man-overboard alarm raised within the protocol response time",
            RuleCheck::ResponseTime {
                cause: IncidentCause::ManOverboard,
                bound: bounds.man_overboard_response,
            },
        ),
        ComplianceRule::new(
            "intrusion-response-time",
            ComplianceStandard::Ism,
            "security alert answered within the protocol response time",
            RuleCheck::ResponseTime {
                cause: IncidentCause::Intrusion,
                bound: bounds.intrusion_response,
            },
        )
        .warning_only(),
        ComplianceRule::new(
            "incident-acknowledgment",
            ComplianceStandard::Ism,
            "escalated incidents acknowledged by the officer of the watch",
            RuleCheck::AcknowledgmentTime {
                bound: bounds.acknowledgment,
            },
        )
        .warning_only(),
        ComplianceRule::new(
            "fire-detection-coverage",
            ComplianceStandard::Solas,
            "fire detection coverage for all protected zones (SOLAS II-2)",
            RuleCheck::DetectionCoverage {
                min_healthy_detectors: bounds.min_healthy_detectors,
            },
        ),
        ComplianceRule::new(
            "vhf-radio-coverage",
            ComplianceStandard::Solas,
            "VHF radio installations available for distress communication (SOLAS IV)",
            RuleCheck::RadioAvailability {
                min_healthy_radios: bounds.min_healthy_radios,
            },
        ),
    ]
}

/// A recorded breach of a [`ComplianceRule`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceViolation {
    pub id: ViolationId,
    pub rule_id: String,
    pub standard: ComplianceStandard,
    pub status: ComplianceStatus,
    pub zone_id: Option<ZoneId>,
    pub incident_id: Option<IncidentId>,
    pub detected_at: Timestamp,
    pub detail: String,
}

impl ComplianceViolation {
    #[must_use]
    pub fn new(
        rule: &ComplianceRule,
        zone_id: Option<ZoneId>,
        incident_id: Option<IncidentId>,
        detected_at: Timestamp,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            id: ViolationId::new(),
            rule_id: rule.id.clone(),
            standard: rule.standard,
            status: rule.on_violation,
            zone_id,
            incident_id,
            detected_at,
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_include_protocol_response_times_in_default_rules() {
        let rules = default_rules(&ComplianceBounds::default());
        let fire = rules
            .iter()
            .find(|rule| rule.id == "fire-response-time")
            .unwrap();
        assert_eq!(
            fire.check,
            RuleCheck::ResponseTime {
                cause: IncidentCause::Fire,
                bound: Duration::from_secs(30),
            }
        );
        assert_eq!(fire.on_violation, ComplianceStatus::NonCompliant);
    }

    #[test]
    fn should_classify_checks_by_schedule() {
        let response = RuleCheck::ResponseTime {
            cause: IncidentCause::Fire,
            bound: Duration::from_secs(1),
        };
        let coverage = RuleCheck::DetectionCoverage {
            min_healthy_detectors: 1,
        };
        let ack = RuleCheck::AcknowledgmentTime {
            bound: Duration::from_secs(1),
        };
        assert!(response.is_transition_check() && !response.is_periodic_check());
        assert!(!coverage.is_transition_check() && coverage.is_periodic_check());
        assert!(ack.is_transition_check() && ack.is_periodic_check());
    }

    #[test]
    fn should_rank_non_compliant_worst() {
        assert!(ComplianceStatus::NonCompliant > ComplianceStatus::Warning);
        assert!(ComplianceStatus::Warning > ComplianceStatus::Compliant);
    }
}
