//! Line-oriented operator and sensor input.
//!
//! Each line is one JSON object, either a raw signal
//! (`{"device": "SMK-ER-001", "signal": "smoke", "value": 0.4}`) or an
//! acknowledgment (`{"acknowledge": {"zone": "engine_room", "operator": "chief"}}`).
//! An acknowledgment without `incident` applies to the zone's active one.

use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use shipsafe_app::hub::AckReceipt;
use shipsafe_domain::error::AckRejection;
use shipsafe_domain::id::IncidentId;
use shipsafe_domain::signal::RawSignal;

use crate::system::System;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Line {
    Acknowledge { acknowledge: AckRequest },
    Signal(RawSignal),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AckRequest {
    /// Zone name.
    pub zone: String,
    #[serde(default)]
    pub incident: Option<IncidentId>,
    pub operator: String,
}

/// Counters of a finished input stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngressStats {
    pub signals: u64,
    pub acknowledgments: u64,
    pub rejected: u64,
}

/// Read `reader` to the end, routing every line into `system`.
///
/// Unreadable lines are logged and counted, never fatal.
pub async fn pump<R>(reader: R, system: &System) -> IngressStats
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = IngressStats::default();
    let mut lines = reader.lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                tracing::error!(error = %err, "failed to read input");
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Line>(line) {
            Ok(Line::Signal(signal)) => {
                let device = signal.device.clone();
                match system.route(signal).await {
                    Ok(()) => stats.signals += 1,
                    Err(err) => {
                        tracing::warn!(%device, error = %err, "signal dropped");
                        stats.rejected += 1;
                    }
                }
            }
            Ok(Line::Acknowledge { acknowledge }) => {
                match acknowledge_zone(system, acknowledge).await {
                    Ok(receipt) => {
                        tracing::info!(
                            incident = %receipt.incident_id,
                            stage = ?receipt.stage,
                            zone_state = %receipt.zone_state,
                            version = receipt.version,
                            "acknowledgment accepted"
                        );
                        stats.acknowledgments += 1;
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "acknowledgment refused");
                        stats.rejected += 1;
                    }
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, line, "unreadable input line");
                stats.rejected += 1;
            }
        }
    }
    stats
}

/// Resolve a named zone against the latest snapshot and acknowledge it.
///
/// # Errors
///
/// Returns the [`AckRejection`] from the hub, or `UnknownZone` /
/// `UnknownIncident` when the names do not resolve.
pub async fn acknowledge_zone(
    system: &System,
    request: AckRequest,
) -> Result<AckReceipt, AckRejection> {
    let snapshot = system.handle().latest_snapshot();
    let zone = snapshot
        .zone_by_name(&request.zone)
        .ok_or(AckRejection::UnknownZone)?;
    let incident = match request.incident {
        Some(incident) => incident,
        None => {
            snapshot
                .active_incident(zone.id)
                .ok_or(AckRejection::UnknownIncident)?
                .id
        }
    };
    system
        .handle()
        .submit_acknowledgment(zone.id, incident, request.operator)
        .await
}
