//! Hub handle: the cloneable entry point injected into adapters and
//! observers.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::Stream;

use shipsafe_domain::error::{AckRejection, ShipSafeError};
use shipsafe_domain::event::Event;
use shipsafe_domain::id::{IncidentId, ZoneId};
use shipsafe_domain::incident::AckStage;
use shipsafe_domain::snapshot::Snapshot;
use shipsafe_domain::zone::ZoneState;

use crate::snapshot_bus::SnapshotBus;

/// Accepted acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AckReceipt {
    pub zone_id: ZoneId,
    pub incident_id: IncidentId,
    pub stage: AckStage,
    /// Zone state once the acknowledgment was applied.
    pub zone_state: ZoneState,
    /// Snapshot version that reflects it.
    pub version: u64,
}

pub(super) enum HubMessage {
    Event(Event),
    Acknowledge {
        zone_id: ZoneId,
        incident_id: IncidentId,
        operator: String,
        reply: oneshot::Sender<Result<AckReceipt, AckRejection>>,
    },
}

/// Receiving side of the hub lanes, consumed by `CoordinationHub::run`.
#[derive(Debug)]
pub struct HubInbox {
    pub(super) priority: mpsc::UnboundedReceiver<Event>,
    pub(super) normal: mpsc::UnboundedReceiver<HubMessage>,
}

#[derive(Debug, Clone)]
pub struct HubHandle {
    priority: mpsc::UnboundedSender<Event>,
    normal: mpsc::UnboundedSender<HubMessage>,
    snapshots: Arc<SnapshotBus>,
}

impl HubHandle {
    pub(super) fn channel(snapshots: Arc<SnapshotBus>) -> (Self, HubInbox) {
        let (priority, priority_rx) = mpsc::unbounded_channel();
        let (normal, normal_rx) = mpsc::unbounded_channel();
        let handle = Self {
            priority,
            normal,
            snapshots,
        };
        let inbox = HubInbox {
            priority: priority_rx,
            normal: normal_rx,
        };
        (handle, inbox)
    }

    /// Queue an event for the hub. Never waits.
    ///
    /// Emergency-stop events take the priority lane; everything else keeps
    /// arrival order on the normal lane.
    ///
    /// # Errors
    ///
    /// Returns [`ShipSafeError::Unavailable`] once the hub has stopped.
    pub fn submit(&self, event: Event) -> Result<(), ShipSafeError> {
        let sent = if event.is_priority() {
            self.priority.send(event).is_ok()
        } else {
            self.normal.send(HubMessage::Event(event)).is_ok()
        };
        if sent {
            Ok(())
        } else {
            Err(ShipSafeError::Unavailable("coordination hub"))
        }
    }

    /// Acknowledge an incident on behalf of `operator`.
    ///
    /// The acknowledgment is serialized with every other event and resolves
    /// once its snapshot is published.
    ///
    /// # Errors
    ///
    /// Returns the [`AckRejection`] explaining why the acknowledgment does
    /// not apply, or [`AckRejection::HubUnavailable`] once the hub stopped.
    pub async fn submit_acknowledgment(
        &self,
        zone_id: ZoneId,
        incident_id: IncidentId,
        operator: impl Into<String>,
    ) -> Result<AckReceipt, AckRejection> {
        let (reply, response) = oneshot::channel();
        self.normal
            .send(HubMessage::Acknowledge {
                zone_id,
                incident_id,
                operator: operator.into(),
                reply,
            })
            .map_err(|_| AckRejection::HubUnavailable)?;
        response.await.map_err(|_| AckRejection::HubUnavailable)?
    }

    /// Latest snapshot first, then every later version.
    pub fn subscribe_snapshots(
        &self,
    ) -> impl Stream<Item = Arc<Snapshot>> + Send + Unpin + 'static {
        self.snapshots.subscribe()
    }

    #[must_use]
    pub fn latest_snapshot(&self) -> Arc<Snapshot> {
        self.snapshots.latest()
    }
}
