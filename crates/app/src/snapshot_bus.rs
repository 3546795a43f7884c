//! In-process snapshot bus backed by a tokio broadcast channel plus a
//! latest-value cell.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::{Stream, StreamExt};

use shipsafe_domain::snapshot::Snapshot;

/// Fan-out of published snapshots.
///
/// Publishing succeeds even when there are no active subscribers. A new
/// subscriber always starts from the latest snapshot; there is no replay.
#[derive(Debug)]
pub struct SnapshotBus {
    sender: broadcast::Sender<Arc<Snapshot>>,
    latest: watch::Sender<Arc<Snapshot>>,
}

impl SnapshotBus {
    /// Create a bus holding `initial` as its latest snapshot.
    #[must_use]
    pub fn new(capacity: usize, initial: Snapshot) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        let (latest, _) = watch::channel(Arc::new(initial));
        Self { sender, latest }
    }

    /// Make `snapshot` the latest and send it to every subscriber.
    pub fn publish(&self, snapshot: Arc<Snapshot>) {
        self.latest.send_replace(Arc::clone(&snapshot));
        // Only fails without receivers, which is fine.
        let _ = self.sender.send(snapshot);
    }

    #[must_use]
    pub fn latest(&self) -> Arc<Snapshot> {
        Arc::clone(&self.latest.borrow())
    }

    /// Subscribe to snapshots: the latest one first, then every later version.
    ///
    /// The stream is lazy and unbounded. A consumer that falls behind the
    /// broadcast capacity sees a version gap, which is logged.
    pub fn subscribe(&self) -> impl Stream<Item = Arc<Snapshot>> + Send + Unpin + 'static {
        // Subscribe before reading the latest so nothing falls in between.
        let receiver = self.sender.subscribe();
        let latest = self.latest();
        let mut last_version = latest.version;

        let updates = BroadcastStream::new(receiver).filter_map(move |result| match result {
            Ok(snapshot) if snapshot.version <= last_version => None,
            Ok(snapshot) => {
                if snapshot.version > last_version + 1 {
                    tracing::warn!(
                        expected = last_version + 1,
                        received = snapshot.version,
                        "snapshot subscriber observed a version gap"
                    );
                }
                last_version = snapshot.version;
                Some(snapshot)
            }
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "snapshot subscriber lagged, some versions were dropped");
                None
            }
        });

        tokio_stream::once(latest).chain(updates)
    }
}
