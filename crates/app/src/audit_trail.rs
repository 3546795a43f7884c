//! Audit trail: ordered hand-off of audit records to a background writer.
//!
//! Producers (the hub, the compliance monitor) never wait on the sink. They
//! push records into an unbounded channel; a single writer task drains it
//! and retries failed writes against the [`AuditSink`].

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;

use shipsafe_domain::audit::{AuditEntry, AuditRecord};
use shipsafe_domain::error::ShipSafeError;
use shipsafe_domain::time::now;

use crate::ports::AuditSink;

/// Cloneable producer side of the audit trail.
#[derive(Debug, Clone)]
pub struct AuditTrail {
    inner: Arc<Mutex<TrailInner>>,
}

#[derive(Debug)]
struct TrailInner {
    next_seq: u64,
    sender: mpsc::UnboundedSender<AuditRecord>,
}

/// Consumer side, handed to [`run_audit_writer`].
#[derive(Debug)]
pub struct AuditReceiver {
    receiver: mpsc::UnboundedReceiver<AuditRecord>,
}

impl AuditTrail {
    #[must_use]
    pub fn channel() -> (Self, AuditReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let trail = Self {
            inner: Arc::new(Mutex::new(TrailInner {
                next_seq: 1,
                sender,
            })),
        };
        (trail, AuditReceiver { receiver })
    }

    /// Stamp `entry` with the next sequence number and queue it.
    ///
    /// Numbering and queueing happen under one lock, so sequence order is
    /// queue order even with several producers.
    pub fn record(&self, entry: AuditEntry) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let record = AuditRecord {
            seq: inner.next_seq,
            recorded_at: now(),
            entry,
        };
        match inner.sender.send(record) {
            Ok(()) => inner.next_seq += 1,
            Err(mpsc::error::SendError(record)) => {
                tracing::error!(
                    seq = record.seq,
                    kind = record.entry.kind(),
                    "audit writer is gone, record lost"
                );
            }
        }
    }
}

/// Retry behavior of the audit writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_millis(200),
        }
    }
}

/// Summary of a finished writer run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    pub written: u64,
    pub abandoned: u64,
}

/// Drain the trail into `sink` until every [`AuditTrail`] clone is dropped.
///
/// Each record is retried with linear backoff. A record that still fails
/// after `policy.max_attempts` is logged at error level with its content and
/// counted as abandoned; it is never dropped silently.
pub async fn run_audit_writer<S: AuditSink>(
    mut receiver: AuditReceiver,
    sink: S,
    policy: RetryPolicy,
) -> WriterStats {
    let mut stats = WriterStats::default();
    while let Some(record) = receiver.receiver.recv().await {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match sink.record(&record).await {
                Ok(()) => {
                    stats.written += 1;
                    break;
                }
                Err(err) if attempt < policy.max_attempts => {
                    tracing::warn!(
                        seq = record.seq,
                        attempt,
                        error = %err,
                        "audit write failed, retrying"
                    );
                    tokio::time::sleep(policy.backoff * attempt).await;
                }
                Err(err) => {
                    tracing::error!(
                        seq = record.seq,
                        attempts = attempt,
                        error = %err,
                        record = %serde_json::to_string(&record).unwrap_or_default(),
                        "audit write abandoned"
                    );
                    stats.abandoned += 1;
                    break;
                }
            }
        }
    }
    tracing::info!(
        written = stats.written,
        abandoned = stats.abandoned,
        "audit writer stopped"
    );
    stats
}

/// An [`AuditSink`] that emits each record as a structured `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    async fn record(&self, record: &AuditRecord) -> Result<(), ShipSafeError> {
        tracing::info!(
            target: "shipsafe::audit",
            seq = record.seq,
            kind = record.entry.kind(),
            zone = ?record.entry.zone_id(),
            entry = %serde_json::to_string(&record.entry).unwrap_or_default(),
            "audit"
        );
        Ok(())
    }
}
