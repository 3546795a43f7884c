//! Audit sink port: append-only destination of the audit trail.

use std::future::Future;
use std::sync::Arc;

use shipsafe_domain::audit::AuditRecord;
use shipsafe_domain::error::ShipSafeError;

/// Appends audit records. Best-effort from the hub's point of view: the
/// audit writer retries failed writes, the hub never waits on them.
pub trait AuditSink: Send + Sync {
    fn record(
        &self,
        record: &AuditRecord,
    ) -> impl Future<Output = Result<(), ShipSafeError>> + Send;
}

impl<T: AuditSink> AuditSink for Arc<T> {
    fn record(
        &self,
        record: &AuditRecord,
    ) -> impl Future<Output = Result<(), ShipSafeError>> + Send {
        (**self).record(record)
    }
}
