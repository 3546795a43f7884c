//! `SQLite` implementation of [`AuditSink`], plus read-back queries.

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use shipsafe_app::ports::AuditSink;
use shipsafe_domain::audit::{AuditEntry, AuditRecord};
use shipsafe_domain::error::ShipSafeError;
use shipsafe_domain::id::ZoneId;

use crate::error::StorageError;

struct Wrapper(AuditRecord);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let seq: i64 = row.try_get("seq")?;
        let recorded_at: String = row.try_get("recorded_at")?;
        let entry: String = row.try_get("entry")?;

        let seq = u64::try_from(seq).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let recorded_at = chrono::DateTime::parse_from_rfc3339(&recorded_at)
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?
            .to_utc();
        let entry: AuditEntry =
            serde_json::from_str(&entry).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;

        Ok(Self(AuditRecord {
            seq,
            recorded_at,
            entry,
        }))
    }
}

// A retried write of an already stored record is a no-op.
const INSERT: &str = r"
    INSERT OR IGNORE INTO audit_log (seq, recorded_at, kind, zone_id, entry)
    VALUES (?, ?, ?, ?, ?)
";

const SELECT_RECENT: &str = "SELECT * FROM audit_log ORDER BY seq DESC LIMIT ?";
const SELECT_BY_ZONE: &str = "SELECT * FROM audit_log WHERE zone_id = ? ORDER BY seq DESC LIMIT ?";
const SELECT_AFTER: &str = "SELECT * FROM audit_log WHERE seq > ? ORDER BY seq ASC LIMIT ?";
const COUNT: &str = "SELECT COUNT(*) FROM audit_log";

/// `SQLite`-backed audit trail.
#[derive(Debug, Clone)]
pub struct SqliteAuditSink {
    pool: SqlitePool,
}

impl SqliteAuditSink {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// The newest `limit` records, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`ShipSafeError::Storage`] when the query fails.
    pub async fn recent(&self, limit: usize) -> Result<Vec<AuditRecord>, ShipSafeError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_RECENT)
            .bind(clamp(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    /// The newest `limit` records about `zone_id`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`ShipSafeError::Storage`] when the query fails.
    pub async fn for_zone(
        &self,
        zone_id: ZoneId,
        limit: usize,
    ) -> Result<Vec<AuditRecord>, ShipSafeError> {
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_BY_ZONE)
            .bind(zone_id.as_uuid())
            .bind(clamp(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    /// Up to `limit` records following `seq`, in trail order.
    ///
    /// # Errors
    ///
    /// Returns [`ShipSafeError::Storage`] when the query fails.
    pub async fn after(&self, seq: u64, limit: usize) -> Result<Vec<AuditRecord>, ShipSafeError> {
        let seq = i64::try_from(seq).map_err(|_| StorageError::SeqOutOfRange(seq))?;
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_AFTER)
            .bind(seq)
            .bind(clamp(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    /// # Errors
    ///
    /// Returns [`ShipSafeError::Storage`] when the query fails.
    pub async fn count(&self) -> Result<u64, ShipSafeError> {
        let (count,): (i64,) = sqlx::query_as(COUNT)
            .fetch_one(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}

impl AuditSink for SqliteAuditSink {
    async fn record(&self, record: &AuditRecord) -> Result<(), ShipSafeError> {
        let seq = i64::try_from(record.seq).map_err(|_| StorageError::SeqOutOfRange(record.seq))?;
        let entry = serde_json::to_string(&record.entry).map_err(StorageError::from)?;

        sqlx::query(INSERT)
            .bind(seq)
            .bind(record.recorded_at.to_rfc3339())
            .bind(record.entry.kind())
            .bind(record.entry.zone_id().map(ZoneId::as_uuid))
            .bind(&entry)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(())
    }
}

fn clamp(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}
