//! Storage-specific error type wrapping sqlx errors.

use shipsafe_domain::error::ShipSafeError;

/// Errors originating from the `SQLite` audit log.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A query or connection failed.
    #[error("database error")]
    Database(#[from] sqlx::Error),

    /// An audit entry could not be encoded or decoded.
    #[error("JSON error")]
    Json(#[from] serde_json::Error),

    #[error("migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A sequence number does not fit the `SQLite` integer range.
    #[error("sequence number {0} out of range")]
    SeqOutOfRange(u64),
}

impl From<StorageError> for ShipSafeError {
    fn from(err: StorageError) -> Self {
        Self::Storage(Box::new(err))
    }
}
