//! Time and timestamp helpers.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

/// UTC timestamp used for event times, incident milestones, audit records, etc.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

static ORIGIN: OnceLock<Instant> = OnceLock::new();

/// Monotonic offset from the process clock origin.
///
/// The origin is fixed on first call, so values are comparable within one
/// process only.
#[must_use]
pub fn monotonic() -> Duration {
    ORIGIN.get_or_init(Instant::now).elapsed()
}

/// Convert a [`Duration`] into a signed chrono duration, saturating on overflow.
#[must_use]
pub fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}
