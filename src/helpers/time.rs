use chrono::{DateTime, Duration, Utc};
use tokio::time::Instant;

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

pub fn now_i64() -> i64 {
    Utc::now().timestamp()
}

pub fn get_instant() -> Instant {
    Instant::now()
}

/// Absolute expiry of a token acquired at `acquired_at`; `None` when out of range.
pub fn expires_at(acquired_at: DateTime<Utc>, ttl_hours: i64) -> Option<DateTime<Utc>> {
    Duration::try_hours(ttl_hours).and_then(|ttl| acquired_at.checked_add_signed(ttl))
}
