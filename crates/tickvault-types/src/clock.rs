//! Millisecond timestamp helpers.

use chrono::{DateTime, NaiveDate, Utc};

/// Milliseconds in one UTC day.
pub const MS_PER_DAY: u64 = 86_400_000;

/// Returns the current wall-clock time as Unix milliseconds.
#[must_use]
pub fn now_ms() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
}

/// Returns the UTC calendar day a millisecond timestamp falls on.
#[must_use]
pub fn date_of_ms(timestamp_ms: u64) -> NaiveDate {
    let millis = i64::try_from(timestamp_ms).unwrap_or(i64::MAX);
    DateTime::from_timestamp_millis(millis)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
        .date_naive()
}

/// Returns the Unix milliseconds of 00:00:00 UTC on the given day.
///
/// Days before the epoch clamp to zero.
#[must_use]
pub fn day_start_ms(date: NaiveDate) -> u64 {
    let millis = date.and_time(chrono::NaiveTime::MIN).and_utc().timestamp_millis();
    u64::try_from(millis).unwrap_or(0)
}
