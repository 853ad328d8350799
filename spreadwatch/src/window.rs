//! Time-window classification in the fixed reporting timezone (GMT+8).
//!
//! The platform rate resets shortly after midnight, so the daily interval
//! 23:20-00:30 local time is treated as a "lock window" with stricter risk
//! sensitivity and a faster refresh cadence. 23:45-23:55 is the narrower
//! capture window used to snapshot the reference rate just before the reset.

use chrono::{DateTime, FixedOffset, NaiveDate, Timelike, Utc};
use std::time::Duration;

/// Reporting timezone offset: GMT+8.
pub const REPORTING_OFFSET_HOURS: i32 = 8;

/// Refresh cadence inside the lock window.
pub const LOCK_WINDOW_INTERVAL: Duration = Duration::from_secs(60);

/// Refresh cadence outside the lock window.
pub const NORMAL_INTERVAL: Duration = Duration::from_secs(300);

fn reporting_offset() -> FixedOffset {
    // 8 * 3600 seconds is always within chrono's valid offset range
    FixedOffset::east_opt(REPORTING_OFFSET_HOURS * 3600).expect("GMT+8 is a valid offset")
}

/// Convert an instant to the reporting timezone.
pub fn to_local(time: DateTime<Utc>) -> DateTime<FixedOffset> {
    time.with_timezone(&reporting_offset())
}

/// Calendar date of an instant in the reporting timezone.
pub fn local_date(time: DateTime<Utc>) -> NaiveDate {
    to_local(time).date_naive()
}

/// Whether the instant falls in the daily lock window, 23:20-00:30 local.
/// The window straddles midnight, so membership is the union of the late
/// slice of one day and the early slice of the next.
pub fn is_lock_window(time: DateTime<Utc>) -> bool {
    let local = to_local(time);
    let minute_of_day = local.hour() * 60 + local.minute();

    // 23:20 onwards, or up to and including 00:30
    minute_of_day >= 23 * 60 + 20 || minute_of_day <= 30
}

/// Whether the instant falls in the lock-capture window, 23:45-23:55 local
/// inclusive. Readings here snapshot the reference rate that the platform
/// will lock against.
pub fn is_lock_capture(time: DateTime<Utc>) -> bool {
    let local = to_local(time);
    let minute_of_day = local.hour() * 60 + local.minute();

    (23 * 60 + 45..=23 * 60 + 55).contains(&minute_of_day)
}

/// Refresh interval policy: fast cadence inside the lock window, slower
/// outside. Re-evaluated by the scheduler on its own one-minute tick so a
/// window transition changes the cadence promptly.
pub fn refresh_interval(time: DateTime<Utc>) -> Duration {
    if is_lock_window(time) {
        LOCK_WINDOW_INTERVAL
    } else {
        NORMAL_INTERVAL
    }
}
