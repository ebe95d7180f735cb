//! Time-grid arithmetic shared by the fold, merge and expansion stages

use chrono::{DateTime, Duration, Utc};

use crate::error::ValidationError;

/// End of a window that starts at `start` and lasts `minutes`.
///
/// Fails instead of overflowing when the end is not representable.
pub fn window_end(start: DateTime<Utc>, minutes: i64) -> Result<DateTime<Utc>, ValidationError> {
    Duration::try_minutes(minutes)
        .and_then(|span| start.checked_add_signed(span))
        .ok_or(ValidationError::WindowOutOfRange { start, minutes })
}

/// True when `time` falls inside or exactly at the end of the window
pub fn within_window(
    time: DateTime<Utc>,
    start: DateTime<Utc>,
    minutes: i64,
) -> Result<bool, ValidationError> {
    Ok(time <= window_end(start, minutes)?)
}

/// Whole minutes between two instants (truncated toward zero)
pub fn minutes_between(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    (end - start).num_minutes()
}

/// Round a duration down to a multiple of the quantum, never below one quantum
pub fn round_to_quantum(minutes: i64, quantum: i64) -> i64 {
    let rounded = minutes - minutes.rem_euclid(quantum);
    rounded.max(quantum)
}

/// The `index`-th grid tick after `start`
pub fn tick(start: DateTime<Utc>, index: i64, quantum: i64) -> Result<DateTime<Utc>, ValidationError> {
    let minutes = index
        .checked_mul(quantum)
        .ok_or(ValidationError::WindowOutOfRange {
            start,
            minutes: i64::MAX,
        })?;
    window_end(start, minutes)
}
