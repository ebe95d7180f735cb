//! Discreet → duration fold
//!
//! Folds one case's time-ordered discreet points into visit intervals. Each
//! merged point extends the running interval by exactly one quantum, so a
//! duration always equals `quantum × contributing points`.

use crate::error::ValidationError;
use crate::quantum::within_window;
use crate::types::{DiscreetPoint, DurationPoint};

/// Folder for turning sorted discreet points into duration points
pub struct DurationFolder;

impl DurationFolder {
    /// Fold time-sorted points of a single case.
    ///
    /// Points must already be sorted by time; [`crate::grouper::group_by_case`]
    /// produces suitable input. Fails when an interval grows past the
    /// representable time range.
    pub fn fold(
        points: &[&DiscreetPoint],
        quantum: i64,
    ) -> Result<Vec<DurationPoint>, ValidationError> {
        let mut durations = Vec::new();
        let mut iter = points.iter();

        let Some(first) = iter.next() else {
            return Ok(durations);
        };

        let current = iter.try_fold(
            seed(first, quantum),
            |mut current, point| -> Result<DurationPoint, ValidationError> {
                if folds_into(&current, point)? {
                    current.duration = current.duration.checked_add(quantum).ok_or(
                        ValidationError::WindowOutOfRange {
                            start: current.time,
                            minutes: current.duration,
                        },
                    )?;
                    current.discreet_point_ids.extend(point.id);
                    Ok(current)
                } else {
                    durations.push(current);
                    Ok(seed(point, quantum))
                }
            },
        )?;
        durations.push(current);

        Ok(durations)
    }
}

/// Start a one-quantum interval from a single point
fn seed(point: &DiscreetPoint, quantum: i64) -> DurationPoint {
    DurationPoint {
        case_id: point.case_id,
        latitude: point.latitude,
        longitude: point.longitude,
        time: point.time,
        duration: quantum,
        discreet_point_ids: point.id.into_iter().collect(),
        fields: point.fields.clone(),
    }
}

/// Same case, same exact location, and no gap past the current window
fn folds_into(current: &DurationPoint, point: &DiscreetPoint) -> Result<bool, ValidationError> {
    if point.case_id != current.case_id
        || !point.same_location(current.latitude, current.longitude)
    {
        return Ok(false);
    }
    within_window(point.time, current.time, current.duration)
}
