//! Duration point expansion onto the discreet tick grid

use crate::error::ValidationError;
use crate::quantum::tick;
use crate::types::{DiscreetPoint, DurationPoint};

/// Expand one duration point into `duration / quantum` discreet ticks.
///
/// Ticks start at the interval start and are spaced one quantum apart. They
/// inherit case, location and descriptive fields, and carry no id since they
/// have not been persisted.
pub fn expand(point: &DurationPoint, quantum: i64) -> Result<Vec<DiscreetPoint>, ValidationError> {
    let ticks = point.duration / quantum;

    (0..ticks)
        .map(|i| {
            tick(point.time, i, quantum).map(|time| DiscreetPoint {
                id: None,
                case_id: point.case_id,
                latitude: point.latitude,
                longitude: point.longitude,
                time,
                fields: point.fields.clone(),
            })
        })
        .collect()
}
