//! Duration interval merge
//!
//! Merges overlapping or touching duration points that share a case and an
//! exact location, then quantizes each merged duration onto the grid.
//! Intervals at different locations are never merged, even when their times
//! overlap.

use crate::config::{FieldConflictPolicy, TransformConfig};
use crate::error::ValidationError;
use crate::quantum::{minutes_between, round_to_quantum, window_end, within_window};
use crate::types::DurationPoint;

/// Interval merger for duration points
pub struct IntervalMerger {
    quantum: i64,
    policy: FieldConflictPolicy,
}

impl IntervalMerger {
    pub fn new(config: &TransformConfig) -> Self {
        Self {
            quantum: config.quantum_minutes,
            policy: config.field_policy,
        }
    }

    /// Sort, merge and round. The output is a fixed point of this function.
    pub fn merge(&self, points: &[DurationPoint]) -> Result<Vec<DurationPoint>, ValidationError> {
        let mut sorted: Vec<&DurationPoint> = points.iter().collect();
        sorted.sort_by_key(|p| p.time);

        let mut merged = self.merge_sorted(&sorted)?;
        for point in &mut merged {
            point.duration = round_to_quantum(point.duration, self.quantum);
        }
        Ok(merged)
    }

    /// Greedy merge of time-sorted intervals, without rounding
    pub fn merge_sorted(
        &self,
        sorted: &[&DurationPoint],
    ) -> Result<Vec<DurationPoint>, ValidationError> {
        let mut merged: Vec<DurationPoint> = Vec::new();
        let mut iter = sorted.iter();

        let Some(first) = iter.next() else {
            return Ok(merged);
        };

        let current = iter.try_fold(
            (*first).clone(),
            |current, next| -> Result<DurationPoint, ValidationError> {
                if overlaps(&current, next)? {
                    self.absorb(current, next)
                } else {
                    merged.push(current);
                    Ok((*next).clone())
                }
            },
        )?;
        merged.push(current);

        Ok(merged)
    }

    fn absorb(
        &self,
        mut current: DurationPoint,
        next: &DurationPoint,
    ) -> Result<DurationPoint, ValidationError> {
        let start = current.time.min(next.time);
        let end = window_end(current.time, current.duration)?
            .max(window_end(next.time, next.duration)?);

        current.time = start;
        current.duration = minutes_between(start, end);
        for id in &next.discreet_point_ids {
            if !current.discreet_point_ids.contains(id) {
                current.discreet_point_ids.push(*id);
            }
        }
        self.policy.resolve(&mut current.fields, &next.fields);
        Ok(current)
    }
}

/// Same case, same exact location, and `next` starts no later than `current` ends
fn overlaps(current: &DurationPoint, next: &DurationPoint) -> Result<bool, ValidationError> {
    if next.case_id != current.case_id
        || !next.same_location(current.latitude, current.longitude)
    {
        return Ok(false);
    }
    within_window(next.time, current.time, current.duration)
}
