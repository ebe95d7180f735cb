//! Pipeline orchestration
//!
//! This module provides the public transform API. Both directions are pure:
//! they validate their input, never touch persistence, and return new values.
//!
//! - discreet → duration: validate → group by case → sort → fold
//! - duration → discreet: validate → sort → merge → round → expand

use tracing::{debug, trace};

use crate::config::TransformConfig;
use crate::error::ComputeError;
use crate::expander::expand;
use crate::fold::DurationFolder;
use crate::grouper::group_by_case;
use crate::merge::IntervalMerger;
use crate::types::{DiscreetPoint, DurationPoint};

/// Convert persisted discreet points into duration points.
///
/// Points may belong to several cases; they are never merged across cases.
/// Every input point must carry an `id` and a `caseId`.
///
/// # Example
/// ```ignore
/// let durations = discreet_to_duration(&points)?;
/// ```
pub fn discreet_to_duration(points: &[DiscreetPoint]) -> Result<Vec<DurationPoint>, ComputeError> {
    PointTransformer::new().discreet_to_duration(points)
}

/// Merge duration points and expand them into discreet ticks.
///
/// # Example
/// ```ignore
/// let ticks = duration_to_discreet(&durations)?;
/// ```
pub fn duration_to_discreet(points: &[DurationPoint]) -> Result<Vec<DiscreetPoint>, ComputeError> {
    PointTransformer::new().duration_to_discreet(points)
}

/// Convert a JSON array of discreet points into a JSON array of duration points.
pub fn discreet_to_duration_json(raw_json: String) -> Result<String, ComputeError> {
    PointTransformer::new().discreet_to_duration_json(&raw_json)
}

/// Convert a JSON array of duration points into a JSON array of discreet points.
pub fn duration_to_discreet_json(raw_json: String) -> Result<String, ComputeError> {
    PointTransformer::new().duration_to_discreet_json(&raw_json)
}

/// Configured transformer.
///
/// Holds no state besides its configuration, so one instance can be shared
/// freely between threads.
#[derive(Debug, Clone, Default)]
pub struct PointTransformer {
    config: TransformConfig,
}

impl PointTransformer {
    /// Create a transformer with the default 5 minute quantum
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transformer with a validated configuration
    pub fn with_config(config: TransformConfig) -> Result<Self, ComputeError> {
        config
            .validate()
            .map_err(|e| ComputeError::InvalidConfig(e.to_string()))?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TransformConfig {
        &self.config
    }

    /// Group, sort and fold discreet points into duration points
    pub fn discreet_to_duration(
        &self,
        points: &[DiscreetPoint],
    ) -> Result<Vec<DurationPoint>, ComputeError> {
        for (index, point) in points.iter().enumerate() {
            point
                .validate_persisted()
                .map_err(|e| ComputeError::at(index, e))?;
        }

        let groups = group_by_case(points);
        let mut durations = Vec::new();

        for group in groups {
            let folded = DurationFolder::fold(&group.points, self.config.quantum_minutes)
                .map_err(ComputeError::Interval)?;
            trace!(
                case_id = ?group.case_id,
                points = group.points.len(),
                durations = folded.len(),
                "folded case"
            );
            durations.extend(folded);
        }

        debug!(
            points = points.len(),
            durations = durations.len(),
            "discreet to duration"
        );
        Ok(durations)
    }

    /// Merge overlapping duration points and round them onto the grid,
    /// without expanding.
    ///
    /// `discreet_point_ids` are carried over from the input, so intervals
    /// supplied without ids (new edits not yet persisted) come back with an
    /// empty list. Only [`Self::discreet_to_duration`] guarantees populated
    /// ids.
    pub fn merge_durations(
        &self,
        points: &[DurationPoint],
    ) -> Result<Vec<DurationPoint>, ComputeError> {
        validate_durations(points)?;
        IntervalMerger::new(&self.config)
            .merge(points)
            .map_err(ComputeError::Interval)
    }

    /// Merge, round and expand duration points into discreet ticks
    pub fn duration_to_discreet(
        &self,
        points: &[DurationPoint],
    ) -> Result<Vec<DiscreetPoint>, ComputeError> {
        let merged = self.merge_durations(points)?;
        let quantum = self.config.quantum_minutes;

        let mut ticks: Vec<DiscreetPoint> = Vec::new();
        for point in &merged {
            ticks.extend(expand(point, quantum).map_err(ComputeError::Interval)?);
        }

        debug!(
            durations = points.len(),
            merged = merged.len(),
            ticks = ticks.len(),
            "duration to discreet"
        );
        Ok(ticks)
    }

    pub fn discreet_to_duration_json(&self, raw_json: &str) -> Result<String, ComputeError> {
        let points: Vec<DiscreetPoint> = serde_json::from_str(raw_json)?;
        let durations = self.discreet_to_duration(&points)?;
        Ok(serde_json::to_string(&durations)?)
    }

    pub fn duration_to_discreet_json(&self, raw_json: &str) -> Result<String, ComputeError> {
        let points: Vec<DurationPoint> = serde_json::from_str(raw_json)?;
        let ticks = self.duration_to_discreet(&points)?;
        Ok(serde_json::to_string(&ticks)?)
    }
}

fn validate_durations(points: &[DurationPoint]) -> Result<(), ComputeError> {
    for (index, point) in points.iter().enumerate() {
        point.validate().map_err(|e| ComputeError::at(index, e))?;
    }
    Ok(())
}
