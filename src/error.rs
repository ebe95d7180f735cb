//! Error types for the concern point transform

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::PointId;

/// Errors that can occur during computation
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Invalid point at index {index}: {source}")]
    Validation {
        index: usize,
        #[source]
        source: ValidationError,
    },

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Interval out of range: {0}")]
    Interval(#[source] ValidationError),

    #[error("Point store error: {0}")]
    Store(#[from] StoreError),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}

impl ComputeError {
    pub(crate) fn at(index: usize, source: ValidationError) -> Self {
        ComputeError::Validation { index, source }
    }
}

/// Field-level validation failures on a single point
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Latitude is not valid: {0}")]
    InvalidLatitude(f64),

    #[error("Longitude is not valid: {0}")]
    InvalidLongitude(f64),

    #[error("Duration must be between 1 and {} minutes, got {0}", crate::config::MAX_DURATION_MINUTES)]
    InvalidDuration(i64),

    #[error("Time is outside years 0000-9999: {0}")]
    TimeOutOfRange(DateTime<Utc>),

    #[error("Window of {minutes} minutes from {start} is out of range")]
    WindowOutOfRange { start: DateTime<Utc>, minutes: i64 },

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Quantum must be between 1 and {} minutes, got {0}", crate::config::MAX_QUANTUM_MINUTES)]
    InvalidQuantum(i64),
}

/// Failures reported by a point store collaborator
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Points not found: {0:?}")]
    NotFound(Vec<PointId>),

    #[error("Store backend failure: {0}")]
    Backend(String),
}
