//! Transform configuration
//!
//! Both transform directions run on a fixed time grid (the quantum) and the
//! duration merge resolves conflicting descriptive fields through a policy.
//! The defaults reproduce the behavior of the existing service: a 5 minute
//! quantum with last-write-wins field resolution.

use serde::{Deserialize, Serialize};

use crate::error::{ComputeError, ValidationError};
use crate::types::PointFields;

/// Default quantum in minutes
pub const DEFAULT_QUANTUM_MINUTES: i64 = 5;

/// Largest accepted quantum (one day)
pub const MAX_QUANTUM_MINUTES: i64 = 24 * 60;

/// Longest accepted duration point (one leap year)
pub const MAX_DURATION_MINUTES: i64 = 366 * 24 * 60;

/// How descriptive fields (nickname, hash, publish date) are resolved when two
/// duration intervals merge.
///
/// `LastWriteWins` is the documented default: a field set on the
/// later-processed interval replaces the earlier value. Callers that want the
/// earliest annotation to survive can opt into `FirstWriteWins`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldConflictPolicy {
    #[default]
    LastWriteWins,
    FirstWriteWins,
}

impl FieldConflictPolicy {
    /// Resolve `later` into `current` according to the policy
    pub fn resolve(self, current: &mut PointFields, later: &PointFields) {
        match self {
            FieldConflictPolicy::LastWriteWins => current.overlay(later),
            FieldConflictPolicy::FirstWriteWins => current.fill_missing(later),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldConflictPolicy::LastWriteWins => "last_write_wins",
            FieldConflictPolicy::FirstWriteWins => "first_write_wins",
        }
    }
}

/// Configuration shared by both transform directions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    /// Grid spacing and duration granularity, in minutes
    pub quantum_minutes: i64,
    /// Field resolution when duration intervals merge
    pub field_policy: FieldConflictPolicy,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            quantum_minutes: DEFAULT_QUANTUM_MINUTES,
            field_policy: FieldConflictPolicy::default(),
        }
    }
}

impl TransformConfig {
    pub fn with_policy(mut self, field_policy: FieldConflictPolicy) -> Self {
        self.field_policy = field_policy;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(1..=MAX_QUANTUM_MINUTES).contains(&self.quantum_minutes) {
            return Err(ValidationError::InvalidQuantum(self.quantum_minutes));
        }
        Ok(())
    }

    /// Load and validate configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let config: TransformConfig = serde_json::from_str(json)?;
        config
            .validate()
            .map_err(|e| ComputeError::InvalidConfig(e.to_string()))?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ComputeError> {
        serde_json::to_string_pretty(self).map_err(|e| ComputeError::EncodingError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TransformConfig::default();
        assert_eq!(config.quantum_minutes, 5);
        assert_eq!(config.field_policy, FieldConflictPolicy::LastWriteWins);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = TransformConfig::from_json(r#"{"field_policy": "first_write_wins"}"#).unwrap();
        assert_eq!(config.quantum_minutes, 5);
        assert_eq!(config.field_policy, FieldConflictPolicy::FirstWriteWins);
    }

    #[test]
    fn test_rejects_non_positive_quantum() {
        let result = TransformConfig::from_json(r#"{"quantum_minutes": 0}"#);
        assert!(matches!(result, Err(ComputeError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_quantum_above_one_day() {
        let result = TransformConfig::from_json(r#"{"quantum_minutes": 1441}"#);
        assert!(matches!(result, Err(ComputeError::InvalidConfig(_))));

        let config = TransformConfig {
            quantum_minutes: i64::MAX,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidQuantum(i64::MAX)));
    }

    #[test]
    fn test_config_json_roundtrip() {
        let config = TransformConfig::default().with_policy(FieldConflictPolicy::FirstWriteWins);
        let restored = TransformConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(restored, config);
    }

    #[test]
    fn test_policy_resolution() {
        let mut current = PointFields::nickname("first");
        FieldConflictPolicy::FirstWriteWins.resolve(&mut current, &PointFields::nickname("second"));
        assert_eq!(current.nickname.as_deref(), Some("first"));

        FieldConflictPolicy::LastWriteWins.resolve(&mut current, &PointFields::nickname("second"));
        assert_eq!(current.nickname.as_deref(), Some("second"));

        FieldConflictPolicy::LastWriteWins.resolve(&mut current, &PointFields::default());
        assert_eq!(current.nickname.as_deref(), Some("second"));
    }
}
