//! Core types for concern point transforms
//!
//! This module defines the records that flow through both transform directions:
//! discreet points (single observations), duration points (visit intervals), the
//! descriptive field set they share, and the JSON envelopes used at the service
//! boundary. Field names serialize in camelCase to match the existing API.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::MAX_DURATION_MINUTES;
use crate::error::ValidationError;

/// Identifier of a persisted discreet point
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PointId(pub i64);

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a case (the isolation boundary for merging)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaseId(pub i64);

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Descriptive fields carried unchanged through both transforms
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(
        default,
        alias = "publish_date",
        skip_serializing_if = "Option::is_none",
        with = "timestamp::option"
    )]
    pub publish_date: Option<DateTime<Utc>>,
}

impl PointFields {
    /// Fields carrying only a nickname
    pub fn nickname(nickname: impl Into<String>) -> Self {
        Self {
            nickname: Some(nickname.into()),
            ..Default::default()
        }
    }

    /// True when no field is set
    pub fn is_empty(&self) -> bool {
        self.nickname.is_none() && self.hash.is_none() && self.publish_date.is_none()
    }

    /// Overwrite every field that is set in `other`
    pub fn overlay(&mut self, other: &PointFields) {
        if other.nickname.is_some() {
            self.nickname = other.nickname.clone();
        }
        if other.hash.is_some() {
            self.hash = other.hash.clone();
        }
        if other.publish_date.is_some() {
            self.publish_date = other.publish_date;
        }
    }

    /// Fill every field that is unset here from `other`
    pub fn fill_missing(&mut self, other: &PointFields) {
        if self.nickname.is_none() {
            self.nickname = other.nickname.clone();
        }
        if self.hash.is_none() {
            self.hash = other.hash.clone();
        }
        if self.publish_date.is_none() {
            self.publish_date = other.publish_date;
        }
    }
}

/// A single timestamped location observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscreetPoint {
    /// Store identifier (absent until persisted)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<PointId>,
    /// Owning case
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_id: Option<CaseId>,
    pub latitude: f64,
    pub longitude: f64,
    /// Observation instant (UTC, millisecond precision)
    #[serde(with = "timestamp")]
    pub time: DateTime<Utc>,
    #[serde(flatten)]
    pub fields: PointFields,
}

impl DiscreetPoint {
    /// Create an unpersisted point
    pub fn new(latitude: f64, longitude: f64, time: DateTime<Utc>) -> Self {
        Self {
            id: None,
            case_id: None,
            latitude,
            longitude,
            time,
            fields: PointFields::default(),
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(PointId(id));
        self
    }

    pub fn with_case(mut self, case_id: i64) -> Self {
        self.case_id = Some(CaseId(case_id));
        self
    }

    pub fn with_fields(mut self, fields: PointFields) -> Self {
        self.fields = fields;
        self
    }

    /// Exact coordinate equality (no geospatial tolerance)
    pub fn same_location(&self, latitude: f64, longitude: f64) -> bool {
        self.latitude == latitude && self.longitude == longitude
    }

    /// Validate coordinates and time
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_coordinates(self.latitude, self.longitude)?;
        validate_time(self.time)
    }

    /// Validate a point that must already be persisted and assigned to a case
    pub fn validate_persisted(&self) -> Result<(), ValidationError> {
        self.validate()?;
        if self.id.is_none() {
            return Err(ValidationError::MissingField("id"));
        }
        if self.case_id.is_none() {
            return Err(ValidationError::MissingField("caseId"));
        }
        Ok(())
    }
}

/// An aggregated visit interval derived from one or more discreet points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DurationPoint {
    /// Owning case
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_id: Option<CaseId>,
    pub latitude: f64,
    pub longitude: f64,
    /// Interval start (UTC)
    #[serde(with = "timestamp")]
    pub time: DateTime<Utc>,
    /// Interval length in minutes
    pub duration: i64,
    /// Ids of the discreet points this interval was built from, in time order
    #[serde(default)]
    pub discreet_point_ids: Vec<PointId>,
    #[serde(flatten)]
    pub fields: PointFields,
}

impl DurationPoint {
    pub fn new(latitude: f64, longitude: f64, time: DateTime<Utc>, duration: i64) -> Self {
        Self {
            case_id: None,
            latitude,
            longitude,
            time,
            duration,
            discreet_point_ids: Vec::new(),
            fields: PointFields::default(),
        }
    }

    pub fn with_case(mut self, case_id: i64) -> Self {
        self.case_id = Some(CaseId(case_id));
        self
    }

    pub fn with_fields(mut self, fields: PointFields) -> Self {
        self.fields = fields;
        self
    }

    /// Exact coordinate equality (no geospatial tolerance)
    pub fn same_location(&self, latitude: f64, longitude: f64) -> bool {
        self.latitude == latitude && self.longitude == longitude
    }

    /// Validate coordinates, time and duration
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_coordinates(self.latitude, self.longitude)?;
        validate_time(self.time)?;
        if !(1..=MAX_DURATION_MINUTES).contains(&self.duration) {
            return Err(ValidationError::InvalidDuration(self.duration));
        }
        Ok(())
    }
}

fn validate_coordinates(latitude: f64, longitude: f64) -> Result<(), ValidationError> {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(ValidationError::InvalidLatitude(latitude));
    }
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(ValidationError::InvalidLongitude(longitude));
    }
    Ok(())
}

// RFC 3339 only has four-digit years
fn validate_time(time: DateTime<Utc>) -> Result<(), ValidationError> {
    if !(0..=9999).contains(&time.year()) {
        return Err(ValidationError::TimeOutOfRange(time));
    }
    Ok(())
}

/// `{"concernPoint": ...}` response envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcernPoint {
    pub concern_point: DurationPoint,
}

/// `{"concernPoints": [...]}` response envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcernPoints {
    pub concern_points: Vec<DurationPoint>,
}

/// Wire format for instants: RFC 3339 text or integer epoch milliseconds in,
/// RFC 3339 UTC with millisecond precision out.
pub(crate) mod timestamp {
    use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Wire {
        Millis(i64),
        Text(String),
    }

    fn from_wire<E: de::Error>(wire: Wire) -> Result<DateTime<Utc>, E> {
        match wire {
            Wire::Millis(ms) => Utc
                .timestamp_millis_opt(ms)
                .single()
                .ok_or_else(|| E::custom(format!("timestamp out of range: {ms}"))),
            Wire::Text(text) => DateTime::parse_from_rfc3339(&text)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| E::custom(format!("invalid time {text:?}: {e}"))),
        }
    }

    pub fn serialize<S: Serializer>(time: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        from_wire(Wire::deserialize(deserializer)?)
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            time: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match time {
                Some(t) => serializer.serialize_some(&t.to_rfc3339_opts(SecondsFormat::Millis, true)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            Option::<Wire>::deserialize(deserializer)?
                .map(from_wire)
                .transpose()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_deserialize_discreet_point() {
        let json = r#"{
            "id": 7,
            "caseId": 3,
            "latitude": 10.0,
            "longitude": 20.0,
            "time": "2020-05-01T18:25:43.511Z",
            "nickname": "home",
            "publish_date": "2020-05-02T00:00:00Z"
        }"#;

        let point: DiscreetPoint = serde_json::from_str(json).unwrap();
        assert_eq!(point.id, Some(PointId(7)));
        assert_eq!(point.case_id, Some(CaseId(3)));
        assert_eq!(point.time.timestamp_millis(), 1_588_357_543_511);
        assert_eq!(point.fields.nickname.as_deref(), Some("home"));
        assert!(point.fields.publish_date.is_some());
        assert!(point.fields.hash.is_none());
    }

    #[test]
    fn test_time_accepts_epoch_millis() {
        let json = r#"{"latitude": 1.0, "longitude": 2.0, "time": 1588357543511}"#;
        let point: DiscreetPoint = serde_json::from_str(json).unwrap();
        assert_eq!(
            point.time,
            Utc.timestamp_millis_opt(1_588_357_543_511).unwrap()
        );
    }

    #[test]
    fn test_missing_time_is_rejected() {
        let json = r#"{"latitude": 1.0, "longitude": 2.0}"#;
        let err = serde_json::from_str::<DiscreetPoint>(json).unwrap_err();
        assert!(err.to_string().contains("time"));
    }

    #[test]
    fn test_missing_duration_is_rejected() {
        let json = r#"{"latitude": 1.0, "longitude": 2.0, "time": "2020-05-01T00:00:00Z"}"#;
        assert!(serde_json::from_str::<DurationPoint>(json).is_err());
    }

    #[test]
    fn test_serialize_duration_point_camel_case() {
        let time = Utc.with_ymd_and_hms(2020, 5, 1, 18, 25, 0).unwrap();
        let mut point = DurationPoint::new(10.0, 20.0, time, 15).with_case(1);
        point.discreet_point_ids = vec![PointId(1), PointId(2), PointId(3)];

        let value = serde_json::to_value(&point).unwrap();
        assert_eq!(value["caseId"], 1);
        assert_eq!(value["time"], "2020-05-01T18:25:00.000Z");
        assert_eq!(value["discreetPointIds"], serde_json::json!([1, 2, 3]));
        assert!(value.get("nickname").is_none());
    }

    #[test]
    fn test_coordinate_validation() {
        let time = Utc::now();
        assert!(DiscreetPoint::new(0.0, 0.0, time).validate().is_ok());
        assert_eq!(
            DiscreetPoint::new(91.0, 0.0, time).validate(),
            Err(ValidationError::InvalidLatitude(91.0))
        );
        assert!(matches!(
            DiscreetPoint::new(0.0, f64::NAN, time).validate(),
            Err(ValidationError::InvalidLongitude(_))
        ));
    }

    #[test]
    fn test_persisted_validation_requires_id_and_case() {
        let time = Utc::now();
        let point = DiscreetPoint::new(1.0, 1.0, time).with_case(1);
        assert_eq!(
            point.validate_persisted(),
            Err(ValidationError::MissingField("id"))
        );

        let point = DiscreetPoint::new(1.0, 1.0, time).with_id(4);
        assert_eq!(
            point.validate_persisted(),
            Err(ValidationError::MissingField("caseId"))
        );
    }

    #[test]
    fn test_duration_validation() {
        let time = Utc::now();
        assert!(DurationPoint::new(1.0, 1.0, time, 5).validate().is_ok());
        assert_eq!(
            DurationPoint::new(1.0, 1.0, time, 0).validate(),
            Err(ValidationError::InvalidDuration(0))
        );
    }

    #[test]
    fn test_duration_upper_bound() {
        let time = Utc.with_ymd_and_hms(2020, 5, 1, 0, 0, 0).unwrap();
        assert!(DurationPoint::new(1.0, 1.0, time, MAX_DURATION_MINUTES)
            .validate()
            .is_ok());
        assert_eq!(
            DurationPoint::new(1.0, 1.0, time, MAX_DURATION_MINUTES + 1).validate(),
            Err(ValidationError::InvalidDuration(MAX_DURATION_MINUTES + 1))
        );
        assert_eq!(
            DurationPoint::new(1.0, 1.0, time, i64::MAX).validate(),
            Err(ValidationError::InvalidDuration(i64::MAX))
        );
    }

    #[test]
    fn test_time_outside_four_digit_years() {
        let late = DateTime::<Utc>::MAX_UTC;
        assert_eq!(
            DiscreetPoint::new(1.0, 1.0, late).validate(),
            Err(ValidationError::TimeOutOfRange(late))
        );

        let early = Utc.with_ymd_and_hms(-1, 12, 31, 0, 0, 0).unwrap();
        assert_eq!(
            DurationPoint::new(1.0, 1.0, early, 5).validate(),
            Err(ValidationError::TimeOutOfRange(early))
        );

        let last = Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59).unwrap();
        assert!(DiscreetPoint::new(1.0, 1.0, last).validate().is_ok());
    }

    #[test]
    fn test_field_overlay_and_fill() {
        let mut fields = PointFields::nickname("a");
        fields.overlay(&PointFields {
            hash: Some("h".to_string()),
            ..Default::default()
        });
        assert_eq!(fields.nickname.as_deref(), Some("a"));
        assert_eq!(fields.hash.as_deref(), Some("h"));

        fields.fill_missing(&PointFields::nickname("b"));
        assert_eq!(fields.nickname.as_deref(), Some("a"));

        fields.overlay(&PointFields::nickname("b"));
        assert_eq!(fields.nickname.as_deref(), Some("b"));
    }

    #[test]
    fn test_envelope_names() {
        let envelope = ConcernPoints {
            concern_points: Vec::new(),
        };
        let json = serde_json::to_string(&envelope).unwrap();
        assert_eq!(json, r#"{"concernPoints":[]}"#);
    }
}
