//! Duration point service
//!
//! Investigators read and edit duration points while the store only holds
//! discreet points. This service bridges the two: reads fold stored points
//! into durations, writes expand an edited duration back into ticks and
//! persist them.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::error::{ComputeError, StoreError, ValidationError};
use crate::pipeline::PointTransformer;
use crate::store::PointStore;
use crate::types::{CaseId, DiscreetPoint, DurationPoint, PointFields, PointId};

/// Duration-oriented operations over a [`PointStore`]
pub struct DurationService<S> {
    store: S,
    transformer: PointTransformer,
}

impl<S: PointStore> DurationService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            transformer: PointTransformer::new(),
        }
    }

    pub fn with_transformer(store: S, transformer: PointTransformer) -> Self {
        Self { store, transformer }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Duration points for one case
    pub fn fetch_case_points(&self, case_id: CaseId) -> Result<Vec<DurationPoint>, ComputeError> {
        let points = self.store.fetch_points_by_case(case_id)?;
        self.transformer.discreet_to_duration(&points)
    }

    /// Duration points for several cases, never merged across cases
    pub fn fetch_cases_points(
        &self,
        case_ids: &[CaseId],
    ) -> Result<Vec<DurationPoint>, ComputeError> {
        if case_ids.is_empty() {
            return Ok(Vec::new());
        }
        let points = self.store.fetch_points_by_cases(case_ids)?;
        self.transformer.discreet_to_duration(&points)
    }

    /// Expand a new duration point into ticks, persist them under the case and
    /// return the stored interval
    pub fn create_point(
        &self,
        case_id: CaseId,
        point: &DurationPoint,
    ) -> Result<DurationPoint, ComputeError> {
        point.validate().map_err(|e| ComputeError::at(0, e))?;

        let created = self.persist_expanded(case_id, point)?;
        info!(%case_id, ticks = created.len(), "created concern point");
        self.single_duration(&created)
    }

    /// Replace the ticks behind an edited duration point.
    ///
    /// Only the location, time, duration and nickname of the edit are carried
    /// into the new ticks. Every id in `discreet_point_ids` must belong to the
    /// edit's case; otherwise nothing is deleted.
    pub fn update_point(&self, point: &DurationPoint) -> Result<DurationPoint, ComputeError> {
        if point.discreet_point_ids.is_empty() {
            return Err(ComputeError::at(0, ValidationError::MissingField("discreetPointIds")));
        }
        let case_id = point
            .case_id
            .ok_or_else(|| ComputeError::at(0, ValidationError::MissingField("caseId")))?;
        point.validate().map_err(|e| ComputeError::at(0, e))?;

        let edit = DurationPoint {
            case_id: Some(case_id),
            latitude: point.latitude,
            longitude: point.longitude,
            time: point.time,
            duration: point.duration,
            discreet_point_ids: Vec::new(),
            fields: PointFields {
                nickname: point.fields.nickname.clone(),
                ..Default::default()
            },
        };

        let owned: HashSet<PointId> = self
            .store
            .fetch_points_by_case(case_id)?
            .iter()
            .filter_map(|p| p.id)
            .collect();
        let foreign: Vec<PointId> = point
            .discreet_point_ids
            .iter()
            .filter(|id| !owned.contains(*id))
            .copied()
            .collect();
        if !foreign.is_empty() {
            warn!(%case_id, ?foreign, "edit references points outside its case");
            return Err(StoreError::NotFound(foreign).into());
        }

        // TODO: run delete and create in one store transaction once PointStore exposes one
        let removed = self.store.delete_by_ids(&point.discreet_point_ids)?;
        let created = self.persist_expanded(case_id, &edit)?;
        info!(%case_id, removed, ticks = created.len(), "updated concern point");
        self.single_duration(&created)
    }

    /// Set a nickname on stored points and return them as duration points
    pub fn update_points_nickname(
        &self,
        ids: &[PointId],
        nickname: &str,
    ) -> Result<Vec<DurationPoint>, ComputeError> {
        let updated = self
            .store
            .update_fields(ids, &PointFields::nickname(nickname))?;
        self.transformer.discreet_to_duration(&updated)
    }

    /// Delete stored points; an empty list is a no-op
    pub fn delete_points(&self, ids: &[PointId]) -> Result<usize, ComputeError> {
        if ids.is_empty() {
            return Ok(0);
        }
        Ok(self.store.delete_by_ids(ids)?)
    }

    fn persist_expanded(
        &self,
        case_id: CaseId,
        point: &DurationPoint,
    ) -> Result<Vec<DiscreetPoint>, ComputeError> {
        let ticks = self
            .transformer
            .duration_to_discreet(std::slice::from_ref(point))?;
        debug!(%case_id, ticks = ticks.len(), "persisting expanded ticks");
        Ok(self.store.create_points(case_id, ticks)?)
    }

    fn single_duration(&self, created: &[DiscreetPoint]) -> Result<DurationPoint, ComputeError> {
        self.transformer
            .discreet_to_duration(created)?
            .into_iter()
            .next()
            .ok_or_else(|| ComputeError::EncodingError("no points were persisted".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 5, 1, 18, 25, 43).unwrap() + Duration::milliseconds(511)
    }

    fn service() -> DurationService<MemoryStore> {
        DurationService::new(MemoryStore::new())
    }

    #[test]
    fn test_create_point_round_trips() {
        let service = service();
        let input = DurationPoint::new(10.0, 20.0, t0(), 15)
            .with_fields(PointFields::nickname("grocery"));

        let created = service.create_point(CaseId(1), &input).unwrap();

        assert_eq!(created.case_id, Some(CaseId(1)));
        assert_eq!(created.time, t0());
        assert_eq!(created.duration, 15);
        assert_eq!(created.discreet_point_ids.len(), 3);
        assert_eq!(created.fields.nickname.as_deref(), Some("grocery"));
        assert_eq!(service.store().len(), 3);
    }

    #[test]
    fn test_create_point_rejects_bad_coordinates() {
        let service = service();
        let input = DurationPoint::new(120.0, 20.0, t0(), 5);
        assert!(service.create_point(CaseId(1), &input).is_err());
        assert!(service.store().is_empty());
    }

    #[test]
    fn test_update_point_replaces_ticks() {
        let service = service();
        let created = service
            .create_point(CaseId(1), &DurationPoint::new(10.0, 20.0, t0(), 5))
            .unwrap();

        let mut edit = created.clone();
        edit.time = t0() + Duration::days(20);
        edit.duration = 10;
        edit.fields.hash = Some("dropped".to_string());

        let updated = service.update_point(&edit).unwrap();
        assert_eq!(updated.duration, 10);
        assert_eq!(updated.time, edit.time);
        assert_eq!(updated.discreet_point_ids.len(), 2);
        assert!(updated.fields.hash.is_none());
        assert_eq!(service.store().len(), 2);
        assert!(updated
            .discreet_point_ids
            .iter()
            .all(|id| !created.discreet_point_ids.contains(id)));
    }

    #[test]
    fn test_update_point_requires_ids_and_case() {
        let service = service();
        let point = DurationPoint::new(10.0, 20.0, t0(), 5).with_case(1);
        assert!(matches!(
            service.update_point(&point),
            Err(ComputeError::Validation {
                source: ValidationError::MissingField("discreetPointIds"),
                ..
            })
        ));

        let mut point = DurationPoint::new(10.0, 20.0, t0(), 5);
        point.discreet_point_ids = vec![PointId(1)];
        assert!(matches!(
            service.update_point(&point),
            Err(ComputeError::Validation {
                source: ValidationError::MissingField("caseId"),
                ..
            })
        ));
    }

    #[test]
    fn test_update_point_cannot_touch_other_cases() {
        let service = service();
        let mine = service
            .create_point(CaseId(1), &DurationPoint::new(10.0, 20.0, t0(), 5))
            .unwrap();
        let theirs = service
            .create_point(CaseId(2), &DurationPoint::new(30.0, 40.0, t0(), 10))
            .unwrap();

        let mut edit = mine.clone();
        edit.discreet_point_ids.extend(theirs.discreet_point_ids.iter().copied());

        let result = service.update_point(&edit);
        assert!(matches!(
            result,
            Err(ComputeError::Store(StoreError::NotFound(ref ids))) if *ids == theirs.discreet_point_ids
        ));
        assert_eq!(service.store().len(), 3);
        assert_eq!(service.fetch_case_points(CaseId(2)).unwrap(), vec![theirs]);
        assert_eq!(service.fetch_case_points(CaseId(1)).unwrap(), vec![mine]);
    }

    #[test]
    fn test_fetch_cases_points_keeps_cases_apart() {
        let service = service();
        for case_id in [1, 2, 3] {
            service
                .create_point(CaseId(case_id), &DurationPoint::new(10.0, 20.0, t0(), 30))
                .unwrap();
        }

        let points = service
            .fetch_cases_points(&[CaseId(1), CaseId(2), CaseId(3)])
            .unwrap();
        assert_eq!(points.len(), 3);
        assert!(points.iter().all(|p| p.duration == 30));

        assert_eq!(service.fetch_case_points(CaseId(2)).unwrap().len(), 1);
        assert!(service.fetch_cases_points(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_update_points_nickname() {
        let service = service();
        let created = service
            .create_point(CaseId(1), &DurationPoint::new(10.0, 20.0, t0(), 10))
            .unwrap();

        let updated = service
            .update_points_nickname(&created.discreet_point_ids, "redacted")
            .unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].fields.nickname.as_deref(), Some("redacted"));
        assert_eq!(updated[0].duration, 10);
    }

    #[test]
    fn test_delete_points() {
        let service = service();
        let created = service
            .create_point(CaseId(1), &DurationPoint::new(10.0, 20.0, t0(), 10))
            .unwrap();

        assert_eq!(service.delete_points(&[]).unwrap(), 0);
        assert_eq!(service.delete_points(&created.discreet_point_ids).unwrap(), 2);
        assert!(service.fetch_case_points(CaseId(1)).unwrap().is_empty());
    }
}
