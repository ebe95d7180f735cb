//! Point store collaborator
//!
//! Discreet points are the persisted form; duration points are always derived
//! on the way out. [`PointStore`] is the seam to whatever database the
//! surrounding service uses, and [`MemoryStore`] is an in-process
//! implementation for tests, the CLI, and embedders without a database.

use std::collections::BTreeMap;
use std::sync::RwLock;

use tracing::debug;

use crate::error::StoreError;
use crate::types::{CaseId, DiscreetPoint, PointFields, PointId};

/// Storage operations the duration service depends on
pub trait PointStore {
    /// All points of one case
    fn fetch_points_by_case(&self, case_id: CaseId) -> Result<Vec<DiscreetPoint>, StoreError>;

    /// All points of several cases
    fn fetch_points_by_cases(&self, case_ids: &[CaseId]) -> Result<Vec<DiscreetPoint>, StoreError>;

    /// Persist new points under a case, returning them with ids assigned
    fn create_points(
        &self,
        case_id: CaseId,
        points: Vec<DiscreetPoint>,
    ) -> Result<Vec<DiscreetPoint>, StoreError>;

    /// Delete points by id, returning how many were removed
    fn delete_by_ids(&self, ids: &[PointId]) -> Result<usize, StoreError>;

    /// Overwrite the set descriptive fields on the given points and return them
    fn update_fields(
        &self,
        ids: &[PointId],
        fields: &PointFields,
    ) -> Result<Vec<DiscreetPoint>, StoreError>;
}

/// In-memory point store.
///
/// Ids are assigned from a monotonically increasing counter, so iteration in
/// id order is insertion order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    next_id: i64,
    points: BTreeMap<PointId, DiscreetPoint>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored points
    pub fn len(&self) -> usize {
        self.inner.read().map(|inner| inner.points.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, MemoryInner>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, MemoryInner>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
    }
}

impl PointStore for MemoryStore {
    fn fetch_points_by_case(&self, case_id: CaseId) -> Result<Vec<DiscreetPoint>, StoreError> {
        self.fetch_points_by_cases(&[case_id])
    }

    fn fetch_points_by_cases(&self, case_ids: &[CaseId]) -> Result<Vec<DiscreetPoint>, StoreError> {
        let inner = self.read()?;
        Ok(inner
            .points
            .values()
            .filter(|p| p.case_id.is_some_and(|c| case_ids.contains(&c)))
            .cloned()
            .collect())
    }

    fn create_points(
        &self,
        case_id: CaseId,
        points: Vec<DiscreetPoint>,
    ) -> Result<Vec<DiscreetPoint>, StoreError> {
        let mut inner = self.write()?;
        let mut created = Vec::with_capacity(points.len());

        for mut point in points {
            inner.next_id += 1;
            let id = PointId(inner.next_id);
            point.id = Some(id);
            point.case_id = Some(case_id);
            inner.points.insert(id, point.clone());
            created.push(point);
        }

        debug!(%case_id, created = created.len(), "created points");
        Ok(created)
    }

    fn delete_by_ids(&self, ids: &[PointId]) -> Result<usize, StoreError> {
        let mut inner = self.write()?;
        let removed = ids
            .iter()
            .filter(|id| inner.points.remove(*id).is_some())
            .count();

        debug!(requested = ids.len(), removed, "deleted points");
        Ok(removed)
    }

    fn update_fields(
        &self,
        ids: &[PointId],
        fields: &PointFields,
    ) -> Result<Vec<DiscreetPoint>, StoreError> {
        let mut inner = self.write()?;

        let missing: Vec<PointId> = ids
            .iter()
            .filter(|id| !inner.points.contains_key(*id))
            .copied()
            .collect();
        if !missing.is_empty() {
            return Err(StoreError::NotFound(missing));
        }

        let mut updated = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(point) = inner.points.get_mut(id) {
                point.fields.overlay(fields);
                updated.push(point.clone());
            }
        }
        Ok(updated)
    }
}
