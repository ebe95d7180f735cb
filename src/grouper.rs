//! Case grouping
//!
//! Partitions discreet points by case. Nothing downstream ever looks across a
//! group boundary, so this is where data from different cases is kept apart.

use std::collections::HashMap;

use crate::types::{CaseId, DiscreetPoint};

/// All points of one case, stably sorted by time
#[derive(Debug, Clone)]
pub struct CaseGroup<'a> {
    pub case_id: Option<CaseId>,
    pub points: Vec<&'a DiscreetPoint>,
}

/// Group points by case in order of first occurrence.
///
/// Each group is sorted by `time` ascending; points with equal times keep
/// their input order.
pub fn group_by_case(points: &[DiscreetPoint]) -> Vec<CaseGroup<'_>> {
    let mut index_of: HashMap<Option<CaseId>, usize> = HashMap::new();
    let mut groups: Vec<CaseGroup<'_>> = Vec::new();

    for point in points {
        let index = *index_of.entry(point.case_id).or_insert_with(|| {
            groups.push(CaseGroup {
                case_id: point.case_id,
                points: Vec::new(),
            });
            groups.len() - 1
        });
        groups[index].points.push(point);
    }

    for group in &mut groups {
        group.points.sort_by_key(|p| p.time);
    }

    groups
}
