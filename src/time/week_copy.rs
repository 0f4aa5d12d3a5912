//! Copying a week of shifts forward

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::collections::{HashMap, VecDeque};
use uuid::Uuid;

use crate::models::{NewShift, Shift};

/// One shift to create when copying a week forward
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedCopy {
    pub source_id: Uuid,
    /// 1-based index of the target week
    pub week: u32,
    pub shift: NewShift,
}

/// Draft copies of `source` for each of the next `weeks` weeks.
///
/// Instants move by whole 7-day spans. Copies that cross a DST change keep
/// the UTC time, not the local wall-clock time.
pub fn plan_week_copy(source: &[Shift], weeks: u32, created_by: Uuid) -> Vec<PlannedCopy> {
    (1..=weeks)
        .flat_map(|week| {
            source.iter().map(move |shift| PlannedCopy {
                source_id: shift.id,
                week,
                shift: NewShift::draft_copy_of(shift, created_by)
                    .shifted_by(Duration::weeks(i64::from(week))),
            })
        })
        .collect()
}

/// Identity of a copy within one batch insert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CopyKey {
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    user_id: Option<Uuid>,
}

/// A row returned by the batch insert of copies
#[derive(Debug, Clone, Deserialize)]
pub struct InsertedCopy {
    pub id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

impl InsertedCopy {
    fn key(&self) -> CopyKey {
        CopyKey {
            start_time: self.start_time,
            end_time: self.end_time,
            user_id: self.user_id,
        }
    }
}

/// New shift ids lined up with `plan`, whatever order the store returned them in.
///
/// Rows are matched on start, end and assignee. Copies sharing all three keep
/// their relative order. `None` when some planned copy has no returned row.
pub fn match_inserted_copies(
    plan: &[PlannedCopy],
    inserted: Vec<InsertedCopy>,
) -> Option<Vec<Uuid>> {
    let mut by_key: HashMap<CopyKey, VecDeque<Uuid>> = HashMap::new();
    for row in inserted {
        by_key.entry(row.key()).or_default().push_back(row.id);
    }

    plan.iter()
        .map(|copy| {
            let key = CopyKey {
                start_time: copy.shift.start_time,
                end_time: copy.shift.end_time,
                user_id: copy.shift.user_id,
            };
            by_key.get_mut(&key).and_then(VecDeque::pop_front)
        })
        .collect()
}
