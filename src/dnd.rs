//! Drag-and-drop rescheduling on the schedule grid

use chrono::{NaiveDate, NaiveDateTime};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Patch, Shift, ShiftUpdate};
use crate::time::{local_date, localize};

/// A grid cell a shift was dropped on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DropTarget {
    /// The open-shifts row
    Open { date: NaiveDate },
    /// A member's row
    Assignee { assignee_id: Uuid, date: NaiveDate },
}

impl DropTarget {
    pub fn assignee(&self) -> Option<Uuid> {
        match self {
            DropTarget::Open { .. } => None,
            DropTarget::Assignee { assignee_id, .. } => Some(*assignee_id),
        }
    }

    pub fn date(&self) -> NaiveDate {
        match self {
            DropTarget::Open { date } | DropTarget::Assignee { date, .. } => *date,
        }
    }
}

fn current_assignee(shift: &Shift) -> Option<Uuid> {
    if shift.is_open {
        None
    } else {
        shift.user_id
    }
}

fn move_to_date(local: NaiveDateTime, days: i64, tz: &Tz) -> chrono::DateTime<chrono::Utc> {
    localize(tz, local + chrono::Duration::days(days))
}

/// The patch a drop implies, or `None` when the shift stays where it is.
///
/// A date change keeps the shift's local start and end times and its local
/// day span, so a 09:00-17:00 shift stays 09:00-17:00 across DST changes.
pub fn resolve_drop(shift: &Shift, target: &DropTarget, tz: &Tz) -> Option<ShiftUpdate> {
    let mut update = ShiftUpdate::default();

    let assignee = target.assignee();
    if assignee != current_assignee(shift) {
        update.user_id = Patch::from(assignee);
    }

    let current_date = local_date(shift.start_time, tz);
    let days = (target.date() - current_date).num_days();
    if days != 0 {
        let local_start = shift.start_time.with_timezone(tz).naive_local();
        let local_end = shift.end_time.with_timezone(tz).naive_local();
        update.start_time = Some(move_to_date(local_start, days, tz));
        update.end_time = Some(move_to_date(local_end, days, tz));
    }

    if update.is_empty() {
        None
    } else {
        Some(update)
    }
}
