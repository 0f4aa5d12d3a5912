//! Bulk-mode shift selection
//!
//! The selection is always a subset of the visible shift collection. Every
//! time the collection is replaced, ids that no longer exist are dropped
//! before anything reads the selection.

use chrono::NaiveDate;
use chrono_tz::Tz;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use uuid::Uuid;

use crate::models::Shift;
use crate::time::local_date;

/// Group a shift is listed under in the assignee rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AssigneeKey {
    Open,
    User(Uuid),
}

impl AssigneeKey {
    /// Open shifts and shifts without an assignee share one bucket
    pub fn of(shift: &Shift) -> Self {
        match shift.user_id {
            Some(user_id) if !shift.is_open => AssigneeKey::User(user_id),
            _ => AssigneeKey::Open,
        }
    }
}

/// Selected shift ids plus the group indexes of the visible collection
#[derive(Debug, Clone, Default)]
pub struct BulkSelection {
    selected: HashSet<Uuid>,
    visible: Vec<Uuid>,
    by_assignee: BTreeMap<AssigneeKey, Vec<Uuid>>,
    by_date: BTreeMap<NaiveDate, Vec<Uuid>>,
}

impl BulkSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the visible collection, re-index it in `tz`, and prune the selection
    pub fn set_shifts(&mut self, shifts: &[Shift], tz: &Tz) {
        self.visible = shifts.iter().map(|s| s.id).collect();
        self.by_assignee.clear();
        self.by_date.clear();

        for shift in shifts {
            self.by_assignee
                .entry(AssigneeKey::of(shift))
                .or_default()
                .push(shift.id);
            self.by_date
                .entry(local_date(shift.start_time, tz))
                .or_default()
                .push(shift.id);
        }

        let valid: HashSet<Uuid> = self.visible.iter().copied().collect();
        self.selected.retain(|id| valid.contains(id));
    }

    /// Flip one shift; ids outside the visible collection are ignored
    pub fn toggle_shift(&mut self, id: Uuid) {
        if !self.selected.remove(&id) && self.visible.contains(&id) {
            self.selected.insert(id);
        }
    }

    /// Select the whole assignee group, or clear it when it is already fully selected
    pub fn toggle_assignee(&mut self, key: AssigneeKey) {
        let group = self.by_assignee.get(&key).cloned().unwrap_or_default();
        self.toggle_group(&group);
    }

    /// Select the whole day, or clear it when it is already fully selected
    pub fn toggle_date(&mut self, date: NaiveDate) {
        let group = self.by_date.get(&date).cloned().unwrap_or_default();
        self.toggle_group(&group);
    }

    fn toggle_group(&mut self, group: &[Uuid]) {
        if self.group_fully_selected(group) {
            for id in group {
                self.selected.remove(id);
            }
        } else {
            self.selected.extend(group.iter().copied());
        }
    }

    fn group_fully_selected(&self, group: &[Uuid]) -> bool {
        !group.is_empty() && group.iter().all(|id| self.selected.contains(id))
    }

    pub fn select_all(&mut self) {
        self.selected = self.visible.iter().copied().collect();
    }

    pub fn select_none(&mut self) {
        self.selected.clear();
    }

    pub fn is_selected(&self, id: Uuid) -> bool {
        self.selected.contains(&id)
    }

    /// False for an empty group
    pub fn is_assignee_fully_selected(&self, key: AssigneeKey) -> bool {
        self.by_assignee
            .get(&key)
            .map_or(false, |group| self.group_fully_selected(group))
    }

    /// False for an empty group
    pub fn is_date_fully_selected(&self, date: NaiveDate) -> bool {
        self.by_date
            .get(&date)
            .map_or(false, |group| self.group_fully_selected(group))
    }

    /// Some but not all of the group is selected
    pub fn is_assignee_partially_selected(&self, key: AssigneeKey) -> bool {
        self.by_assignee.get(&key).map_or(false, |group| {
            group.iter().any(|id| self.selected.contains(id)) && !self.group_fully_selected(group)
        })
    }

    /// Selected ids in visible-collection order
    pub fn selected_ids(&self) -> Vec<Uuid> {
        self.visible
            .iter()
            .filter(|id| self.selected.contains(id))
            .copied()
            .collect()
    }

    pub fn selected_count(&self) -> usize {
        self.selected.len()
    }

    pub fn assignee_keys(&self) -> BTreeSet<AssigneeKey> {
        self.by_assignee.keys().copied().collect()
    }

    pub fn dates(&self) -> BTreeSet<NaiveDate> {
        self.by_date.keys().copied().collect()
    }
}
