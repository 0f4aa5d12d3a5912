//! Shifts and their child rows

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use super::patch::Patch;
use crate::time::{parse_time_of_day, RecurrencePattern};

/// Shift visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShiftStatus {
    Draft,
    Published,
}

impl ShiftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShiftStatus::Draft => "draft",
            ShiftStatus::Published => "published",
        }
    }
}

/// A stored shift
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shift {
    pub id: Uuid,
    pub shop_id: Uuid,
    #[serde(default)]
    pub schedule_id: Option<Uuid>,
    /// Assignee; `None` means the shift is open
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub position_id: Option<Uuid>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub break_minutes: i32,
    pub status: ShiftStatus,
    #[serde(default)]
    pub is_open: bool,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub recurrence_group_id: Option<Uuid>,
    #[serde(default)]
    pub created_by: Option<Uuid>,
}

impl Shift {
    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }
}

/// Insert payload for the `shifts` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewShift {
    pub shop_id: Uuid,
    pub schedule_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub position_id: Option<Uuid>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub break_minutes: i32,
    pub status: ShiftStatus,
    pub is_open: bool,
    pub notes: Option<String>,
    pub color: Option<String>,
    pub recurrence_group_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
}

impl NewShift {
    /// A draft with every field of `shift` except the author
    pub fn draft_copy_of(shift: &Shift, created_by: Uuid) -> Self {
        Self {
            shop_id: shift.shop_id,
            schedule_id: shift.schedule_id,
            user_id: shift.user_id,
            position_id: shift.position_id,
            start_time: shift.start_time,
            end_time: shift.end_time,
            break_minutes: shift.break_minutes,
            status: ShiftStatus::Draft,
            is_open: shift.user_id.is_none(),
            notes: shift.notes.clone(),
            color: shift.color.clone(),
            recurrence_group_id: shift.recurrence_group_id,
            created_by: Some(created_by),
        }
    }

    /// Move both ends by the same amount
    pub fn shifted_by(mut self, delta: Duration) -> Self {
        self.start_time += delta;
        self.end_time += delta;
        self
    }
}

/// A break as entered in the shift form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakInput {
    #[serde(default = "default_break_label")]
    pub label: String,
    pub duration_minutes: i32,
    #[serde(default)]
    pub is_paid: bool,
}

fn default_break_label() -> String {
    "Break".to_string()
}

impl BreakInput {
    pub fn new(label: &str, duration_minutes: i32, is_paid: bool) -> Self {
        Self {
            label: label.to_string(),
            duration_minutes,
            is_paid,
        }
    }

    pub(crate) fn row_for(&self, shift_id: Uuid, sort_order: usize) -> Value {
        json!({
            "shift_id": shift_id,
            "label": self.label,
            "duration_minutes": self.duration_minutes,
            "is_paid": self.is_paid,
            "sort_order": sort_order,
        })
    }
}

/// Total break minutes stored on the shift row
pub fn total_break_minutes(breaks: &[BreakInput]) -> i32 {
    breaks.iter().map(|b| b.duration_minutes).sum()
}

/// A stored break
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftBreak {
    pub id: Uuid,
    pub shift_id: Uuid,
    pub label: String,
    pub duration_minutes: i32,
    #[serde(default)]
    pub is_paid: bool,
    #[serde(default)]
    pub sort_order: i32,
}

impl ShiftBreak {
    /// Insert payload copying this break onto another shift
    pub(crate) fn row_for(&self, shift_id: Uuid) -> Value {
        json!({
            "shift_id": shift_id,
            "label": self.label,
            "duration_minutes": self.duration_minutes,
            "is_paid": self.is_paid,
            "sort_order": self.sort_order,
        })
    }
}

/// A stored tag assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftTagAssignment {
    pub id: Uuid,
    pub shift_id: Uuid,
    pub tag_id: Uuid,
}

pub(crate) fn tag_row(shift_id: Uuid, tag_id: Uuid) -> Value {
    json!({ "shift_id": shift_id, "tag_id": tag_id })
}

/// Input for creating a shift
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateShiftRequest {
    #[serde(default)]
    pub schedule_id: Option<Uuid>,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub position_id: Option<Uuid>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Used when no breaks are listed
    #[serde(default)]
    pub break_minutes: Option<i32>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub breaks: Vec<BreakInput>,
    #[serde(default)]
    pub tag_ids: Vec<Uuid>,
    #[serde(default)]
    pub recurrence: Option<RecurrencePattern>,
    /// Also save a reusable template under this name
    #[serde(default)]
    pub save_as_template: Option<String>,
}

impl CreateShiftRequest {
    pub fn new(start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        Self {
            schedule_id: None,
            user_id: None,
            position_id: None,
            start_time,
            end_time,
            break_minutes: None,
            notes: None,
            color: None,
            breaks: Vec::new(),
            tag_ids: Vec::new(),
            recurrence: None,
            save_as_template: None,
        }
    }

    pub fn effective_break_minutes(&self) -> i32 {
        if self.breaks.is_empty() {
            self.break_minutes.unwrap_or(0)
        } else {
            total_break_minutes(&self.breaks)
        }
    }
}

/// Partial update of one shift.
///
/// `is_open` is not settable; it follows `user_id`. When `breaks` is given the
/// stored breaks are replaced and `break_minutes` becomes their sum.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShiftUpdate {
    #[serde(default, skip_serializing_if = "Patch::is_unchanged")]
    pub user_id: Patch<Uuid>,
    #[serde(default, skip_serializing_if = "Patch::is_unchanged")]
    pub position_id: Patch<Uuid>,
    #[serde(default, skip_serializing_if = "Patch::is_unchanged")]
    pub schedule_id: Patch<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub break_minutes: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ShiftStatus>,
    #[serde(default, skip_serializing_if = "Patch::is_unchanged")]
    pub notes: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_unchanged")]
    pub color: Patch<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breaks: Option<Vec<BreakInput>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_ids: Option<Vec<Uuid>>,
}

impl ShiftUpdate {
    pub fn is_empty(&self) -> bool {
        self == &ShiftUpdate::default()
    }

    /// Column patch for the `shifts` row, without child collections
    pub fn to_row(&self) -> Map<String, Value> {
        let mut row = Map::new();

        if let Some(user_id) = self.user_id.as_change() {
            row.insert("user_id".to_string(), json!(user_id));
            row.insert("is_open".to_string(), Value::Bool(user_id.is_none()));
        }
        if let Some(position_id) = self.position_id.as_change() {
            row.insert("position_id".to_string(), json!(position_id));
        }
        if let Some(schedule_id) = self.schedule_id.as_change() {
            row.insert("schedule_id".to_string(), json!(schedule_id));
        }
        if let Some(start_time) = self.start_time {
            row.insert("start_time".to_string(), json!(start_time));
        }
        if let Some(end_time) = self.end_time {
            row.insert("end_time".to_string(), json!(end_time));
        }
        match &self.breaks {
            Some(breaks) => {
                row.insert(
                    "break_minutes".to_string(),
                    json!(total_break_minutes(breaks)),
                );
            }
            None => {
                if let Some(minutes) = self.break_minutes {
                    row.insert("break_minutes".to_string(), json!(minutes));
                }
            }
        }
        if let Some(status) = self.status {
            row.insert("status".to_string(), json!(status));
        }
        if let Some(notes) = self.notes.as_change() {
            row.insert("notes".to_string(), json!(notes));
        }
        if let Some(color) = self.color.as_change() {
            row.insert("color".to_string(), json!(color));
        }
        row
    }
}

fn deserialize_time_of_day<'de, D>(deserializer: D) -> Result<Option<NaiveTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref() {
        None | Some("") => Ok(None),
        Some(value) => parse_time_of_day(value)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid time of day: {}", value))),
    }
}

/// Uniform edit applied to many shifts from bulk mode
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BulkShiftPatch {
    /// New local start time, keeping each shift's local date
    #[serde(default, deserialize_with = "deserialize_time_of_day")]
    pub start_time_of_day: Option<NaiveTime>,
    /// New local end time; rolls to the next day when not after the start
    #[serde(default, deserialize_with = "deserialize_time_of_day")]
    pub end_time_of_day: Option<NaiveTime>,
    #[serde(default)]
    pub position_id: Patch<Uuid>,
    #[serde(default)]
    pub color: Patch<String>,
}

impl BulkShiftPatch {
    pub fn is_empty(&self) -> bool {
        self.start_time_of_day.is_none()
            && self.end_time_of_day.is_none()
            && self.position_id.is_unchanged()
            && self.color.is_unchanged()
    }

    pub fn changes_times(&self) -> bool {
        self.start_time_of_day.is_some() || self.end_time_of_day.is_some()
    }

    /// Column patch shared by every target shift
    pub(crate) fn shared_row(&self) -> Map<String, Value> {
        let mut row = Map::new();
        if let Some(position_id) = self.position_id.as_change() {
            row.insert("position_id".to_string(), json!(position_id));
        }
        if let Some(color) = self.color.as_change() {
            row.insert("color".to_string(), json!(color));
        }
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_row_keeps_is_open_in_sync() {
        let assignee = Uuid::new_v4();
        let assign = ShiftUpdate {
            user_id: Patch::Set(assignee),
            ..Default::default()
        };
        let row = assign.to_row();
        assert_eq!(row["user_id"], json!(assignee));
        assert_eq!(row["is_open"], json!(false));

        let open = ShiftUpdate {
            user_id: Patch::Clear,
            ..Default::default()
        };
        let row = open.to_row();
        assert_eq!(row["user_id"], Value::Null);
        assert_eq!(row["is_open"], json!(true));

        let untouched = ShiftUpdate {
            color: Patch::Set("#00ff00".to_string()),
            ..Default::default()
        };
        assert!(!untouched.to_row().contains_key("is_open"));
    }

    #[test]
    fn breaks_override_break_minutes() {
        let update = ShiftUpdate {
            break_minutes: Some(99),
            breaks: Some(vec![
                BreakInput::new("Lunch", 30, false),
                BreakInput::new("Rest", 15, true),
            ]),
            ..Default::default()
        };
        assert_eq!(update.to_row()["break_minutes"], json!(45));

        let cleared = ShiftUpdate {
            breaks: Some(Vec::new()),
            ..Default::default()
        };
        assert_eq!(cleared.to_row()["break_minutes"], json!(0));
    }

    #[test]
    fn bulk_patch_decodes_tri_state() {
        let patch: BulkShiftPatch = serde_json::from_value(json!({
            "start_time_of_day": "08:30",
            "position_id": null
        }))
        .unwrap();
        assert_eq!(patch.start_time_of_day, NaiveTime::from_hms_opt(8, 30, 0));
        assert_eq!(patch.end_time_of_day, None);
        assert_eq!(patch.position_id, Patch::Clear);
        assert_eq!(patch.color, Patch::Unchanged);
        assert_eq!(patch.shared_row().get("position_id"), Some(&Value::Null));
        assert!(patch.shared_row().get("color").is_none());
    }
}
