use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A reusable single-shift preset; times are shop-local
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftTemplate {
    pub id: Uuid,
    pub shop_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub position_id: Option<Uuid>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    #[serde(default)]
    pub break_minutes: i32,
}

/// Input for creating or replacing a shift template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftTemplateInput {
    pub name: String,
    #[serde(default)]
    pub position_id: Option<Uuid>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    #[serde(default)]
    pub break_minutes: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleTemplate {
    pub id: Uuid,
    pub shop_id: Uuid,
    pub name: String,
}

/// One shift of a weekly schedule template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleTemplateEntry {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub template_id: Option<Uuid>,
    /// 0 = Sunday
    pub day_of_week: u32,
    #[serde(default)]
    pub position_id: Option<Uuid>,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    #[serde(default)]
    pub break_minutes: i32,
}
