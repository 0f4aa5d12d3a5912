use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeRecordStatus {
    ClockedIn,
    OnBreak,
    ClockedOut,
}

impl TimeRecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeRecordStatus::ClockedIn => "clocked_in",
            TimeRecordStatus::OnBreak => "on_break",
            TimeRecordStatus::ClockedOut => "clocked_out",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRecord {
    pub id: Uuid,
    pub shop_id: Uuid,
    pub user_id: Uuid,
    #[serde(default)]
    pub shift_id: Option<Uuid>,
    pub clock_in: DateTime<Utc>,
    #[serde(default)]
    pub clock_out: Option<DateTime<Utc>>,
    pub status: TimeRecordStatus,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub is_manual: bool,
    #[serde(default)]
    pub created_by: Option<Uuid>,
}

/// A break taken while clocked in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockBreak {
    pub id: Uuid,
    pub time_record_id: Uuid,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_paid: bool,
}

/// Input for `create_manual_entry`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualEntry {
    pub user_id: Uuid,
    #[serde(default)]
    pub shift_id: Option<Uuid>,
    pub clock_in: DateTime<Utc>,
    pub clock_out: DateTime<Utc>,
    #[serde(default)]
    pub notes: Option<String>,
}
