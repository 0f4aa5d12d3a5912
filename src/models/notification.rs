use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    ShiftPublished,
    ShiftAssigned,
    ShiftUpdated,
    ShiftDeleted,
    SwapRequested,
    SwapApproved,
    SwapDenied,
    OpenShiftAvailable,
    OpenShiftClaimed,
    OpenShiftApproved,
    OpenShiftDenied,
    ClockReminder,
    ScheduleUpdated,
    TeamInvite,
    TimeOffRequested,
    TimeOffApproved,
    TimeOffDenied,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::ShiftPublished => "shift_published",
            NotificationType::ShiftAssigned => "shift_assigned",
            NotificationType::ShiftUpdated => "shift_updated",
            NotificationType::ShiftDeleted => "shift_deleted",
            NotificationType::SwapRequested => "swap_requested",
            NotificationType::SwapApproved => "swap_approved",
            NotificationType::SwapDenied => "swap_denied",
            NotificationType::OpenShiftAvailable => "open_shift_available",
            NotificationType::OpenShiftClaimed => "open_shift_claimed",
            NotificationType::OpenShiftApproved => "open_shift_approved",
            NotificationType::OpenShiftDenied => "open_shift_denied",
            NotificationType::ClockReminder => "clock_reminder",
            NotificationType::ScheduleUpdated => "schedule_updated",
            NotificationType::TeamInvite => "team_invite",
            NotificationType::TimeOffRequested => "time_off_requested",
            NotificationType::TimeOffApproved => "time_off_approved",
            NotificationType::TimeOffDenied => "time_off_denied",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub shop_id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Insert payload for one notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNotification {
    pub shop_id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

impl NewNotification {
    pub fn new(shop_id: Uuid, user_id: Uuid, kind: NotificationType, title: &str) -> Self {
        Self {
            shop_id,
            user_id,
            kind,
            title: title.to_string(),
            body: None,
            data: Value::Null,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }
}
