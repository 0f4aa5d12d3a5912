//! Claims, swaps and time-off requests

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle shared by every reviewable request.
///
/// Only `Pending` may transition; the other states are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Denied,
    Cancelled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Denied => "denied",
            RequestStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

/// A member's request to take an open shift
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenShiftClaim {
    pub id: Uuid,
    pub shop_id: Uuid,
    pub shift_id: Uuid,
    pub user_id: Uuid,
    pub status: RequestStatus,
    #[serde(default)]
    pub reviewed_by: Option<Uuid>,
    #[serde(default)]
    pub reviewed_at: Option<DateTime<Utc>>,
}

/// A request to exchange shifts, or to give one up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRequest {
    pub id: Uuid,
    pub shop_id: Uuid,
    pub requester_shift_id: Uuid,
    #[serde(default)]
    pub target_shift_id: Option<Uuid>,
    pub requester_id: Uuid,
    #[serde(default)]
    pub target_id: Option<Uuid>,
    pub status: RequestStatus,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub reviewed_by: Option<Uuid>,
    #[serde(default)]
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl SwapRequest {
    /// Both sides present, so approval exchanges assignees
    pub fn is_bilateral(&self) -> bool {
        self.target_shift_id.is_some() && self.target_id.is_some()
    }
}

/// Input for `request_swap`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSwapRequest {
    pub requester_shift_id: Uuid,
    #[serde(default)]
    pub target_shift_id: Option<Uuid>,
    #[serde(default)]
    pub target_id: Option<Uuid>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// A stored time-off request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeOffRequest {
    pub id: Uuid,
    pub shop_id: Uuid,
    pub user_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub hours_requested: f64,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub is_paid: Option<bool>,
    pub status: RequestStatus,
    #[serde(default)]
    pub reviewed_by: Option<Uuid>,
    #[serde(default)]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reviewer_notes: Option<String>,
}

/// Input for `request_time_off`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTimeOffRequest {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub hours_requested: f64,
    #[serde(default)]
    pub reason: Option<String>,
}
