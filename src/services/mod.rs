//! Scheduling operations, grouped by the rows they own
//!
//! Each service borrows the [`Scheduler`](crate::Scheduler) it was obtained
//! from and is cheap to create.

mod bulk;
mod claims;
mod departments;
mod maintenance;
mod members;
mod notifications;
mod reports;
mod shifts;
mod swaps;
mod templates;
mod time_clock;
mod time_off;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use shopshift_client::Query;
use uuid::Uuid;

use crate::models::RequestStatus;

pub use bulk::{process_bulk_actions, BulkAction, BulkActionKind, BulkActionResult};
pub use claims::ClaimService;
pub use departments::DepartmentService;
pub use maintenance::MaintenanceService;
pub use members::{ArchiveReport, MemberService};
pub use notifications::NotificationService;
pub use reports::ReportService;
pub use shifts::{CreatedShift, ShiftService, WeekCopyReport};
pub use swaps::SwapService;
pub use templates::TemplateService;
pub use time_clock::TimeClockService;
pub use time_off::TimeOffService;

/// An instant as written to timestamp columns and filters
pub(crate) fn timestamp(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn now_timestamp() -> String {
    timestamp(Utc::now())
}

/// Filter matching one request only while it is still pending
pub(crate) fn pending_by_id(id: Uuid) -> Query {
    Query::new()
        .eq("id", id)
        .eq("status", RequestStatus::Pending.as_str())
}

/// Terminal status change stamped with the reviewer
pub(crate) fn review(status: RequestStatus, reviewer: Uuid) -> Map<String, Value> {
    let mut row = Map::new();
    row.insert("status".to_string(), json!(status));
    row.insert("reviewed_by".to_string(), json!(reviewer));
    row.insert("reviewed_at".to_string(), json!(now_timestamp()));
    row
}
