//! Row types for the scheduling tables

mod member;
mod notification;
mod patch;
mod requests;
mod shift;
mod template;
mod time_clock;

use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use crate::error::Result;

pub use member::*;
pub use notification::*;
pub use patch::Patch;
pub use requests::*;
pub use shift::*;
pub use template::*;
pub use time_clock::*;

/// Table and function names in the database
pub mod tables {
    pub const SHOPS: &str = "shops";
    pub const PROFILES: &str = "profiles";
    pub const SHIFTS: &str = "shifts";
    pub const SHIFT_BREAKS: &str = "shift_breaks";
    pub const SHIFT_TAG_ASSIGNMENTS: &str = "shift_tag_assignments";
    pub const SHIFT_TEMPLATES: &str = "shift_templates";
    pub const SHIFT_HISTORY: &str = "shift_history";
    pub const SCHEDULE_TEMPLATES: &str = "schedule_templates";
    pub const SCHEDULE_TEMPLATE_ENTRIES: &str = "schedule_template_entries";
    pub const OPEN_SHIFT_CLAIMS: &str = "open_shift_claims";
    pub const SWAP_REQUESTS: &str = "swap_requests";
    pub const SHOP_MEMBERS: &str = "shop_members";
    pub const DEPARTMENTS: &str = "departments";
    pub const TIME_OFF_REQUESTS: &str = "time_off_requests";
    pub const PTO_BALANCE_ADJUSTMENTS: &str = "pto_balance_adjustments";
    pub const TIME_RECORDS: &str = "time_records";
    pub const CLOCK_BREAKS: &str = "breaks";
    pub const NOTIFICATIONS: &str = "notifications";
}

/// Decode a list of rows
pub(crate) fn from_rows<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(Into::into))
        .collect()
}

/// Decode the first row, if any
pub(crate) fn first_row<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Option<T>> {
    match rows.into_iter().next() {
        Some(row) => Ok(Some(serde_json::from_value(row)?)),
        None => Ok(None),
    }
}

/// `id` column of each row, as stored
pub(crate) fn row_ids(rows: &[Value]) -> Vec<String> {
    rows.iter()
        .filter_map(|row| row.get("id").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

/// `id` column of each row, parsed
pub(crate) fn row_uuids(rows: &[Value]) -> Vec<Uuid> {
    rows.iter()
        .filter_map(|row| row.get("id").and_then(Value::as_str))
        .filter_map(|id| Uuid::parse_str(id).ok())
        .collect()
}
