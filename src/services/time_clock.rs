use serde_json::{json, Value};
use shopshift_client::{Query, SortOrder};
use tracing::info;
use uuid::Uuid;

use crate::cache::{CacheKey, CacheScope};
use crate::error::{Error, Result};
use crate::models::{
    first_row, from_rows, tables, ClockBreak, ManualEntry, TimeRecord, TimeRecordStatus,
};
use crate::services::now_timestamp;
use crate::Scheduler;

/// Clocking in and out, and breaks taken while clocked in
pub struct TimeClockService<'a> {
    scheduler: &'a Scheduler,
}

impl<'a> TimeClockService<'a> {
    pub(crate) fn new(scheduler: &'a Scheduler) -> Self {
        Self { scheduler }
    }

    pub async fn get_record(&self, id: Uuid) -> Result<TimeRecord> {
        let rows = self
            .scheduler
            .store()
            .select(tables::TIME_RECORDS, &Query::new().eq("id", id))
            .await?;
        first_row(rows)?.ok_or_else(|| Error::not_found("Time record not found"))
    }

    /// The signed-in user's open record at a shop, if any
    pub async fn active_record(&self, shop_id: Uuid) -> Result<Option<TimeRecord>> {
        let user = self.scheduler.require_user().await?;
        let query = Query::new()
            .eq("shop_id", shop_id)
            .eq("user_id", user.id)
            .in_list(
                "status",
                [
                    TimeRecordStatus::ClockedIn.as_str(),
                    TimeRecordStatus::OnBreak.as_str(),
                ],
            )
            .order("clock_in", SortOrder::Descending)
            .limit(1);
        let rows = self
            .scheduler
            .store()
            .select(tables::TIME_RECORDS, &query)
            .await?;
        first_row(rows)
    }

    pub async fn clock_in(&self, shop_id: Uuid, shift_id: Option<Uuid>) -> Result<TimeRecord> {
        let user = self.scheduler.require_user().await?;
        if let Some(active) = self.active_record(shop_id).await? {
            return Err(Error::validation(match active.status {
                TimeRecordStatus::OnBreak => "Already clocked in (on break)",
                _ => "Already clocked in",
            }));
        }

        let rows = self
            .scheduler
            .store()
            .insert(
                tables::TIME_RECORDS,
                json!({
                    "shop_id": shop_id,
                    "user_id": user.id,
                    "shift_id": shift_id,
                    "clock_in": now_timestamp(),
                    "status": TimeRecordStatus::ClockedIn,
                    "created_by": user.id,
                }),
            )
            .await?;
        let record: TimeRecord =
            first_row(rows)?.ok_or_else(|| Error::store("Time record insert returned no row"))?;
        info!(%shop_id, user_id = %user.id, record_id = %record.id, "clocked in");
        self.scheduler
            .invalidate(CacheKey::shop(CacheScope::TimeRecords, shop_id));
        Ok(record)
    }

    async fn close_open_breaks(&self, record_id: Uuid) -> Result<usize> {
        let rows = self
            .scheduler
            .store()
            .update(
                tables::CLOCK_BREAKS,
                &Query::new()
                    .eq("time_record_id", record_id)
                    .is_null("end_time"),
                json!({ "end_time": now_timestamp() }),
            )
            .await?;
        Ok(rows.len())
    }

    async fn set_status(&self, record_id: Uuid, patch: Value) -> Result<TimeRecord> {
        let rows = self
            .scheduler
            .store()
            .update(tables::TIME_RECORDS, &Query::new().eq("id", record_id), patch)
            .await?;
        first_row(rows)?.ok_or_else(|| Error::not_found("Time record not found"))
    }

    /// Close the record, ending any break still running
    pub async fn clock_out(&self, record_id: Uuid) -> Result<TimeRecord> {
        self.scheduler.require_user().await?;
        let record = self.get_record(record_id).await?;
        if record.status == TimeRecordStatus::ClockedOut {
            return Err(Error::validation("Already clocked out"));
        }

        self.close_open_breaks(record_id).await?;
        let record = self
            .set_status(
                record_id,
                json!({
                    "clock_out": now_timestamp(),
                    "status": TimeRecordStatus::ClockedOut,
                }),
            )
            .await?;
        info!(record_id = %record_id, "clocked out");
        self.scheduler
            .invalidate(CacheKey::shop(CacheScope::TimeRecords, record.shop_id));
        Ok(record)
    }

    pub async fn start_break(&self, record_id: Uuid, is_paid: bool) -> Result<ClockBreak> {
        self.scheduler.require_user().await?;
        let record = self.get_record(record_id).await?;
        if record.status != TimeRecordStatus::ClockedIn {
            return Err(Error::validation("Not clocked in"));
        }

        self.set_status(record_id, json!({ "status": TimeRecordStatus::OnBreak }))
            .await?;
        let rows = self
            .scheduler
            .store()
            .insert(
                tables::CLOCK_BREAKS,
                json!({
                    "time_record_id": record_id,
                    "start_time": now_timestamp(),
                    "is_paid": is_paid,
                }),
            )
            .await?;
        self.scheduler
            .invalidate(CacheKey::shop(CacheScope::TimeRecords, record.shop_id));
        first_row(rows)?.ok_or_else(|| Error::store("Break insert returned no row"))
    }

    pub async fn end_break(&self, record_id: Uuid) -> Result<TimeRecord> {
        self.scheduler.require_user().await?;
        let record = self.get_record(record_id).await?;
        if record.status != TimeRecordStatus::OnBreak {
            return Err(Error::validation("Not on a break"));
        }

        self.close_open_breaks(record_id).await?;
        let record = self
            .set_status(record_id, json!({ "status": TimeRecordStatus::ClockedIn }))
            .await?;
        self.scheduler
            .invalidate(CacheKey::shop(CacheScope::TimeRecords, record.shop_id));
        Ok(record)
    }

    pub async fn breaks(&self, record_id: Uuid) -> Result<Vec<ClockBreak>> {
        let rows = self
            .scheduler
            .store()
            .select(
                tables::CLOCK_BREAKS,
                &Query::new()
                    .eq("time_record_id", record_id)
                    .order("start_time", SortOrder::Ascending),
            )
            .await?;
        from_rows(rows)
    }

    /// Record a finished shift entered by a manager
    pub async fn create_manual_entry(&self, shop_id: Uuid, entry: ManualEntry) -> Result<TimeRecord> {
        let user = self.scheduler.require_user().await?;
        if entry.clock_out <= entry.clock_in {
            return Err(Error::validation("Clock out must be after clock in"));
        }

        let rows = self
            .scheduler
            .store()
            .insert(
                tables::TIME_RECORDS,
                json!({
                    "shop_id": shop_id,
                    "user_id": entry.user_id,
                    "shift_id": entry.shift_id,
                    "clock_in": entry.clock_in,
                    "clock_out": entry.clock_out,
                    "notes": entry.notes,
                    "status": TimeRecordStatus::ClockedOut,
                    "is_manual": true,
                    "created_by": user.id,
                }),
            )
            .await?;
        self.scheduler
            .invalidate(CacheKey::shop(CacheScope::TimeRecords, shop_id));
        first_row(rows)?.ok_or_else(|| Error::store("Time record insert returned no row"))
    }
}
