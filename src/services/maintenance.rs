//! Periodic jobs run with service credentials
//!
//! These do not act for a signed-in user, so no identity is required.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use shopshift_client::Query;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{from_rows, tables, NewNotification, NotificationType, TimeRecordStatus};
use crate::services::timestamp;
use crate::Scheduler;

#[derive(Deserialize)]
struct OpenRecord {
    id: Uuid,
    user_id: Uuid,
    shop_id: Uuid,
    clock_in: DateTime<Utc>,
}

pub struct MaintenanceService<'a> {
    scheduler: &'a Scheduler,
}

impl<'a> MaintenanceService<'a> {
    pub(crate) fn new(scheduler: &'a Scheduler) -> Self {
        Self { scheduler }
    }

    /// Delete shift history older than the retention window; returns the count
    pub async fn cleanup_shift_history(&self) -> Result<usize> {
        let cutoff = Utc::now() - self.scheduler.options().history_retention;
        let deleted = self
            .scheduler
            .store()
            .delete(
                tables::SHIFT_HISTORY,
                &Query::new().lt("changed_at", timestamp(cutoff)),
            )
            .await?;
        info!(count = deleted.len(), cutoff = %cutoff, "cleaned up shift history");
        Ok(deleted.len())
    }

    /// Remind everyone still clocked in past the threshold to clock out.
    ///
    /// Users reminded at the same shop within the dedupe window are skipped.
    /// Returns how many reminders were created.
    pub async fn send_clock_out_reminders(&self) -> Result<usize> {
        let options = self.scheduler.options();
        let now = Utc::now();
        let store = self.scheduler.store();

        let records: Vec<OpenRecord> = from_rows(
            store
                .select(
                    tables::TIME_RECORDS,
                    &Query::new()
                        .select("id,user_id,shop_id,clock_in")
                        .in_list(
                            "status",
                            [
                                TimeRecordStatus::ClockedIn.as_str(),
                                TimeRecordStatus::OnBreak.as_str(),
                            ],
                        )
                        .lt("clock_in", timestamp(now - options.clock_out_reminder_after)),
                )
                .await?,
        )?;
        if records.is_empty() {
            return Ok(0);
        }

        let recent_since = timestamp(now - options.clock_out_reminder_dedupe);
        let notifications = self.scheduler.notifications();
        let mut reminded = 0;
        for record in records {
            let recent = store
                .select(
                    tables::NOTIFICATIONS,
                    &Query::new()
                        .select("id")
                        .eq("user_id", record.user_id)
                        .eq("shop_id", record.shop_id)
                        .eq("type", NotificationType::ClockReminder.as_str())
                        .gte("created_at", &recent_since)
                        .limit(1),
                )
                .await?;
            if !recent.is_empty() {
                continue;
            }

            let hours = ((now - record.clock_in).num_minutes() as f64 / 60.0).round() as i64;
            let reminder = NewNotification::new(
                record.shop_id,
                record.user_id,
                NotificationType::ClockReminder,
                "Did you forget to clock out?",
            )
            .with_body(format!(
                "You've been clocked in for {} hours. Remember to clock out when your shift ends.",
                hours
            ))
            .with_data(json!({ "time_record_id": record.id }));

            match notifications.create(&reminder).await {
                Ok(_) => reminded += 1,
                Err(e) => warn!(
                    record_id = %record.id,
                    error = %e,
                    "failed to create clock-out reminder"
                ),
            }
        }

        info!(reminded, "sent clock-out reminders");
        Ok(reminded)
    }
}
