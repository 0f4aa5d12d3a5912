//! Shift presets and weekly schedule templates

use chrono::{Duration, NaiveDate};
use serde_json::{json, Value};
use shopshift_client::{Query, SortOrder};
use tracing::info;
use uuid::Uuid;

use crate::cache::{CacheKey, CacheScope};
use crate::context::ShopContext;
use crate::error::{Error, Result};
use crate::models::{
    first_row, from_rows, row_ids, tables, NewShift, ScheduleTemplate, ScheduleTemplateEntry,
    ShiftStatus, ShiftTemplate, ShiftTemplateInput,
};
use crate::saga::{Compensation, Saga};
use crate::time::{localize, week_start};
use crate::Scheduler;

pub struct TemplateService<'a> {
    scheduler: &'a Scheduler,
}

impl<'a> TemplateService<'a> {
    pub(crate) fn new(scheduler: &'a Scheduler) -> Self {
        Self { scheduler }
    }

    fn template_row(input: &ShiftTemplateInput) -> Result<Value> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(Error::validation("Template name is required"));
        }
        if input.break_minutes < 0 {
            return Err(Error::validation("Break minutes must not be negative"));
        }
        Ok(json!({
            "name": name,
            "position_id": input.position_id,
            "start_time": input.start_time,
            "end_time": input.end_time,
            "break_minutes": input.break_minutes,
        }))
    }

    pub async fn list_shift_templates(&self, shop_id: Uuid) -> Result<Vec<ShiftTemplate>> {
        let rows = self
            .scheduler
            .store()
            .select(
                tables::SHIFT_TEMPLATES,
                &Query::new()
                    .eq("shop_id", shop_id)
                    .order("name", SortOrder::Ascending),
            )
            .await?;
        from_rows(rows)
    }

    pub async fn create_shift_template(
        &self,
        shop_id: Uuid,
        input: ShiftTemplateInput,
    ) -> Result<ShiftTemplate> {
        self.scheduler.require_user().await?;
        let mut row = Self::template_row(&input)?;
        row["shop_id"] = json!(shop_id);

        let rows = self
            .scheduler
            .store()
            .insert(tables::SHIFT_TEMPLATES, row)
            .await?;
        self.scheduler
            .invalidate(CacheKey::shop(CacheScope::Templates, shop_id));
        first_row(rows)?.ok_or_else(|| Error::store("Template insert returned no row"))
    }

    /// Replace every editable field of a shift template
    pub async fn update_shift_template(
        &self,
        id: Uuid,
        input: ShiftTemplateInput,
    ) -> Result<ShiftTemplate> {
        self.scheduler.require_user().await?;
        let row = Self::template_row(&input)?;
        let rows = self
            .scheduler
            .store()
            .update(tables::SHIFT_TEMPLATES, &Query::new().eq("id", id), row)
            .await?;
        let template: ShiftTemplate =
            first_row(rows)?.ok_or_else(|| Error::not_found("Template not found"))?;
        self.scheduler
            .invalidate(CacheKey::shop(CacheScope::Templates, template.shop_id));
        Ok(template)
    }

    pub async fn delete_shift_template(&self, id: Uuid) -> Result<()> {
        self.scheduler.require_user().await?;
        self.scheduler
            .store()
            .delete(tables::SHIFT_TEMPLATES, &Query::new().eq("id", id))
            .await?;
        self.scheduler.invalidate(CacheKey::scope(CacheScope::Templates));
        Ok(())
    }

    pub async fn list_schedule_templates(&self, shop_id: Uuid) -> Result<Vec<ScheduleTemplate>> {
        let rows = self
            .scheduler
            .store()
            .select(
                tables::SCHEDULE_TEMPLATES,
                &Query::new()
                    .eq("shop_id", shop_id)
                    .order("name", SortOrder::Ascending),
            )
            .await?;
        from_rows(rows)
    }

    pub async fn schedule_template_entries(
        &self,
        template_id: Uuid,
    ) -> Result<Vec<ScheduleTemplateEntry>> {
        let rows = self
            .scheduler
            .store()
            .select(
                tables::SCHEDULE_TEMPLATE_ENTRIES,
                &Query::new()
                    .eq("template_id", template_id)
                    .order("day_of_week", SortOrder::Ascending)
                    .order("start_time", SortOrder::Ascending),
            )
            .await?;
        from_rows(rows)
    }

    /// Create a schedule template together with its entries.
    ///
    /// The template row is removed again if the entries cannot be written.
    pub async fn create_schedule_template(
        &self,
        shop_id: Uuid,
        name: &str,
        entries: Vec<ScheduleTemplateEntry>,
    ) -> Result<ScheduleTemplate> {
        self.scheduler.require_user().await?;
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::validation("Template name is required"));
        }
        if let Some(entry) = entries.iter().find(|e| e.day_of_week > 6) {
            return Err(Error::validation(format!(
                "Invalid weekday: {}",
                entry.day_of_week
            )));
        }

        let store = self.scheduler.store();
        let mut saga = Saga::new(store, "create_schedule_template");
        let rows = saga
            .run(
                "insert_template",
                store.insert(
                    tables::SCHEDULE_TEMPLATES,
                    json!({ "shop_id": shop_id, "name": name }),
                ),
            )
            .await?;
        saga.compensate_with(
            "insert_template",
            Compensation::DeleteRows {
                table: tables::SCHEDULE_TEMPLATES,
                ids: row_ids(&rows),
            },
        );
        let template: ScheduleTemplate = saga
            .check(
                "insert_template",
                first_row(rows)
                    .and_then(|t| t.ok_or_else(|| Error::store("Template insert returned no row"))),
            )
            .await?;

        if !entries.is_empty() {
            let entry_rows: Vec<Value> = entries
                .iter()
                .map(|entry| {
                    json!({
                        "template_id": template.id,
                        "day_of_week": entry.day_of_week,
                        "position_id": entry.position_id,
                        "user_id": entry.user_id,
                        "start_time": entry.start_time,
                        "end_time": entry.end_time,
                        "break_minutes": entry.break_minutes,
                    })
                })
                .collect();
            saga.run(
                "insert_entries",
                store.insert(tables::SCHEDULE_TEMPLATE_ENTRIES, Value::Array(entry_rows)),
            )
            .await?;
        }

        self.scheduler
            .invalidate(CacheKey::shop(CacheScope::Templates, shop_id));
        Ok(template)
    }

    pub async fn delete_schedule_template(&self, id: Uuid) -> Result<()> {
        self.scheduler.require_user().await?;
        let store = self.scheduler.store();
        store
            .delete(
                tables::SCHEDULE_TEMPLATE_ENTRIES,
                &Query::new().eq("template_id", id),
            )
            .await?;
        store
            .delete(tables::SCHEDULE_TEMPLATES, &Query::new().eq("id", id))
            .await?;
        self.scheduler.invalidate(CacheKey::scope(CacheScope::Templates));
        Ok(())
    }

    /// Create draft shifts for the Sunday-start local week containing `week`,
    /// one per template entry. Returns how many were created.
    ///
    /// An entry whose end is not after its start ends on the next local day.
    pub async fn apply_schedule_template(
        &self,
        template_id: Uuid,
        ctx: &ShopContext,
        week: NaiveDate,
    ) -> Result<usize> {
        let user = self.scheduler.require_user().await?;
        let entries = self.schedule_template_entries(template_id).await?;
        if entries.is_empty() {
            return Err(Error::validation("Template has no entries"));
        }

        let start_of_week = week_start(week);
        let shifts = entries
            .iter()
            .map(|entry| {
                if entry.day_of_week > 6 {
                    return Err(Error::validation(format!(
                        "Invalid weekday: {}",
                        entry.day_of_week
                    )));
                }
                let date = start_of_week + Duration::days(i64::from(entry.day_of_week));
                let end_date = if entry.end_time <= entry.start_time {
                    date + Duration::days(1)
                } else {
                    date
                };
                Ok(NewShift {
                    shop_id: ctx.shop_id,
                    schedule_id: None,
                    user_id: entry.user_id,
                    position_id: entry.position_id,
                    start_time: localize(&ctx.timezone, date.and_time(entry.start_time)),
                    end_time: localize(&ctx.timezone, end_date.and_time(entry.end_time)),
                    break_minutes: entry.break_minutes,
                    status: ShiftStatus::Draft,
                    is_open: entry.user_id.is_none(),
                    notes: None,
                    color: None,
                    recurrence_group_id: None,
                    created_by: Some(user.id),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let inserted = self
            .scheduler
            .store()
            .insert(tables::SHIFTS, serde_json::to_value(&shifts)?)
            .await?;
        info!(
            shop_id = %ctx.shop_id,
            %template_id,
            count = inserted.len(),
            "applied schedule template"
        );
        self.scheduler.invalidate(
            CacheKey::shop(CacheScope::Shifts, ctx.shop_id)
                .with_range(start_of_week, start_of_week + Duration::days(7)),
        );
        Ok(inserted.len())
    }
}
