use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use shopshift_client::{Query, SortOrder};
use tracing::{debug, info};
use uuid::Uuid;

use crate::cache::{CacheKey, CacheScope};
use crate::context::ShopContext;
use crate::dnd::{resolve_drop, DropTarget};
use crate::error::{Error, Result};
use crate::models::{
    first_row, from_rows, row_ids, row_uuids, tables, tag_row, BreakInput, BulkShiftPatch,
    CreateShiftRequest, NewShift, Patch, Shift, ShiftBreak, ShiftStatus, ShiftTagAssignment,
    ShiftUpdate,
};
use crate::saga::{Compensation, Saga};
use crate::services::timestamp;
use crate::time::{
    generate_recurring_instances, local_time, local_week_bounds, localize, match_inserted_copies,
    plan_week_copy, week_start, InsertedCopy, RecurrenceLimits,
};
use crate::Scheduler;

/// Outcome of `create_shift`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatedShift {
    pub shift: Shift,
    /// Instances created from the recurrence pattern, excluding the anchor
    pub recurring_count: usize,
}

/// Outcome of `copy_week_forward`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekCopyReport {
    pub created: usize,
    pub weeks: u32,
    pub source_shifts: usize,
    pub breaks_copied: usize,
    pub tags_copied: usize,
}

/// Shift creation, editing and bulk operations
pub struct ShiftService<'a> {
    scheduler: &'a Scheduler,
}

impl<'a> ShiftService<'a> {
    pub(crate) fn new(scheduler: &'a Scheduler) -> Self {
        Self { scheduler }
    }

    /// Shifts of the shop starting in `[start, end)`, earliest first
    pub async fn load_shifts(
        &self,
        ctx: &ShopContext,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Shift>> {
        let query = Query::new()
            .eq("shop_id", ctx.shop_id)
            .gte("start_time", timestamp(start))
            .lt("start_time", timestamp(end))
            .order("start_time", SortOrder::Ascending);
        let rows = self.scheduler.store().select(tables::SHIFTS, &query).await?;
        from_rows(rows)
    }

    /// Shifts of the Sunday-start local week containing `date`
    pub async fn load_week(&self, ctx: &ShopContext, date: NaiveDate) -> Result<Vec<Shift>> {
        let (start, end) = local_week_bounds(date, &ctx.timezone);
        self.load_shifts(ctx, start, end).await
    }

    pub async fn get_shift(&self, id: Uuid) -> Result<Shift> {
        let rows = self
            .scheduler
            .store()
            .select(tables::SHIFTS, &Query::new().eq("id", id))
            .await?;
        first_row(rows)?.ok_or_else(|| Error::not_found("Shift not found"))
    }

    fn validate_times(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<()> {
        if end <= start {
            return Err(Error::validation("Shift must end after it starts"));
        }
        Ok(())
    }

    fn validate_notes(&self, notes: Option<&String>) -> Result<()> {
        let max = self.scheduler.options().max_notes_len;
        match notes {
            Some(notes) if notes.chars().count() > max => Err(Error::validation(format!(
                "Notes must be {} characters or fewer",
                max
            ))),
            _ => Ok(()),
        }
    }

    fn validate_breaks(breaks: &[BreakInput]) -> Result<()> {
        if breaks.iter().any(|b| b.duration_minutes <= 0) {
            return Err(Error::validation("Break duration must be positive"));
        }
        Ok(())
    }

    /// Create a draft shift with its breaks, tags, recurring instances and
    /// optional template.
    ///
    /// Runs as one compensated sequence: if any step fails, every row written
    /// by the earlier steps is removed again.
    pub async fn create_shift(
        &self,
        ctx: &ShopContext,
        req: CreateShiftRequest,
    ) -> Result<CreatedShift> {
        let user = self.scheduler.require_user().await?;

        Self::validate_times(req.start_time, req.end_time)?;
        self.validate_notes(req.notes.as_ref())?;
        Self::validate_breaks(&req.breaks)?;
        if let Some(pattern) = &req.recurrence {
            pattern.validate()?;
        }

        let new_shift = NewShift {
            shop_id: ctx.shop_id,
            schedule_id: req.schedule_id,
            user_id: req.user_id,
            position_id: req.position_id,
            start_time: req.start_time,
            end_time: req.end_time,
            break_minutes: req.effective_break_minutes(),
            status: ShiftStatus::Draft,
            is_open: req.user_id.is_none(),
            notes: req.notes.clone(),
            color: req.color.clone(),
            recurrence_group_id: req.recurrence.as_ref().map(|_| Uuid::new_v4()),
            created_by: Some(user.id),
        };
        let payload = serde_json::to_value(&new_shift)?;

        let store = self.scheduler.store();
        let mut saga = Saga::new(store, "create_shift");

        let rows = saga
            .run("insert_shift", store.insert(tables::SHIFTS, payload))
            .await?;
        saga.compensate_with(
            "insert_shift",
            Compensation::DeleteRows {
                table: tables::SHIFTS,
                ids: row_ids(&rows),
            },
        );
        let shift = saga
            .check(
                "insert_shift",
                first_row::<Shift>(rows)
                    .and_then(|s| s.ok_or_else(|| Error::store("Shift insert returned no row"))),
            )
            .await?;

        if !req.breaks.is_empty() {
            let break_rows = req
                .breaks
                .iter()
                .enumerate()
                .map(|(i, b)| b.row_for(shift.id, i))
                .collect();
            let inserted = saga
                .run(
                    "insert_breaks",
                    store.insert(tables::SHIFT_BREAKS, Value::Array(break_rows)),
                )
                .await?;
            saga.compensate_with(
                "insert_breaks",
                Compensation::DeleteRows {
                    table: tables::SHIFT_BREAKS,
                    ids: row_ids(&inserted),
                },
            );
        }

        if !req.tag_ids.is_empty() {
            let tag_rows = req.tag_ids.iter().map(|t| tag_row(shift.id, *t)).collect();
            let inserted = saga
                .run(
                    "insert_tags",
                    store.insert(tables::SHIFT_TAG_ASSIGNMENTS, Value::Array(tag_rows)),
                )
                .await?;
            saga.compensate_with(
                "insert_tags",
                Compensation::DeleteRows {
                    table: tables::SHIFT_TAG_ASSIGNMENTS,
                    ids: row_ids(&inserted),
                },
            );
        }

        let mut recurring_count = 0;
        if let (Some(pattern), Some(group_id)) = (&req.recurrence, shift.recurrence_group_id) {
            let options = self.scheduler.options();
            let limits = RecurrenceLimits {
                max_instances: options.max_recurrence_instances,
                horizon_weeks: options.recurrence_horizon_weeks,
            };
            let instances = saga
                .check(
                    "insert_recurring_shifts",
                    generate_recurring_instances(&shift, pattern, user.id, &limits),
                )
                .await?;

            if !instances.is_empty() {
                let payload = saga
                    .check(
                        "insert_recurring_shifts",
                        serde_json::to_value(&instances).map_err(Error::from),
                    )
                    .await?;
                let inserted = saga
                    .run("insert_recurring_shifts", store.insert(tables::SHIFTS, payload))
                    .await?;
                saga.compensate_with(
                    "insert_recurring_shifts",
                    Compensation::DeleteRows {
                        table: tables::SHIFTS,
                        ids: row_ids(&inserted),
                    },
                );
                recurring_count = inserted.len();

                if !req.breaks.is_empty() {
                    let query = Query::new()
                        .select("id")
                        .eq("recurrence_group_id", group_id)
                        .neq("id", shift.id);
                    let siblings = saga
                        .run("load_recurring_shifts", store.select(tables::SHIFTS, &query))
                        .await?;
                    let break_rows: Vec<Value> = row_uuids(&siblings)
                        .into_iter()
                        .flat_map(|id| {
                            req.breaks
                                .iter()
                                .enumerate()
                                .map(move |(i, b)| b.row_for(id, i))
                        })
                        .collect();
                    if !break_rows.is_empty() {
                        let copied = saga
                            .run(
                                "copy_recurring_breaks",
                                store.insert(tables::SHIFT_BREAKS, Value::Array(break_rows)),
                            )
                            .await?;
                        saga.compensate_with(
                            "copy_recurring_breaks",
                            Compensation::DeleteRows {
                                table: tables::SHIFT_BREAKS,
                                ids: row_ids(&copied),
                            },
                        );
                    }
                }
            }
        }

        if let Some(name) = req.save_as_template.as_deref().map(str::trim) {
            if !name.is_empty() {
                let template = json!({
                    "shop_id": ctx.shop_id,
                    "name": name,
                    "position_id": shift.position_id,
                    "start_time": local_time(shift.start_time, &ctx.timezone),
                    "end_time": local_time(shift.end_time, &ctx.timezone),
                    "break_minutes": shift.break_minutes,
                });
                saga.run("save_template", store.insert(tables::SHIFT_TEMPLATES, template))
                    .await?;
                self.scheduler
                    .invalidate(CacheKey::shop(CacheScope::Templates, ctx.shop_id));
            }
        }

        info!(
            shop_id = %ctx.shop_id,
            shift_id = %shift.id,
            recurring_count,
            "created shift"
        );
        self.scheduler
            .invalidate(CacheKey::shop(CacheScope::Shifts, ctx.shop_id));

        Ok(CreatedShift {
            shift,
            recurring_count,
        })
    }

    /// Patch one shift. Breaks and tags, when present, replace the stored
    /// collections wholesale; an empty list clears them.
    pub async fn update_shift(&self, id: Uuid, update: ShiftUpdate) -> Result<Shift> {
        self.scheduler.require_user().await?;
        let current = self.get_shift(id).await?;

        Self::validate_times(
            update.start_time.unwrap_or(current.start_time),
            update.end_time.unwrap_or(current.end_time),
        )?;
        if let Patch::Set(notes) = &update.notes {
            self.validate_notes(Some(notes))?;
        }
        if let Some(breaks) = &update.breaks {
            Self::validate_breaks(breaks)?;
        }

        let shift = self.apply_update(&current, &update).await?;
        self.scheduler
            .invalidate(CacheKey::shop(CacheScope::Shifts, current.shop_id));
        Ok(shift)
    }

    /// Same as `update_shift`, but the shift always ends up a draft
    pub async fn save_and_unpublish(&self, id: Uuid, mut update: ShiftUpdate) -> Result<Shift> {
        update.status = Some(ShiftStatus::Draft);
        self.update_shift(id, update).await
    }

    async fn apply_update(&self, current: &Shift, update: &ShiftUpdate) -> Result<Shift> {
        let store = self.scheduler.store();
        let by_id = Query::new().eq("id", current.id);
        let mut saga = Saga::new(store, "update_shift");

        let row = update.to_row();
        let mut updated = Vec::new();
        if !row.is_empty() {
            let snapshot = serde_json::to_value(current)?;
            updated = saga
                .run(
                    "update_shift",
                    store.update(tables::SHIFTS, &by_id, Value::Object(row)),
                )
                .await?;
            saga.compensate_with(
                "update_shift",
                Compensation::RestoreRows {
                    table: tables::SHIFTS,
                    rows: vec![snapshot],
                },
            );
        }

        if let Some(breaks) = &update.breaks {
            let by_shift = Query::new().eq("shift_id", current.id);
            let removed = saga
                .run("delete_breaks", store.delete(tables::SHIFT_BREAKS, &by_shift))
                .await?;
            saga.compensate_with(
                "delete_breaks",
                Compensation::InsertRows {
                    table: tables::SHIFT_BREAKS,
                    rows: removed,
                },
            );

            if !breaks.is_empty() {
                let rows = breaks
                    .iter()
                    .enumerate()
                    .map(|(i, b)| b.row_for(current.id, i))
                    .collect();
                let inserted = saga
                    .run(
                        "insert_breaks",
                        store.insert(tables::SHIFT_BREAKS, Value::Array(rows)),
                    )
                    .await?;
                saga.compensate_with(
                    "insert_breaks",
                    Compensation::DeleteRows {
                        table: tables::SHIFT_BREAKS,
                        ids: row_ids(&inserted),
                    },
                );
            }
        }

        if let Some(tag_ids) = &update.tag_ids {
            let by_shift = Query::new().eq("shift_id", current.id);
            let removed = saga
                .run(
                    "delete_tags",
                    store.delete(tables::SHIFT_TAG_ASSIGNMENTS, &by_shift),
                )
                .await?;
            saga.compensate_with(
                "delete_tags",
                Compensation::InsertRows {
                    table: tables::SHIFT_TAG_ASSIGNMENTS,
                    rows: removed,
                },
            );

            if !tag_ids.is_empty() {
                let rows = tag_ids.iter().map(|t| tag_row(current.id, *t)).collect();
                let inserted = saga
                    .run(
                        "insert_tags",
                        store.insert(tables::SHIFT_TAG_ASSIGNMENTS, Value::Array(rows)),
                    )
                    .await?;
                saga.compensate_with(
                    "insert_tags",
                    Compensation::DeleteRows {
                        table: tables::SHIFT_TAG_ASSIGNMENTS,
                        ids: row_ids(&inserted),
                    },
                );
            }
        }

        debug!(shift_id = %current.id, journal = ?saga.journal(), "updated shift");
        match first_row(updated)? {
            Some(shift) => Ok(shift),
            None => self.get_shift(current.id).await,
        }
    }

    /// Delete a shift; related rows follow the store's own referential rules
    pub async fn delete_shift(&self, id: Uuid) -> Result<()> {
        self.scheduler.require_user().await?;
        let removed = self
            .scheduler
            .store()
            .delete(tables::SHIFTS, &Query::new().eq("id", id))
            .await?;
        if let Some(shop_id) = removed
            .first()
            .and_then(|row| row.get("shop_id"))
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok())
        {
            self.scheduler
                .invalidate(CacheKey::shop(CacheScope::Shifts, shop_id));
        }
        Ok(())
    }

    pub async fn publish_shifts(&self, ids: &[Uuid]) -> Result<usize> {
        self.set_status(ids, ShiftStatus::Published).await
    }

    pub async fn unpublish_shifts(&self, ids: &[Uuid]) -> Result<usize> {
        self.set_status(ids, ShiftStatus::Draft).await
    }

    async fn set_status(&self, ids: &[Uuid], status: ShiftStatus) -> Result<usize> {
        self.scheduler.require_user().await?;
        if ids.is_empty() {
            return Ok(0);
        }
        let rows = self
            .scheduler
            .store()
            .update(
                tables::SHIFTS,
                &Query::new().in_list("id", ids),
                json!({ "status": status }),
            )
            .await?;
        debug!(count = rows.len(), status = status.as_str(), "changed shift status");
        self.scheduler.invalidate(CacheKey::scope(CacheScope::Shifts));
        Ok(rows.len())
    }

    /// Give a shift to `user_id`, closing it
    pub async fn assign_shift(&self, id: Uuid, user_id: Uuid) -> Result<Shift> {
        self.set_assignee(id, Some(user_id)).await
    }

    /// Take the assignee off a shift, opening it
    pub async fn unassign_shift(&self, id: Uuid) -> Result<Shift> {
        self.set_assignee(id, None).await
    }

    async fn set_assignee(&self, id: Uuid, user_id: Option<Uuid>) -> Result<Shift> {
        self.scheduler.require_user().await?;
        let rows = self
            .scheduler
            .store()
            .update(
                tables::SHIFTS,
                &Query::new().eq("id", id),
                json!({ "user_id": user_id, "is_open": user_id.is_none() }),
            )
            .await?;
        let shift: Shift = first_row(rows)?.ok_or_else(|| Error::not_found("Shift not found"))?;
        self.scheduler
            .invalidate(CacheKey::shop(CacheScope::Shifts, shift.shop_id));
        Ok(shift)
    }

    /// Apply one patch to many shifts of the shop; returns how many changed.
    ///
    /// Time-of-day edits keep each shift's local date. An end time that is not
    /// after the new start moves to the next local day. All new times are
    /// checked before anything is written.
    pub async fn bulk_update_shifts(
        &self,
        ctx: &ShopContext,
        ids: &[Uuid],
        patch: &BulkShiftPatch,
    ) -> Result<usize> {
        self.scheduler.require_user().await?;
        if ids.is_empty() || patch.is_empty() {
            return Ok(0);
        }

        let store = self.scheduler.store();
        let scoped = Query::new().eq("shop_id", ctx.shop_id).in_list("id", ids);

        if !patch.changes_times() {
            let rows = store
                .update(tables::SHIFTS, &scoped, Value::Object(patch.shared_row()))
                .await?;
            self.scheduler
                .invalidate(CacheKey::shop(CacheScope::Shifts, ctx.shop_id));
            return Ok(rows.len());
        }

        let current: Vec<Shift> = from_rows(store.select(tables::SHIFTS, &scoped).await?)?;
        let tz = ctx.timezone;
        let mut planned = Vec::with_capacity(current.len());
        for shift in &current {
            let date = ctx.local_date(shift.start_time);
            let start = match patch.start_time_of_day {
                Some(time) => localize(&tz, date.and_time(time)),
                None => shift.start_time,
            };
            let end = match patch.end_time_of_day {
                Some(time) => {
                    let same_day = localize(&tz, date.and_time(time));
                    if same_day <= start {
                        localize(&tz, (date + Duration::days(1)).and_time(time))
                    } else {
                        same_day
                    }
                }
                None => shift.end_time,
            };
            Self::validate_times(start, end)?;

            let mut row = patch.shared_row();
            row.insert("start_time".to_string(), json!(start));
            row.insert("end_time".to_string(), json!(end));
            planned.push((shift.id, serde_json::to_value(shift)?, row));
        }

        let mut saga = Saga::new(store, "bulk_update_shifts");
        for (id, snapshot, row) in planned {
            saga.run(
                "update_shift",
                store.update(tables::SHIFTS, &Query::new().eq("id", id), Value::Object(row)),
            )
            .await?;
            saga.compensate_with(
                "update_shift",
                Compensation::RestoreRows {
                    table: tables::SHIFTS,
                    rows: vec![snapshot],
                },
            );
        }

        info!(shop_id = %ctx.shop_id, count = current.len(), "bulk updated shifts");
        self.scheduler
            .invalidate(CacheKey::shop(CacheScope::Shifts, ctx.shop_id));
        Ok(current.len())
    }

    /// Delete many shifts of the shop; returns how many were removed
    pub async fn bulk_delete_shifts(&self, ctx: &ShopContext, ids: &[Uuid]) -> Result<usize> {
        self.scheduler.require_user().await?;
        if ids.is_empty() {
            return Ok(0);
        }
        let rows = self
            .scheduler
            .store()
            .delete(
                tables::SHIFTS,
                &Query::new().eq("shop_id", ctx.shop_id).in_list("id", ids),
            )
            .await?;
        info!(shop_id = %ctx.shop_id, count = rows.len(), "bulk deleted shifts");
        self.scheduler
            .invalidate(CacheKey::shop(CacheScope::Shifts, ctx.shop_id));
        Ok(rows.len())
    }

    /// Copy the local week containing `source_date` into each of the next
    /// `weeks` weeks, with breaks and tags.
    pub async fn copy_week_forward(
        &self,
        ctx: &ShopContext,
        source_date: NaiveDate,
        weeks: u32,
    ) -> Result<WeekCopyReport> {
        let user = self.scheduler.require_user().await?;
        let options = self.scheduler.options();

        if weeks < 1 || weeks > options.max_copy_weeks {
            return Err(Error::validation(format!(
                "Weeks to copy must be between 1 and {}",
                options.max_copy_weeks
            )));
        }

        let source = self.load_week(ctx, source_date).await?;
        if source.is_empty() {
            return Err(Error::validation("No shifts found in the source week"));
        }
        if source.len() > options.max_copy_source_shifts {
            return Err(Error::validation(format!(
                "The source week has more than {} shifts",
                options.max_copy_source_shifts
            )));
        }

        let store = self.scheduler.store();
        let source_ids: Vec<Uuid> = source.iter().map(|s| s.id).collect();
        let breaks: Vec<ShiftBreak> = from_rows(
            store
                .select(
                    tables::SHIFT_BREAKS,
                    &Query::new()
                        .in_list("shift_id", &source_ids)
                        .order("sort_order", SortOrder::Ascending),
                )
                .await?,
        )?;
        let tags: Vec<ShiftTagAssignment> = from_rows(
            store
                .select(
                    tables::SHIFT_TAG_ASSIGNMENTS,
                    &Query::new().in_list("shift_id", &source_ids),
                )
                .await?,
        )?;

        let plan = plan_week_copy(&source, weeks, user.id);
        let payload = plan
            .iter()
            .map(|copy| serde_json::to_value(&copy.shift))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut saga = Saga::new(store, "copy_week_forward");
        let inserted = saga
            .run("insert_copies", store.insert(tables::SHIFTS, Value::Array(payload)))
            .await?;
        saga.compensate_with(
            "insert_copies",
            Compensation::DeleteRows {
                table: tables::SHIFTS,
                ids: row_ids(&inserted),
            },
        );

        let returned = inserted.len();
        let new_ids = match from_rows::<InsertedCopy>(inserted)
            .map(|rows| match_inserted_copies(&plan, rows))
        {
            Ok(Some(ids)) => ids,
            Ok(None) => {
                let cause = Error::store(format!(
                    "Expected {} copied shifts, the store returned {}",
                    plan.len(),
                    returned
                ));
                return Err(saga.abort("insert_copies", cause).await);
            }
            Err(e) => return Err(saga.abort("insert_copies", e).await),
        };

        let mut break_rows = Vec::new();
        let mut tag_rows = Vec::new();
        for (copy, new_id) in plan.iter().zip(&new_ids) {
            break_rows.extend(
                breaks
                    .iter()
                    .filter(|b| b.shift_id == copy.source_id)
                    .map(|b| b.row_for(*new_id)),
            );
            tag_rows.extend(
                tags.iter()
                    .filter(|t| t.shift_id == copy.source_id)
                    .map(|t| tag_row(*new_id, t.tag_id)),
            );
        }

        let breaks_copied = break_rows.len();
        if !break_rows.is_empty() {
            let copied = saga
                .run(
                    "copy_breaks",
                    store.insert(tables::SHIFT_BREAKS, Value::Array(break_rows)),
                )
                .await?;
            saga.compensate_with(
                "copy_breaks",
                Compensation::DeleteRows {
                    table: tables::SHIFT_BREAKS,
                    ids: row_ids(&copied),
                },
            );
        }

        let tags_copied = tag_rows.len();
        if !tag_rows.is_empty() {
            saga.run(
                "copy_tags",
                store.insert(tables::SHIFT_TAG_ASSIGNMENTS, Value::Array(tag_rows)),
            )
            .await?;
        }

        let first_week = week_start(source_date) + Duration::weeks(1);
        let last_day = week_start(source_date) + Duration::weeks(i64::from(weeks) + 1) - Duration::days(1);
        info!(
            shop_id = %ctx.shop_id,
            source_shifts = source.len(),
            weeks,
            created = new_ids.len(),
            "copied week forward"
        );
        self.scheduler.invalidate(
            CacheKey::shop(CacheScope::Shifts, ctx.shop_id).with_range(first_week, last_day),
        );

        Ok(WeekCopyReport {
            created: new_ids.len(),
            weeks,
            source_shifts: source.len(),
            breaks_copied,
            tags_copied,
        })
    }

    /// Apply a drag-and-drop; `None` when the drop changes nothing
    pub async fn move_shift(
        &self,
        ctx: &ShopContext,
        id: Uuid,
        target: DropTarget,
    ) -> Result<Option<Shift>> {
        let shift = self.get_shift(id).await?;
        match resolve_drop(&shift, &target, &ctx.timezone) {
            Some(update) => self.update_shift(id, update).await.map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, TimeZone};
    use shopshift_client::{AuthUser, MemoryStore, StaticIdentity};
    use std::sync::Arc;

    fn scheduler(store: &MemoryStore) -> Scheduler {
        Scheduler::from_parts(
            Arc::new(store.clone()),
            Arc::new(StaticIdentity::signed_in(AuthUser::new(Uuid::new_v4()))),
        )
    }

    fn seed_shift(store: &MemoryStore, shop_id: Uuid, start: DateTime<Utc>, hours: i64) -> Uuid {
        let id = Uuid::new_v4();
        store.seed(
            tables::SHIFTS,
            vec![json!({
                "id": id,
                "shop_id": shop_id,
                "user_id": null,
                "start_time": start,
                "end_time": start + Duration::hours(hours),
                "break_minutes": 0,
                "status": "published",
                "is_open": true,
            })],
        );
        id
    }

    #[tokio::test]
    async fn create_rejects_inverted_times_before_writing() {
        let store = MemoryStore::new();
        let scheduler = scheduler(&store);
        let ctx = ShopContext::new(Uuid::new_v4(), chrono_tz::UTC);
        let start = Utc.with_ymd_and_hms(2024, 4, 1, 9, 0, 0).unwrap();

        let err = scheduler
            .shifts()
            .create_shift(&ctx, CreateShiftRequest::new(start, start))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Shift must end after it starts");
        assert!(store.rows(tables::SHIFTS).is_empty());
    }

    #[tokio::test]
    async fn create_saves_local_template() {
        let store = MemoryStore::new();
        let scheduler = scheduler(&store);
        let ctx = ShopContext::new(Uuid::new_v4(), chrono_tz::America::Chicago);
        // 09:00-15:00 CDT
        let start = Utc.with_ymd_and_hms(2024, 6, 4, 14, 0, 0).unwrap();
        let mut req = CreateShiftRequest::new(start, start + Duration::hours(6));
        req.break_minutes = Some(20);
        req.save_as_template = Some(" Opening ".to_string());

        let created = scheduler.shifts().create_shift(&ctx, req).await.unwrap();
        assert_eq!(created.shift.status, ShiftStatus::Draft);
        assert!(created.shift.is_open);
        assert_eq!(created.shift.break_minutes, 20);

        let templates = store.rows(tables::SHIFT_TEMPLATES);
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0]["name"], "Opening");
        assert_eq!(templates[0]["start_time"], json!(NaiveTime::from_hms_opt(9, 0, 0).unwrap()));
        assert_eq!(templates[0]["end_time"], json!(NaiveTime::from_hms_opt(15, 0, 0).unwrap()));
    }

    #[tokio::test]
    async fn bulk_time_edit_keeps_local_date_and_rolls_overnight() {
        let store = MemoryStore::new();
        let scheduler = scheduler(&store);
        let shop_id = Uuid::new_v4();
        let ctx = ShopContext::new(shop_id, chrono_tz::America::New_York);
        // 2024-05-06 10:00 EDT
        let id = seed_shift(&store, shop_id, Utc.with_ymd_and_hms(2024, 5, 6, 14, 0, 0).unwrap(), 4);

        let patch: BulkShiftPatch = serde_json::from_value(json!({
            "start_time_of_day": "22:00",
            "end_time_of_day": "06:00"
        }))
        .unwrap();
        let count = scheduler
            .shifts()
            .bulk_update_shifts(&ctx, &[id], &patch)
            .await
            .unwrap();
        assert_eq!(count, 1);

        let shift = scheduler.shifts().get_shift(id).await.unwrap();
        assert_eq!(shift.start_time, Utc.with_ymd_and_hms(2024, 5, 7, 2, 0, 0).unwrap());
        assert_eq!(shift.end_time, Utc.with_ymd_and_hms(2024, 5, 7, 10, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn bulk_start_past_end_is_rejected_for_all() {
        let store = MemoryStore::new();
        let scheduler = scheduler(&store);
        let shop_id = Uuid::new_v4();
        let ctx = ShopContext::new(shop_id, chrono_tz::UTC);
        let early = seed_shift(&store, shop_id, Utc.with_ymd_and_hms(2024, 5, 6, 8, 0, 0).unwrap(), 10);
        let short = seed_shift(&store, shop_id, Utc.with_ymd_and_hms(2024, 5, 7, 8, 0, 0).unwrap(), 2);

        let patch: BulkShiftPatch =
            serde_json::from_value(json!({ "start_time_of_day": "12:00" })).unwrap();
        let err = scheduler
            .shifts()
            .bulk_update_shifts(&ctx, &[early, short], &patch)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let untouched = scheduler.shifts().get_shift(early).await.unwrap();
        assert_eq!(untouched.start_time, Utc.with_ymd_and_hms(2024, 5, 6, 8, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn bulk_delete_is_scoped_to_shop() {
        let store = MemoryStore::new();
        let scheduler = scheduler(&store);
        let shop_id = Uuid::new_v4();
        let start = Utc.with_ymd_and_hms(2024, 5, 6, 8, 0, 0).unwrap();
        let mine = seed_shift(&store, shop_id, start, 4);
        let theirs = seed_shift(&store, Uuid::new_v4(), start, 4);

        let ctx = ShopContext::new(shop_id, chrono_tz::UTC);
        let removed = scheduler
            .shifts()
            .bulk_delete_shifts(&ctx, &[mine, theirs])
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(scheduler.shifts().get_shift(theirs).await.is_ok());
    }

    #[tokio::test]
    async fn copy_week_rejects_out_of_range_counts() {
        let store = MemoryStore::new();
        let scheduler = scheduler(&store);
        let ctx = ShopContext::new(Uuid::new_v4(), chrono_tz::UTC);
        let date = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();

        for weeks in [0, 13] {
            let err = scheduler
                .shifts()
                .copy_week_forward(&ctx, date, weeks)
                .await
                .unwrap_err();
            assert_eq!(err.to_string(), "Weeks to copy must be between 1 and 12");
        }

        let err = scheduler
            .shifts()
            .copy_week_forward(&ctx, date, 2)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "No shifts found in the source week");
    }

    #[tokio::test]
    async fn move_to_same_cell_writes_nothing() {
        let store = MemoryStore::new();
        let scheduler = scheduler(&store);
        let shop_id = Uuid::new_v4();
        let ctx = ShopContext::new(shop_id, chrono_tz::UTC);
        let id = seed_shift(&store, shop_id, Utc.with_ymd_and_hms(2024, 5, 6, 8, 0, 0).unwrap(), 4);

        let moved = scheduler
            .shifts()
            .move_shift(
                &ctx,
                id,
                DropTarget::Open {
                    date: NaiveDate::from_ymd_opt(2024, 5, 6).unwrap(),
                },
            )
            .await
            .unwrap();
        assert!(moved.is_none());
    }

    #[tokio::test]
    async fn anonymous_move_is_refused() {
        let store = MemoryStore::new();
        let scheduler = Scheduler::from_parts(
            Arc::new(store.clone()),
            Arc::new(StaticIdentity::anonymous()),
        );
        let shop_id = Uuid::new_v4();
        let ctx = ShopContext::new(shop_id, chrono_tz::UTC);
        let start = Utc.with_ymd_and_hms(2024, 5, 6, 8, 0, 0).unwrap();
        let id = seed_shift(&store, shop_id, start, 4);

        let err = scheduler
            .shifts()
            .move_shift(
                &ctx,
                id,
                DropTarget::Open {
                    date: NaiveDate::from_ymd_opt(2024, 5, 7).unwrap(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unauthorized));

        let shift = scheduler.shifts().get_shift(id).await.unwrap();
        assert_eq!(shift.start_time, start);
    }
}
