use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use shopshift_client::Query;
use tracing::info;
use uuid::Uuid;

use crate::cache::{CacheKey, CacheScope};
use crate::error::{Error, Result};
use crate::models::{first_row, from_rows, tables, RequestStatus, ShopMember, ShopRole};
use crate::saga::{Compensation, Saga};
use crate::services::{review, timestamp};
use crate::Scheduler;

/// What archiving a member cleaned up
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ArchiveReport {
    pub deleted_shifts: usize,
    pub cancelled_swaps: usize,
    pub denied_claims: usize,
}

/// Rows as they were before a pending-only status change
fn back_to_pending(rows: Vec<Value>) -> Vec<Value> {
    rows.into_iter()
        .map(|mut row| {
            if let Value::Object(object) = &mut row {
                object.insert("status".to_string(), json!(RequestStatus::Pending));
                object.insert("reviewed_by".to_string(), Value::Null);
                object.insert("reviewed_at".to_string(), Value::Null);
            }
            row
        })
        .collect()
}

/// Shop membership
pub struct MemberService<'a> {
    scheduler: &'a Scheduler,
}

impl<'a> MemberService<'a> {
    pub(crate) fn new(scheduler: &'a Scheduler) -> Self {
        Self { scheduler }
    }

    pub async fn get_member(&self, id: Uuid) -> Result<ShopMember> {
        let rows = self
            .scheduler
            .store()
            .select(tables::SHOP_MEMBERS, &Query::new().eq("id", id))
            .await?;
        first_row(rows)?.ok_or_else(|| Error::not_found("Member not found"))
    }

    pub async fn list_members(&self, shop_id: Uuid, include_archived: bool) -> Result<Vec<ShopMember>> {
        let mut query = Query::new().eq("shop_id", shop_id);
        if !include_archived {
            query = query.eq("is_active", true);
        }
        let rows = self
            .scheduler
            .store()
            .select(tables::SHOP_MEMBERS, &query)
            .await?;
        from_rows(rows)
    }

    /// Deactivate a member and clear their future commitments at the shop.
    ///
    /// Past shifts stay for payroll. Future shifts (starting after now) are
    /// deleted last, so an earlier failure never loses a shift.
    pub async fn archive_member(&self, id: Uuid) -> Result<ArchiveReport> {
        let user = self.scheduler.require_user().await?;
        let member = self.get_member(id).await?;
        if member.role == ShopRole::Owner {
            return Err(Error::validation("Cannot archive a shop owner"));
        }
        if !member.is_active {
            return Err(Error::validation("Member is already archived"));
        }

        let store = self.scheduler.store();
        let mut saga = Saga::new(store, "archive_member");
        let pending = RequestStatus::Pending.as_str();

        let snapshot = serde_json::to_value(&member)?;
        saga.run(
            "deactivate_member",
            store.update(
                tables::SHOP_MEMBERS,
                &Query::new().eq("id", id),
                json!({ "is_active": false }),
            ),
        )
        .await?;
        saga.compensate_with(
            "deactivate_member",
            Compensation::RestoreRows {
                table: tables::SHOP_MEMBERS,
                rows: vec![snapshot],
            },
        );

        let mut cancelled_swaps = 0;
        for (step, column) in [
            ("cancel_requested_swaps", "requester_id"),
            ("cancel_targeted_swaps", "target_id"),
        ] {
            let query = Query::new()
                .eq("shop_id", member.shop_id)
                .eq(column, member.user_id)
                .eq("status", pending);
            let cancelled = saga
                .run(
                    step,
                    store.update(
                        tables::SWAP_REQUESTS,
                        &query,
                        json!({ "status": RequestStatus::Cancelled }),
                    ),
                )
                .await?;
            cancelled_swaps += cancelled.len();
            saga.compensate_with(
                step,
                Compensation::RestoreRows {
                    table: tables::SWAP_REQUESTS,
                    rows: back_to_pending(cancelled),
                },
            );
        }

        let claims = Query::new()
            .eq("shop_id", member.shop_id)
            .eq("user_id", member.user_id)
            .eq("status", pending);
        let denied = saga
            .run(
                "deny_claims",
                store.update(
                    tables::OPEN_SHIFT_CLAIMS,
                    &claims,
                    Value::Object(review(RequestStatus::Denied, user.id)),
                ),
            )
            .await?;
        let denied_claims = denied.len();
        saga.compensate_with(
            "deny_claims",
            Compensation::RestoreRows {
                table: tables::OPEN_SHIFT_CLAIMS,
                rows: back_to_pending(denied),
            },
        );

        let future = Query::new()
            .eq("user_id", member.user_id)
            .eq("shop_id", member.shop_id)
            .gt("start_time", timestamp(Utc::now()));
        let deleted = saga
            .run("delete_future_shifts", store.delete(tables::SHIFTS, &future))
            .await?;

        let report = ArchiveReport {
            deleted_shifts: deleted.len(),
            cancelled_swaps,
            denied_claims,
        };
        info!(
            member_id = %id,
            shop_id = %member.shop_id,
            deleted_shifts = report.deleted_shifts,
            cancelled_swaps = report.cancelled_swaps,
            denied_claims = report.denied_claims,
            "archived member"
        );
        for scope in [
            CacheScope::Members,
            CacheScope::Shifts,
            CacheScope::Swaps,
            CacheScope::Claims,
        ] {
            self.scheduler
                .invalidate(CacheKey::shop(scope, member.shop_id));
        }
        Ok(report)
    }

    /// Reactivate an archived member. Deleted shifts are not brought back.
    pub async fn restore_member(&self, id: Uuid) -> Result<ShopMember> {
        self.scheduler.require_user().await?;
        let member = self.get_member(id).await?;
        if member.is_active {
            return Err(Error::validation("Member is already active"));
        }

        let rows = self
            .scheduler
            .store()
            .update(
                tables::SHOP_MEMBERS,
                &Query::new().eq("id", id),
                json!({ "is_active": true }),
            )
            .await?;
        self.scheduler
            .invalidate(CacheKey::shop(CacheScope::Members, member.shop_id));
        first_row(rows)?.ok_or_else(|| Error::not_found("Member not found"))
    }

    /// Move a member into a department, or out of any with `None`
    pub async fn assign_member_department(
        &self,
        id: Uuid,
        department_id: Option<Uuid>,
    ) -> Result<ShopMember> {
        self.scheduler.require_user().await?;
        let rows = self
            .scheduler
            .store()
            .update(
                tables::SHOP_MEMBERS,
                &Query::new().eq("id", id),
                json!({ "department_id": department_id }),
            )
            .await?;
        let member: ShopMember =
            first_row(rows)?.ok_or_else(|| Error::not_found("Member not found"))?;
        self.scheduler
            .invalidate(CacheKey::shop(CacheScope::Members, member.shop_id));
        Ok(member)
    }
}
