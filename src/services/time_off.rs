use serde::Deserialize;
use serde_json::{json, Value};
use shopshift_client::{Query, SortOrder};
use tracing::info;
use uuid::Uuid;

use crate::cache::{CacheKey, CacheScope};
use crate::error::{Error, Result};
use crate::models::{
    first_row, from_rows, tables, NewNotification, NewTimeOffRequest, NotificationType, Profile,
    RequestStatus, ShopRole, TimeOffRequest,
};
use crate::services::{pending_by_id, review};
use crate::Scheduler;

const ALREADY_REVIEWED: &str = "Time off request has already been reviewed";

#[derive(Deserialize)]
struct MemberUser {
    user_id: Uuid,
}

/// Time-off requests and PTO adjustments
pub struct TimeOffService<'a> {
    scheduler: &'a Scheduler,
}

impl<'a> TimeOffService<'a> {
    pub(crate) fn new(scheduler: &'a Scheduler) -> Self {
        Self { scheduler }
    }

    pub async fn get_request(&self, id: Uuid) -> Result<TimeOffRequest> {
        let rows = self
            .scheduler
            .store()
            .select(tables::TIME_OFF_REQUESTS, &Query::new().eq("id", id))
            .await?;
        first_row(rows)?.ok_or_else(|| Error::not_found("Request not found"))
    }

    pub async fn list_requests(&self, shop_id: Uuid) -> Result<Vec<TimeOffRequest>> {
        let rows = self
            .scheduler
            .store()
            .select(
                tables::TIME_OFF_REQUESTS,
                &Query::new()
                    .eq("shop_id", shop_id)
                    .order("start_date", SortOrder::Descending),
            )
            .await?;
        from_rows(rows)
    }

    /// File a request for the signed-in user and tell the shop's active
    /// owners and managers about it
    pub async fn request_time_off(
        &self,
        shop_id: Uuid,
        request: NewTimeOffRequest,
    ) -> Result<TimeOffRequest> {
        let user = self.scheduler.require_user().await?;
        if request.end_date < request.start_date {
            return Err(Error::validation("Time off must end on or after its start date"));
        }
        if request.hours_requested <= 0.0 {
            return Err(Error::validation("Requested hours must be positive"));
        }

        let store = self.scheduler.store();
        let rows = store
            .insert(
                tables::TIME_OFF_REQUESTS,
                json!({
                    "shop_id": shop_id,
                    "user_id": user.id,
                    "start_date": request.start_date,
                    "end_date": request.end_date,
                    "hours_requested": request.hours_requested,
                    "reason": request.reason,
                    "status": RequestStatus::Pending,
                }),
            )
            .await?;
        let created: TimeOffRequest =
            first_row(rows)?.ok_or_else(|| Error::store("Time off insert returned no row"))?;

        let profile: Option<Profile> = first_row(
            store
                .select(tables::PROFILES, &Query::new().eq("id", user.id))
                .await?,
        )?;
        let name = profile
            .and_then(|p| p.full_name)
            .unwrap_or_else(|| "A team member".to_string());

        let admins: Vec<MemberUser> = from_rows(
            store
                .select(
                    tables::SHOP_MEMBERS,
                    &Query::new()
                        .select("user_id")
                        .eq("shop_id", shop_id)
                        .eq("is_active", true)
                        .in_list("role", [ShopRole::Owner.as_str(), ShopRole::Manager.as_str()]),
                )
                .await?,
        )?;

        let notifications = self.scheduler.notifications();
        let body = format!(
            "{} requested time off from {} to {}",
            name, request.start_date, request.end_date
        );
        for admin in admins {
            notifications
                .send(
                    NewNotification::new(
                        shop_id,
                        admin.user_id,
                        NotificationType::TimeOffRequested,
                        "Time Off Request",
                    )
                    .with_body(body.clone())
                    .with_data(json!({ "time_off_request_id": created.id })),
                )
                .await;
        }

        self.scheduler
            .invalidate(CacheKey::shop(CacheScope::TimeOff, shop_id));
        Ok(created)
    }

    async fn pending_request(&self, id: Uuid) -> Result<TimeOffRequest> {
        let request = self.get_request(id).await?;
        if request.status.is_terminal() {
            return Err(Error::validation(ALREADY_REVIEWED));
        }
        Ok(request)
    }

    async fn transition(&self, id: Uuid, patch: serde_json::Map<String, Value>) -> Result<()> {
        let rows = self
            .scheduler
            .store()
            .update(tables::TIME_OFF_REQUESTS, &pending_by_id(id), Value::Object(patch))
            .await?;
        if rows.is_empty() {
            return Err(Error::validation(ALREADY_REVIEWED));
        }
        Ok(())
    }

    pub async fn approve_time_off(&self, id: Uuid, is_paid: bool) -> Result<()> {
        let user = self.scheduler.require_user().await?;
        let request = self.pending_request(id).await?;

        let mut patch = review(RequestStatus::Approved, user.id);
        patch.insert("is_paid".to_string(), json!(is_paid));
        self.transition(id, patch).await?;

        let body = format!(
            "Your time off request for {} to {} has been approved ({})",
            request.start_date,
            request.end_date,
            if is_paid { "paid" } else { "unpaid" }
        );
        self.scheduler
            .notifications()
            .send(
                NewNotification::new(
                    request.shop_id,
                    request.user_id,
                    NotificationType::TimeOffApproved,
                    "Time Off Approved",
                )
                .with_body(body),
            )
            .await;

        info!(request_id = %id, is_paid, "approved time off");
        self.scheduler
            .invalidate(CacheKey::shop(CacheScope::TimeOff, request.shop_id));
        Ok(())
    }

    pub async fn deny_time_off(&self, id: Uuid, notes: Option<&str>) -> Result<()> {
        let user = self.scheduler.require_user().await?;
        let request = self.pending_request(id).await?;
        let notes = notes.map(str::trim).filter(|n| !n.is_empty());

        let mut patch = review(RequestStatus::Denied, user.id);
        patch.insert("reviewer_notes".to_string(), json!(notes));
        self.transition(id, patch).await?;

        let mut body = format!(
            "Your time off request for {} to {} has been denied",
            request.start_date, request.end_date
        );
        if let Some(notes) = notes {
            body.push_str(": ");
            body.push_str(notes);
        }
        self.scheduler
            .notifications()
            .send(
                NewNotification::new(
                    request.shop_id,
                    request.user_id,
                    NotificationType::TimeOffDenied,
                    "Time Off Denied",
                )
                .with_body(body),
            )
            .await;

        self.scheduler
            .invalidate(CacheKey::shop(CacheScope::TimeOff, request.shop_id));
        Ok(())
    }

    /// Withdraw one of the signed-in user's own pending requests
    pub async fn cancel_time_off(&self, id: Uuid) -> Result<()> {
        let user = self.scheduler.require_user().await?;
        let rows = self
            .scheduler
            .store()
            .update(
                tables::TIME_OFF_REQUESTS,
                &pending_by_id(id).eq("user_id", user.id),
                json!({ "status": RequestStatus::Cancelled }),
            )
            .await?;
        let cancelled: TimeOffRequest = first_row(rows)?
            .ok_or_else(|| Error::not_found("No pending request of yours with that id"))?;
        self.scheduler
            .invalidate(CacheKey::shop(CacheScope::TimeOff, cancelled.shop_id));
        Ok(())
    }

    /// Record a manual change to a member's PTO balance
    pub async fn adjust_pto_balance(
        &self,
        shop_id: Uuid,
        user_id: Uuid,
        hours: f64,
        reason: &str,
    ) -> Result<()> {
        let actor = self.scheduler.require_user().await?;
        if hours == 0.0 {
            return Err(Error::validation("Adjustment hours must not be zero"));
        }
        self.scheduler
            .store()
            .insert(
                tables::PTO_BALANCE_ADJUSTMENTS,
                json!({
                    "shop_id": shop_id,
                    "user_id": user_id,
                    "hours": hours,
                    "reason": reason,
                    "created_by": actor.id,
                }),
            )
            .await?;
        self.scheduler
            .invalidate(CacheKey::shop(CacheScope::TimeOff, shop_id));
        Ok(())
    }
}
