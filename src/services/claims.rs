use serde_json::{json, Value};
use shopshift_client::Query;
use tracing::info;
use uuid::Uuid;

use crate::cache::{CacheKey, CacheScope};
use crate::error::{Error, Result};
use crate::models::{first_row, tables, OpenShiftClaim, RequestStatus};
use crate::saga::{Compensation, Saga};
use crate::services::{pending_by_id, review};
use crate::Scheduler;

const ALREADY_REVIEWED: &str = "Claim has already been reviewed";

/// Requests to take open shifts
pub struct ClaimService<'a> {
    scheduler: &'a Scheduler,
}

impl<'a> ClaimService<'a> {
    pub(crate) fn new(scheduler: &'a Scheduler) -> Self {
        Self { scheduler }
    }

    pub async fn get_claim(&self, id: Uuid) -> Result<OpenShiftClaim> {
        let rows = self
            .scheduler
            .store()
            .select(tables::OPEN_SHIFT_CLAIMS, &Query::new().eq("id", id))
            .await?;
        first_row(rows)?.ok_or_else(|| Error::not_found("Claim not found"))
    }

    async fn pending_claim(&self, id: Uuid) -> Result<OpenShiftClaim> {
        let claim = self.get_claim(id).await?;
        if claim.status.is_terminal() {
            return Err(Error::validation(ALREADY_REVIEWED));
        }
        Ok(claim)
    }

    /// File a pending claim on an open shift for the signed-in user
    pub async fn claim_open_shift(&self, shop_id: Uuid, shift_id: Uuid) -> Result<OpenShiftClaim> {
        let user = self.scheduler.require_user().await?;
        let shift = self.scheduler.shifts().get_shift(shift_id).await?;
        if !shift.is_open {
            return Err(Error::validation("This shift is no longer open"));
        }

        let rows = self
            .scheduler
            .store()
            .insert(
                tables::OPEN_SHIFT_CLAIMS,
                json!({
                    "shop_id": shop_id,
                    "shift_id": shift_id,
                    "user_id": user.id,
                    "status": RequestStatus::Pending,
                }),
            )
            .await?;
        self.scheduler
            .invalidate(CacheKey::shop(CacheScope::Claims, shop_id));
        first_row(rows)?.ok_or_else(|| Error::store("Claim insert returned no row"))
    }

    /// Approve a claim: the claimant gets the shift and every other pending
    /// claim on it is denied. The three writes unwind together on failure.
    pub async fn approve_claim(&self, id: Uuid) -> Result<()> {
        let user = self.scheduler.require_user().await?;
        let claim = self.pending_claim(id).await?;
        let shift = self.scheduler.shifts().get_shift(claim.shift_id).await?;

        let claim_snapshot = serde_json::to_value(&claim)?;
        let shift_snapshot = serde_json::to_value(&shift)?;

        let store = self.scheduler.store();
        let mut saga = Saga::new(store, "approve_claim");

        let approved = saga
            .run(
                "approve_claim",
                store.update(
                    tables::OPEN_SHIFT_CLAIMS,
                    &pending_by_id(id),
                    Value::Object(review(RequestStatus::Approved, user.id)),
                ),
            )
            .await?;
        if approved.is_empty() {
            return Err(Error::validation(ALREADY_REVIEWED));
        }
        saga.compensate_with(
            "approve_claim",
            Compensation::RestoreRows {
                table: tables::OPEN_SHIFT_CLAIMS,
                rows: vec![claim_snapshot],
            },
        );

        let assigned = saga
            .run(
                "assign_shift",
                store.update(
                    tables::SHIFTS,
                    &Query::new().eq("id", claim.shift_id),
                    json!({ "user_id": claim.user_id, "is_open": false }),
                ),
            )
            .await?;
        if assigned.is_empty() {
            return Err(saga
                .abort("assign_shift", Error::not_found("Shift not found"))
                .await);
        }
        saga.compensate_with(
            "assign_shift",
            Compensation::RestoreRows {
                table: tables::SHIFTS,
                rows: vec![shift_snapshot],
            },
        );

        let siblings = Query::new()
            .eq("shift_id", claim.shift_id)
            .eq("status", RequestStatus::Pending.as_str())
            .neq("id", id);
        let denied = saga
            .run(
                "deny_other_claims",
                store.update(
                    tables::OPEN_SHIFT_CLAIMS,
                    &siblings,
                    Value::Object(review(RequestStatus::Denied, user.id)),
                ),
            )
            .await?;

        info!(
            claim_id = %id,
            shift_id = %claim.shift_id,
            denied = denied.len(),
            "approved open shift claim"
        );
        self.scheduler
            .invalidate(CacheKey::shop(CacheScope::Claims, claim.shop_id));
        self.scheduler
            .invalidate(CacheKey::shop(CacheScope::Shifts, claim.shop_id));
        Ok(())
    }

    pub async fn deny_claim(&self, id: Uuid) -> Result<()> {
        let user = self.scheduler.require_user().await?;
        let claim = self.pending_claim(id).await?;

        let rows = self
            .scheduler
            .store()
            .update(
                tables::OPEN_SHIFT_CLAIMS,
                &pending_by_id(id),
                Value::Object(review(RequestStatus::Denied, user.id)),
            )
            .await?;
        if rows.is_empty() {
            return Err(Error::validation(ALREADY_REVIEWED));
        }
        self.scheduler
            .invalidate(CacheKey::shop(CacheScope::Claims, claim.shop_id));
        Ok(())
    }
}
