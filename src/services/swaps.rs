use serde_json::{json, Value};
use shopshift_client::Query;
use tracing::info;
use uuid::Uuid;

use crate::cache::{CacheKey, CacheScope};
use crate::error::{Error, Result};
use crate::models::{first_row, tables, NewSwapRequest, RequestStatus, Shift, SwapRequest};
use crate::saga::{Compensation, Saga};
use crate::services::{pending_by_id, review};
use crate::Scheduler;

const ALREADY_REVIEWED: &str = "Swap request has already been reviewed";

/// Shift swaps and give-away offers
pub struct SwapService<'a> {
    scheduler: &'a Scheduler,
}

impl<'a> SwapService<'a> {
    pub(crate) fn new(scheduler: &'a Scheduler) -> Self {
        Self { scheduler }
    }

    pub async fn get_swap(&self, id: Uuid) -> Result<SwapRequest> {
        let rows = self
            .scheduler
            .store()
            .select(tables::SWAP_REQUESTS, &Query::new().eq("id", id))
            .await?;
        first_row(rows)?.ok_or_else(|| Error::not_found("Swap not found"))
    }

    async fn pending_swap(&self, id: Uuid) -> Result<SwapRequest> {
        let swap = self.get_swap(id).await?;
        if swap.status.is_terminal() {
            return Err(Error::validation(ALREADY_REVIEWED));
        }
        Ok(swap)
    }

    /// File a swap as the signed-in user. Without a target it is an offer to
    /// give the shift up.
    pub async fn request_swap(&self, shop_id: Uuid, request: NewSwapRequest) -> Result<SwapRequest> {
        let user = self.scheduler.require_user().await?;
        let rows = self
            .scheduler
            .store()
            .insert(
                tables::SWAP_REQUESTS,
                json!({
                    "shop_id": shop_id,
                    "requester_shift_id": request.requester_shift_id,
                    "target_shift_id": request.target_shift_id,
                    "requester_id": user.id,
                    "target_id": request.target_id,
                    "reason": request.reason,
                    "status": RequestStatus::Pending,
                }),
            )
            .await?;
        self.scheduler
            .invalidate(CacheKey::shop(CacheScope::Swaps, shop_id));
        first_row(rows)?.ok_or_else(|| Error::store("Swap insert returned no row"))
    }

    /// Approve a swap. A bilateral swap exchanges the assignees of its two
    /// shifts; an offer only changes status.
    pub async fn approve_swap(&self, id: Uuid) -> Result<()> {
        let user = self.scheduler.require_user().await?;
        let swap = self.pending_swap(id).await?;

        let exchange = match swap.target_shift_id {
            Some(target_shift_id) if swap.is_bilateral() => {
                let shifts = self.scheduler.shifts();
                Some((
                    shifts.get_shift(swap.requester_shift_id).await?,
                    shifts.get_shift(target_shift_id).await?,
                ))
            }
            _ => None,
        };

        let store = self.scheduler.store();
        let mut saga = Saga::new(store, "approve_swap");
        let snapshot = serde_json::to_value(&swap)?;

        let approved = saga
            .run(
                "approve_swap",
                store.update(
                    tables::SWAP_REQUESTS,
                    &pending_by_id(id),
                    Value::Object(review(RequestStatus::Approved, user.id)),
                ),
            )
            .await?;
        if approved.is_empty() {
            return Err(Error::validation(ALREADY_REVIEWED));
        }
        saga.compensate_with(
            "approve_swap",
            Compensation::RestoreRows {
                table: tables::SWAP_REQUESTS,
                rows: vec![snapshot],
            },
        );

        if let Some((requester_shift, target_shift)) = exchange {
            Self::reassign(&mut saga, "reassign_requester_shift", &requester_shift, target_shift.user_id)
                .await?;
            Self::reassign(&mut saga, "reassign_target_shift", &target_shift, requester_shift.user_id)
                .await?;
        }

        info!(swap_id = %id, bilateral = swap.is_bilateral(), "approved swap");
        self.scheduler
            .invalidate(CacheKey::shop(CacheScope::Swaps, swap.shop_id));
        self.scheduler
            .invalidate(CacheKey::shop(CacheScope::Shifts, swap.shop_id));
        Ok(())
    }

    async fn reassign(
        saga: &mut Saga<'_>,
        step: &'static str,
        shift: &Shift,
        user_id: Option<Uuid>,
    ) -> Result<()> {
        let snapshot = serde_json::to_value(shift)?;
        let store = saga.store();
        let rows = saga
            .run(
                step,
                store.update(
                    tables::SHIFTS,
                    &Query::new().eq("id", shift.id),
                    json!({ "user_id": user_id, "is_open": user_id.is_none() }),
                ),
            )
            .await?;
        if rows.is_empty() {
            return Err(saga.abort(step, Error::not_found("Shift not found")).await);
        }
        saga.compensate_with(
            step,
            Compensation::RestoreRows {
                table: tables::SHIFTS,
                rows: vec![snapshot],
            },
        );
        Ok(())
    }

    pub async fn deny_swap(&self, id: Uuid) -> Result<()> {
        let user = self.scheduler.require_user().await?;
        let swap = self.pending_swap(id).await?;

        let rows = self
            .scheduler
            .store()
            .update(
                tables::SWAP_REQUESTS,
                &pending_by_id(id),
                Value::Object(review(RequestStatus::Denied, user.id)),
            )
            .await?;
        if rows.is_empty() {
            return Err(Error::validation(ALREADY_REVIEWED));
        }
        self.scheduler
            .invalidate(CacheKey::shop(CacheScope::Swaps, swap.shop_id));
        Ok(())
    }

    /// Withdraw a pending swap; only its requester may
    pub async fn cancel_swap(&self, id: Uuid) -> Result<()> {
        let user = self.scheduler.require_user().await?;
        let swap = self.get_swap(id).await?;
        if swap.requester_id != user.id {
            return Err(Error::validation(
                "Only the requester can cancel a swap request",
            ));
        }
        if swap.status.is_terminal() {
            return Err(Error::validation(ALREADY_REVIEWED));
        }

        let rows = self
            .scheduler
            .store()
            .update(
                tables::SWAP_REQUESTS,
                &pending_by_id(id).eq("requester_id", user.id),
                json!({ "status": RequestStatus::Cancelled }),
            )
            .await?;
        if rows.is_empty() {
            return Err(Error::validation(ALREADY_REVIEWED));
        }
        self.scheduler
            .invalidate(CacheKey::shop(CacheScope::Swaps, swap.shop_id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopshift_client::{AuthUser, MemoryStore, StaticIdentity};
    use std::sync::Arc;

    fn seed_swap(store: &MemoryStore, requester: Uuid) -> Uuid {
        let id = Uuid::new_v4();
        store.seed(
            tables::SWAP_REQUESTS,
            vec![json!({
                "id": id,
                "shop_id": Uuid::new_v4(),
                "requester_shift_id": Uuid::new_v4(),
                "requester_id": requester,
                "status": "pending",
            })],
        );
        id
    }

    #[tokio::test]
    async fn only_the_requester_may_cancel() {
        let store = MemoryStore::new();
        let me = Uuid::new_v4();
        let scheduler = Scheduler::from_parts(
            Arc::new(store.clone()),
            Arc::new(StaticIdentity::signed_in(AuthUser::new(me))),
        );

        let theirs = seed_swap(&store, Uuid::new_v4());
        let err = scheduler.swaps().cancel_swap(theirs).await.unwrap_err();
        assert_eq!(err.to_string(), "Only the requester can cancel a swap request");

        let mine = seed_swap(&store, me);
        scheduler.swaps().cancel_swap(mine).await.unwrap();
        assert_eq!(
            scheduler.swaps().get_swap(mine).await.unwrap().status,
            RequestStatus::Cancelled
        );

        let err = scheduler.swaps().deny_swap(mine).await.unwrap_err();
        assert_eq!(err.to_string(), ALREADY_REVIEWED);
    }

    #[tokio::test]
    async fn anonymous_callers_are_refused() {
        let store = MemoryStore::new();
        let scheduler =
            Scheduler::from_parts(Arc::new(store.clone()), Arc::new(StaticIdentity::anonymous()));
        let id = seed_swap(&store, Uuid::new_v4());

        let err = scheduler.swaps().approve_swap(id).await.unwrap_err();
        assert!(matches!(err, Error::Unauthorized));
        assert_eq!(store.rows(tables::SWAP_REQUESTS)[0]["status"], "pending");
    }
}
