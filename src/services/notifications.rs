use serde_json::{json, Value};
use shopshift_client::{Query, SortOrder};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::{CacheKey, CacheScope};
use crate::error::{Error, Result};
use crate::models::{first_row, from_rows, tables, NewNotification, Notification, NotificationType};
use crate::Scheduler;

#[derive(serde::Deserialize)]
struct MemberUser {
    user_id: Uuid,
}

/// In-app notifications
pub struct NotificationService<'a> {
    scheduler: &'a Scheduler,
}

impl<'a> NotificationService<'a> {
    pub(crate) fn new(scheduler: &'a Scheduler) -> Self {
        Self { scheduler }
    }

    /// Notifications of the signed-in user at a shop, newest first
    pub async fn list(&self, shop_id: Uuid, limit: usize) -> Result<Vec<Notification>> {
        let user = self.scheduler.require_user().await?;
        let query = Query::new()
            .eq("shop_id", shop_id)
            .eq("user_id", user.id)
            .order("created_at", SortOrder::Descending)
            .limit(limit);
        let rows = self
            .scheduler
            .store()
            .select(tables::NOTIFICATIONS, &query)
            .await?;
        from_rows(rows)
    }

    pub async fn create(&self, notification: &NewNotification) -> Result<Notification> {
        let rows = self
            .scheduler
            .store()
            .insert(tables::NOTIFICATIONS, serde_json::to_value(notification)?)
            .await?;
        self.scheduler
            .invalidate(CacheKey::shop(CacheScope::Notifications, notification.shop_id));
        first_row(rows)?.ok_or_else(|| Error::store("Notification insert returned no row"))
    }

    /// Create a notification as a side effect; a failure is logged, not returned
    pub(crate) async fn send(&self, notification: NewNotification) {
        if let Err(e) = self.create(&notification).await {
            warn!(
                user_id = %notification.user_id,
                kind = notification.kind.as_str(),
                error = %e,
                "failed to create notification"
            );
        }
    }

    pub async fn mark_read(&self, id: Uuid) -> Result<()> {
        self.scheduler.require_user().await?;
        self.scheduler
            .store()
            .update(
                tables::NOTIFICATIONS,
                &Query::new().eq("id", id),
                json!({ "is_read": true }),
            )
            .await?;
        self.scheduler.invalidate(CacheKey::scope(CacheScope::Notifications));
        Ok(())
    }

    /// Mark every unread notification of the signed-in user at a shop as read
    pub async fn mark_all_read(&self, shop_id: Uuid) -> Result<usize> {
        let user = self.scheduler.require_user().await?;
        let query = Query::new()
            .eq("shop_id", shop_id)
            .eq("user_id", user.id)
            .eq("is_read", false);
        let rows = self
            .scheduler
            .store()
            .update(tables::NOTIFICATIONS, &query, json!({ "is_read": true }))
            .await?;
        self.scheduler
            .invalidate(CacheKey::shop(CacheScope::Notifications, shop_id));
        Ok(rows.len())
    }

    /// One notification per active member of the shop except `exclude`;
    /// returns how many were created
    pub async fn notify_shop_members(
        &self,
        shop_id: Uuid,
        kind: NotificationType,
        title: &str,
        body: Option<&str>,
        exclude: Option<Uuid>,
    ) -> Result<usize> {
        let store = self.scheduler.store();
        let members: Vec<MemberUser> = from_rows(
            store
                .select(
                    tables::SHOP_MEMBERS,
                    &Query::new()
                        .select("user_id")
                        .eq("shop_id", shop_id)
                        .eq("is_active", true),
                )
                .await?,
        )?;

        let rows = members
            .into_iter()
            .filter(|m| Some(m.user_id) != exclude)
            .map(|m| {
                let mut notification = NewNotification::new(shop_id, m.user_id, kind, title);
                notification.body = body.map(str::to_string);
                serde_json::to_value(notification)
            })
            .collect::<std::result::Result<Vec<Value>, _>>()?;
        if rows.is_empty() {
            return Ok(0);
        }

        let inserted = store
            .insert(tables::NOTIFICATIONS, Value::Array(rows))
            .await?;
        debug!(%shop_id, kind = kind.as_str(), count = inserted.len(), "notified shop members");
        self.scheduler
            .invalidate(CacheKey::shop(CacheScope::Notifications, shop_id));
        Ok(inserted.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopshift_client::{AuthUser, MemoryStore, StaticIdentity};
    use std::sync::Arc;

    #[tokio::test]
    async fn fan_out_skips_actor_and_inactive_members() {
        let store = MemoryStore::new();
        let actor = Uuid::new_v4();
        let scheduler = Scheduler::from_parts(
            Arc::new(store.clone()),
            Arc::new(StaticIdentity::signed_in(AuthUser::new(actor))),
        );
        let shop_id = Uuid::new_v4();
        let colleague = Uuid::new_v4();
        store.seed(
            tables::SHOP_MEMBERS,
            vec![
                json!({ "id": Uuid::new_v4(), "shop_id": shop_id, "user_id": actor, "role": "manager", "is_active": true }),
                json!({ "id": Uuid::new_v4(), "shop_id": shop_id, "user_id": colleague, "role": "technician", "is_active": true }),
                json!({ "id": Uuid::new_v4(), "shop_id": shop_id, "user_id": Uuid::new_v4(), "role": "technician", "is_active": false }),
            ],
        );

        let count = scheduler
            .notifications()
            .notify_shop_members(
                shop_id,
                NotificationType::ScheduleUpdated,
                "Schedule published",
                None,
                Some(actor),
            )
            .await
            .unwrap();
        assert_eq!(count, 1);

        let rows = store.rows(tables::NOTIFICATIONS);
        assert_eq!(rows[0]["user_id"], json!(colleague));
        assert_eq!(rows[0]["type"], "schedule_updated");
        assert!(rows[0].get("body").is_none());
    }

    #[tokio::test]
    async fn mark_all_read_touches_only_own_unread() {
        let store = MemoryStore::new();
        let me = Uuid::new_v4();
        let scheduler = Scheduler::from_parts(
            Arc::new(store.clone()),
            Arc::new(StaticIdentity::signed_in(AuthUser::new(me))),
        );
        let shop_id = Uuid::new_v4();
        for user in [me, me, Uuid::new_v4()] {
            store.seed(
                tables::NOTIFICATIONS,
                vec![json!({
                    "id": Uuid::new_v4(),
                    "shop_id": shop_id,
                    "user_id": user,
                    "type": "shift_assigned",
                    "title": "Assigned",
                    "is_read": false,
                })],
            );
        }

        let count = scheduler.notifications().mark_all_read(shop_id).await.unwrap();
        assert_eq!(count, 2);
        let unread = store
            .rows(tables::NOTIFICATIONS)
            .into_iter()
            .filter(|n| n["is_read"] == json!(false))
            .count();
        assert_eq!(unread, 1);
    }
}
