//! Sequential processing of a batch of shift actions
//!
//! Every item is attempted and reported on its own; one failure does not stop
//! the rest of the batch.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

use crate::context::ShopContext;
use crate::error::{Error, Result};
use crate::models::{CreateShiftRequest, ShiftUpdate};
use crate::Scheduler;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkActionKind {
    Create,
    Update,
    Delete,
    Publish,
    Unpublish,
}

/// One item of a bulk request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkAction {
    pub action: BulkActionKind,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

/// Outcome of one item, in request order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkActionResult {
    pub action: BulkActionKind,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Deserialize)]
struct CreateData {
    shop_id: Uuid,
    #[serde(flatten)]
    request: CreateShiftRequest,
}

struct BulkRunner<'a> {
    scheduler: &'a Scheduler,
    contexts: HashMap<Uuid, ShopContext>,
}

impl<'a> BulkRunner<'a> {
    fn target(action: &BulkAction) -> Result<Uuid> {
        let id = action
            .id
            .as_deref()
            .ok_or_else(|| Error::validation("Missing id"))?;
        Uuid::parse_str(id).map_err(|_| Error::validation(format!("Invalid id: {}", id)))
    }

    fn data<T: serde::de::DeserializeOwned>(action: &BulkAction) -> Result<T> {
        let data = action.data.clone().unwrap_or(Value::Object(Default::default()));
        serde_json::from_value(data).map_err(|e| Error::validation(format!("Invalid data: {}", e)))
    }

    async fn context(&mut self, shop_id: Uuid) -> Result<ShopContext> {
        if let Some(ctx) = self.contexts.get(&shop_id) {
            return Ok(*ctx);
        }
        let ctx = self.scheduler.shop_context(shop_id).await?;
        self.contexts.insert(shop_id, ctx);
        Ok(ctx)
    }

    async fn apply(&mut self, action: &BulkAction) -> Result<()> {
        let scheduler = self.scheduler;
        let shifts = scheduler.shifts();
        match action.action {
            BulkActionKind::Create => {
                let data: CreateData = Self::data(action)?;
                let ctx = self.context(data.shop_id).await?;
                shifts.create_shift(&ctx, data.request).await?;
            }
            BulkActionKind::Update => {
                let id = Self::target(action)?;
                let update: ShiftUpdate = Self::data(action)?;
                shifts.update_shift(id, update).await?;
            }
            BulkActionKind::Delete => {
                shifts.delete_shift(Self::target(action)?).await?;
            }
            BulkActionKind::Publish | BulkActionKind::Unpublish => {
                let id = Self::target(action)?;
                let changed = if action.action == BulkActionKind::Publish {
                    shifts.publish_shifts(&[id]).await?
                } else {
                    shifts.unpublish_shifts(&[id]).await?
                };
                if changed == 0 {
                    return Err(Error::not_found("Shift not found"));
                }
            }
        }
        Ok(())
    }
}

/// Run `actions` in order for the signed-in user.
///
/// Fails as a whole only when nobody is signed in; otherwise every item gets a
/// result, successful or not.
pub async fn process_bulk_actions(
    scheduler: &Scheduler,
    actions: Vec<BulkAction>,
) -> Result<Vec<BulkActionResult>> {
    scheduler.require_user().await?;

    let mut runner = BulkRunner {
        scheduler,
        contexts: HashMap::new(),
    };
    let mut results = Vec::with_capacity(actions.len());
    for action in &actions {
        let outcome = runner.apply(action).await;
        if let Err(e) = &outcome {
            debug!(action = ?action.action, error = %e, "bulk action failed");
        }
        results.push(BulkActionResult {
            action: action.action,
            success: outcome.is_ok(),
            error: outcome.err().map(|e| e.to_string()),
        });
    }

    let failed = results.iter().filter(|r| !r.success).count();
    info!(total = results.len(), failed, "processed bulk actions");
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shopshift_client::{AuthUser, MemoryStore, StaticIdentity};
    use std::sync::Arc;

    use crate::models::tables;

    #[tokio::test]
    async fn items_fail_independently() {
        let store = MemoryStore::new();
        let shop_id = Uuid::new_v4();
        store.seed(
            tables::SHOPS,
            vec![json!({ "id": shop_id, "timezone": "UTC" })],
        );
        let existing = Uuid::new_v4();
        store.seed(
            tables::SHIFTS,
            vec![json!({
                "id": existing,
                "shop_id": shop_id,
                "start_time": "2024-05-01T09:00:00.000Z",
                "end_time": "2024-05-01T17:00:00.000Z",
                "status": "draft",
                "is_open": true,
            })],
        );
        let scheduler = Scheduler::from_parts(
            Arc::new(store.clone()),
            Arc::new(StaticIdentity::signed_in(AuthUser::new(Uuid::new_v4()))),
        );

        let actions: Vec<BulkAction> = serde_json::from_value(json!([
            {
                "action": "create",
                "data": {
                    "shop_id": shop_id,
                    "start_time": "2024-05-02T09:00:00Z",
                    "end_time": "2024-05-02T13:00:00Z"
                }
            },
            { "action": "publish" },
            { "action": "publish", "id": existing },
            { "action": "unpublish", "id": Uuid::new_v4() },
            { "action": "delete", "id": "not-a-uuid" }
        ]))
        .unwrap();

        let results = process_bulk_actions(&scheduler, actions).await.unwrap();
        let outcome: Vec<(bool, Option<&str>)> = results
            .iter()
            .map(|r| (r.success, r.error.as_deref()))
            .collect();
        assert_eq!(
            outcome,
            vec![
                (true, None),
                (false, Some("Missing id")),
                (true, None),
                (false, Some("Shift not found")),
                (false, Some("Invalid id: not-a-uuid")),
            ]
        );
        assert_eq!(store.rows(tables::SHIFTS).len(), 2);

        let wire = serde_json::to_value(&results[0]).unwrap();
        assert_eq!(wire, json!({ "action": "create", "success": true }));
    }

    #[tokio::test]
    async fn anonymous_batch_is_refused() {
        let scheduler = Scheduler::from_parts(
            Arc::new(MemoryStore::new()),
            Arc::new(StaticIdentity::anonymous()),
        );
        let err = process_bulk_actions(&scheduler, Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unauthorized));
    }
}
