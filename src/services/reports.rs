//! Aggregations computed by database functions
//!
//! The results are passed through as returned.

use chrono::NaiveDate;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::Scheduler;

pub struct ReportService<'a> {
    scheduler: &'a Scheduler,
}

impl<'a> ReportService<'a> {
    pub(crate) fn new(scheduler: &'a Scheduler) -> Self {
        Self { scheduler }
    }

    async fn call(&self, function: &str, params: Value) -> Result<Value> {
        self.scheduler.require_user().await?;
        Ok(self.scheduler.store().rpc(function, params).await?)
    }

    fn check_range(start: NaiveDate, end: NaiveDate) -> Result<()> {
        if end < start {
            return Err(Error::validation("The report range ends before it starts"));
        }
        Ok(())
    }

    pub async fn workforce_metrics(
        &self,
        shop_id: Uuid,
        user_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Value> {
        Self::check_range(start, end)?;
        self.call(
            "get_workforce_metrics",
            json!({
                "p_shop_id": shop_id,
                "p_user_id": user_id,
                "p_start_date": start,
                "p_end_date": end,
            }),
        )
        .await
    }

    pub async fn team_workforce_summary(
        &self,
        shop_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Value> {
        Self::check_range(start, end)?;
        self.call(
            "get_team_workforce_summary",
            json!({
                "p_shop_id": shop_id,
                "p_start_date": start,
                "p_end_date": end,
            }),
        )
        .await
    }

    pub async fn pto_ledger(&self, shop_id: Uuid, user_id: Uuid) -> Result<Value> {
        self.call(
            "get_pto_ledger",
            json!({ "p_shop_id": shop_id, "p_user_id": user_id }),
        )
        .await
    }

    pub async fn pto_balance(&self, shop_id: Uuid, user_id: Uuid) -> Result<Value> {
        self.call(
            "get_pto_balance",
            json!({ "p_shop_id": shop_id, "p_user_id": user_id }),
        )
        .await
    }
}
