//! The active shop a session works against

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use shopshift_client::{Query, Store};
use tracing::warn;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{first_row, tables};
use crate::time;

/// Shop identity and timezone, passed to every operation that needs local time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShopContext {
    pub shop_id: Uuid,
    pub timezone: Tz,
}

#[derive(Deserialize)]
struct ShopRow {
    #[serde(default)]
    timezone: Option<String>,
}

impl ShopContext {
    pub fn new(shop_id: Uuid, timezone: Tz) -> Self {
        Self { shop_id, timezone }
    }

    /// Read the shop's timezone, falling back to `default_tz` when unset or unknown
    pub async fn load(store: &dyn Store, shop_id: Uuid, default_tz: Tz) -> Result<Self> {
        let rows = store
            .select(
                tables::SHOPS,
                &Query::new().select("id,timezone").eq("id", shop_id),
            )
            .await?;
        let shop: ShopRow = first_row(rows)?.ok_or_else(|| Error::not_found("Shop not found"))?;

        let timezone = match shop.timezone.as_deref() {
            Some(name) if !name.is_empty() => name.parse::<Tz>().unwrap_or_else(|_| {
                warn!(%shop_id, timezone = name, "unknown shop timezone, using default");
                default_tz
            }),
            _ => default_tz,
        };
        Ok(Self { shop_id, timezone })
    }

    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        time::local_date(instant, &self.timezone)
    }
}
