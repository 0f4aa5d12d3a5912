//! Shop staff scheduling on Supabase
//!
//! `shopshift` holds the scheduling rules of a multi-tenant shop: shifts and
//! their breaks and tags, recurring shifts, copying a week forward, open-shift
//! claims, swaps, time off, the time clock, and the bulk-edit and drag-and-drop
//! behaviour of the schedule grid.
//!
//! # Features
//!
//! - Recurrence and week-copy arithmetic in the shop's timezone
//! - Multi-step writes that unwind themselves on failure
//! - Bulk selection that stays consistent with a changing shift list
//! - An axum router exposing the bulk shift endpoint and maintenance jobs
//!
//! # Example
//!
//! ```rust,no_run
//! use shopshift::prelude::*;
//! use uuid::Uuid;
//!
//! #[tokio::main]
//! async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//!     let scheduler = Scheduler::from_env()?.with_access_token("user-access-token")?;
//!     let ctx = scheduler.shop_context(Uuid::new_v4()).await?;
//!     let week = scheduler.shifts().load_week(&ctx, chrono::Utc::now().date_naive()).await?;
//!     println!("{} shifts this week", week.len());
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod context;
pub mod dnd;
pub mod error;
pub mod http;
pub mod models;
pub mod saga;
pub mod selection;
pub mod services;
pub mod time;

use std::sync::Arc;

use shopshift_client::{AuthUser, BackendClient, IdentityProvider, Store};
use uuid::Uuid;

use crate::cache::{CacheInvalidator, CacheKey, NoopInvalidator};
use crate::config::SchedulerOptions;
use crate::context::ShopContext;
use crate::error::{Error, Result};
use crate::services::{
    ClaimService, DepartmentService, MaintenanceService, MemberService, NotificationService,
    ReportService, ShiftService, SwapService, TemplateService, TimeClockService, TimeOffService,
};

/// Session-scoped entry point to the scheduling services
#[derive(Clone)]
pub struct Scheduler {
    store: Arc<dyn Store>,
    identity: Arc<dyn IdentityProvider>,
    cache: Arc<dyn CacheInvalidator>,
    options: SchedulerOptions,
    backend: Option<BackendClient>,
}

impl Scheduler {
    /// Create a scheduler talking to a Supabase project
    pub fn new(backend: BackendClient) -> Result<Self> {
        let store = backend.postgrest()?;
        let identity = backend.auth().clone();
        Ok(Self {
            store: Arc::new(store),
            identity: Arc::new(identity),
            cache: Arc::new(NoopInvalidator),
            options: SchedulerOptions::default(),
            backend: Some(backend),
        })
    }

    /// Create a scheduler from `SUPABASE_URL` and `SUPABASE_ANON_KEY`
    pub fn from_env() -> Result<Self> {
        Self::new(BackendClient::from_env()?)
    }

    /// Create a scheduler over an arbitrary store and identity
    pub fn from_parts(store: Arc<dyn Store>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            store,
            identity,
            cache: Arc::new(NoopInvalidator),
            options: SchedulerOptions::default(),
            backend: None,
        }
    }

    /// Set the scheduler options
    pub fn with_options(mut self, options: SchedulerOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the cache invalidator
    pub fn with_cache(mut self, cache: Arc<dyn CacheInvalidator>) -> Self {
        self.cache = cache;
        self
    }

    /// A scheduler acting as the holder of `token`.
    ///
    /// Only a backend-built scheduler can rebind; one built from parts keeps
    /// its configured identity.
    pub fn with_access_token(&self, token: &str) -> Result<Self> {
        match &self.backend {
            Some(backend) => {
                let backend = backend.with_access_token(token);
                Ok(Self {
                    store: Arc::new(backend.postgrest()?),
                    identity: Arc::new(backend.auth().clone()),
                    cache: self.cache.clone(),
                    options: self.options.clone(),
                    backend: Some(backend),
                })
            }
            None => Ok(self.clone()),
        }
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub fn options(&self) -> &SchedulerOptions {
        &self.options
    }

    /// The signed-in user, if any
    pub async fn current_user(&self) -> Result<Option<AuthUser>> {
        Ok(self.identity.current_user().await?)
    }

    pub(crate) async fn require_user(&self) -> Result<AuthUser> {
        self.current_user().await?.ok_or(Error::Unauthorized)
    }

    pub(crate) fn invalidate(&self, key: CacheKey) {
        self.cache.invalidate(key);
    }

    /// Load a shop's context, using the configured default timezone as fallback
    pub async fn shop_context(&self, shop_id: Uuid) -> Result<ShopContext> {
        ShopContext::load(self.store(), shop_id, self.options.default_timezone).await
    }

    pub fn shifts(&self) -> ShiftService<'_> {
        ShiftService::new(self)
    }

    pub fn claims(&self) -> ClaimService<'_> {
        ClaimService::new(self)
    }

    pub fn swaps(&self) -> SwapService<'_> {
        SwapService::new(self)
    }

    pub fn members(&self) -> MemberService<'_> {
        MemberService::new(self)
    }

    pub fn time_off(&self) -> TimeOffService<'_> {
        TimeOffService::new(self)
    }

    pub fn time_clock(&self) -> TimeClockService<'_> {
        TimeClockService::new(self)
    }

    pub fn departments(&self) -> DepartmentService<'_> {
        DepartmentService::new(self)
    }

    pub fn notifications(&self) -> NotificationService<'_> {
        NotificationService::new(self)
    }

    pub fn reports(&self) -> ReportService<'_> {
        ReportService::new(self)
    }

    pub fn templates(&self) -> TemplateService<'_> {
        TemplateService::new(self)
    }

    pub fn maintenance(&self) -> MaintenanceService<'_> {
        MaintenanceService::new(self)
    }
}

/// Common imports
pub mod prelude {
    pub use crate::cache::{BroadcastInvalidator, CacheKey, CacheScope};
    pub use crate::config::SchedulerOptions;
    pub use crate::context::ShopContext;
    pub use crate::dnd::{resolve_drop, DropTarget};
    pub use crate::error::{ActionResult, Error, Result};
    pub use crate::models::*;
    pub use crate::selection::{AssigneeKey, BulkSelection};
    pub use crate::time::{EndType, Frequency, RecurrencePattern};
    pub use crate::Scheduler;
    pub use shopshift_client::{AuthUser, MemoryStore, StaticIdentity};
}
