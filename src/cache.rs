//! Cache invalidation signals for UI sessions

use chrono::NaiveDate;
use tokio::sync::broadcast;
use tracing::trace;
use uuid::Uuid;

/// What kind of data went stale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheScope {
    Shifts,
    Claims,
    Swaps,
    Members,
    TimeOff,
    TimeRecords,
    Departments,
    Notifications,
    Templates,
}

/// Key of a stale cache entry; `None` fields mean "all"
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub scope: CacheScope,
    pub shop_id: Option<Uuid>,
    pub range: Option<(NaiveDate, NaiveDate)>,
}

impl CacheKey {
    pub fn shop(scope: CacheScope, shop_id: Uuid) -> Self {
        Self {
            scope,
            shop_id: Some(shop_id),
            range: None,
        }
    }

    pub fn scope(scope: CacheScope) -> Self {
        Self {
            scope,
            shop_id: None,
            range: None,
        }
    }

    pub fn with_range(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.range = Some((start, end));
        self
    }
}

/// Fire-and-forget notification that cached data should be refetched
pub trait CacheInvalidator: Send + Sync {
    fn invalidate(&self, key: CacheKey);
}

/// Drops every signal
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopInvalidator;

impl CacheInvalidator for NoopInvalidator {
    fn invalidate(&self, _key: CacheKey) {}
}

/// Publishes keys on a broadcast channel
#[derive(Debug, Clone)]
pub struct BroadcastInvalidator {
    sender: broadcast::Sender<CacheKey>,
}

impl BroadcastInvalidator {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheKey> {
        self.sender.subscribe()
    }
}

impl CacheInvalidator for BroadcastInvalidator {
    fn invalidate(&self, key: CacheKey) {
        if self.sender.send(key).is_err() {
            trace!("no cache subscribers");
        }
    }
}
