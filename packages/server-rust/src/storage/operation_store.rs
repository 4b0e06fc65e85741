//! Time-bounded ledger of async operation records.
//!
//! Defines [`OperationStore`], the only shared mutable structure on the async
//! mutation path, and [`InMemoryOperationStore`], a [`DashMap`]-backed
//! implementation. Every `put` stamps the record with a fresh deadline; a record
//! past its deadline is indistinguishable from one that was never written.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use schedule_hub_core::{Operation, OperationId};
use tokio::time::Instant;
use tracing::debug;

/// Default lifetime of an operation record after its most recent write.
pub const DEFAULT_OPERATION_TTL: Duration = Duration::from_secs(3600);

/// Longest honored TTL (100 years); larger values are clamped.
pub const MAX_OPERATION_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 3600);

/// Keyed store of operation records with per-record time-to-live.
///
/// The coordinator is the sole writer, so implementations need no
/// compare-and-swap: `put` overwrites unconditionally. Implementations must
/// tolerate concurrent `put`/`get` from request handlers and background tasks.
///
/// Used as `Arc<dyn OperationStore>`; a shared cache or table can replace the
/// in-memory implementation without touching the coordinator.
#[async_trait]
pub trait OperationStore: Send + Sync + 'static {
    /// Insert or replace the record for `id`, visible for `ttl` from now.
    async fn put(&self, id: OperationId, record: Operation, ttl: Duration) -> anyhow::Result<()>;

    /// Fetch the record for `id`. Expired records are reported as absent.
    async fn get(&self, id: &OperationId) -> anyhow::Result<Option<Operation>>;

    /// Remove the record for `id`. Returns whether a live record was removed.
    async fn delete(&self, id: &OperationId) -> anyhow::Result<bool>;

    /// Drop every expired record. Returns the number removed.
    async fn purge_expired(&self) -> anyhow::Result<usize>;
}

struct Entry {
    record: Operation,
    expires_at: Instant,
}

/// `now + ttl`, clamped so a huge TTL never overflows the clock.
fn deadline(now: Instant, ttl: Duration) -> Instant {
    let mut ttl = ttl.min(MAX_OPERATION_TTL);
    loop {
        if let Some(at) = now.checked_add(ttl) {
            return at;
        }
        ttl /= 2;
    }
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

/// In-memory [`OperationStore`] backed by [`DashMap`].
///
/// Expired records are removed lazily on `get` and in bulk by
/// [`OperationStore::purge_expired`]. With a capacity bound, inserting a new id
/// into a full store evicts the terminal record closest to expiry; records
/// still `processing` are never evicted, so the bound is soft when every
/// record is in flight.
pub struct InMemoryOperationStore {
    entries: DashMap<OperationId, Entry>,
    capacity: Option<usize>,
}

impl InMemoryOperationStore {
    /// Creates an unbounded store. TTL is the only eviction.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            capacity: None,
        }
    }

    /// Creates a store that evicts terminal records beyond `capacity` entries.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: DashMap::with_capacity(capacity),
            capacity: Some(capacity),
        }
    }

    /// Number of stored records, including expired ones not yet purged.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Evicts the terminal (or expired) record with the earliest deadline.
    fn evict_one(&self, now: Instant) -> bool {
        let victim = self
            .entries
            .iter()
            .filter(|e| e.is_expired(now) || e.record.is_terminal())
            .min_by_key(|e| e.expires_at)
            .map(|e| *e.key());

        match victim {
            Some(id) => {
                self.entries.remove(&id);
                debug!(operation_id = %id, "evicted operation record at capacity");
                true
            }
            None => false,
        }
    }
}

impl Default for InMemoryOperationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OperationStore for InMemoryOperationStore {
    async fn put(&self, id: OperationId, record: Operation, ttl: Duration) -> anyhow::Result<()> {
        let now = Instant::now();
        if let Some(capacity) = self.capacity {
            if !self.entries.contains_key(&id)
                && self.entries.len() >= capacity
                && !self.evict_one(now)
            {
                debug!(capacity, "operation store over capacity with only in-flight records");
            }
        }
        self.entries.insert(
            id,
            Entry {
                record,
                expires_at: deadline(now, ttl),
            },
        );
        Ok(())
    }

    async fn get(&self, id: &OperationId) -> anyhow::Result<Option<Operation>> {
        let now = Instant::now();
        match self.entries.get(id) {
            None => return Ok(None),
            Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.record.clone())),
            Some(_) => {}
        }
        // The shard guard is released above; removal re-checks expiry in case
        // a concurrent put refreshed the record.
        self.entries.remove_if(id, |_, e| e.is_expired(now));
        Ok(None)
    }

    async fn delete(&self, id: &OperationId) -> anyhow::Result<bool> {
        let now = Instant::now();
        Ok(self
            .entries
            .remove(id)
            .is_some_and(|(_, e)| !e.is_expired(now)))
    }

    async fn purge_expired(&self) -> anyhow::Result<usize> {
        let now = Instant::now();
        let expired: Vec<OperationId> = self
            .entries
            .iter()
            .filter(|e| e.is_expired(now))
            .map(|e| *e.key())
            .collect();

        let removed = expired
            .iter()
            .filter(|id| self.entries.remove_if(id, |_, e| e.is_expired(now)).is_some())
            .count();
        if removed > 0 {
            debug!(removed, "purged expired operation records");
        }
        Ok(removed)
    }
}
