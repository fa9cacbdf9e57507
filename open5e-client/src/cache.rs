use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::oneshot;

use crate::collection::CollectionType;
use crate::error::{Error, Result};
use crate::loader::BulkCollectionLoader;
use crate::record::Record;

/// Cached records are shared, never copied.
pub type CachedRecords = Arc<Vec<Arc<Record>>>;

type LoadResult = Result<CachedRecords>;

/// A populated slot: the deduplicated records plus bookkeeping.
struct CachedCollection {
    records: CachedRecords,
    populated_at: DateTime<Utc>,
}

/// One-shot, per-collection memoized loader with single-flight semantics.
///
/// The first `get` for a collection runs one bulk load; every `get` issued
/// while that load is in flight waits on the same result instead of
/// fetching again. A populated slot lives for the rest of the process (or
/// until `clear`). A failed load leaves the slot empty and clears the
/// in-flight marker, so the next call retries from scratch.
///
/// Loaded records are deduplicated by key, first occurrence wins. Later
/// duplicates come from overlapping pages under unstable remote pagination
/// and are dropped silently rather than treated as an error.
pub struct DeduplicatingCache {
    loader: BulkCollectionLoader,
    slots: DashMap<CollectionType, CachedCollection>,
    pending: DashMap<CollectionType, Vec<oneshot::Sender<LoadResult>>>,
}

impl DeduplicatingCache {
    pub fn new(loader: BulkCollectionLoader) -> Self {
        Self {
            loader,
            slots: DashMap::new(),
            pending: DashMap::new(),
        }
    }

    /// Cached records for `collection`, loading them on first use.
    pub async fn get(&self, collection: CollectionType) -> LoadResult {
        if let Some(slot) = self.slots.get(&collection) {
            log::debug!("cache hit for {collection}");
            return Ok(slot.records.clone());
        }

        // Either join an in-flight load or become the caller that runs it.
        // The entry lock makes check-and-register atomic, and it is taken
        // before the first await so concurrent callers cannot both lead.
        let waiter = match self.pending.entry(collection) {
            Entry::Occupied(mut entry) => {
                let (tx, rx) = oneshot::channel();
                entry.get_mut().push(tx);
                Some(rx)
            }
            Entry::Vacant(entry) => {
                entry.insert(Vec::new());
                None
            }
        };

        if let Some(rx) = waiter {
            log::debug!("joining in-flight load for {collection}");
            return match rx.await {
                Ok(result) => result,
                Err(_) => Err(Error::Network(format!(
                    "in-flight load for {collection} was dropped"
                ))),
            };
        }

        log::debug!("cache miss for {collection}, starting bulk load");
        // if this future is dropped mid-load, the guard clears the marker
        // and the dropped senders fail the waiters, instead of leaving
        // every later get() suspended on a load nobody is running
        let mut guard = PendingGuard {
            pending: &self.pending,
            collection,
            armed: true,
        };
        let result = match self.loader.load_all(collection).await {
            Ok(records) => {
                let records = Arc::new(dedup_by_key(records));
                self.slots.insert(
                    collection,
                    CachedCollection {
                        records: records.clone(),
                        populated_at: Utc::now(),
                    },
                );
                Ok(records)
            }
            // nothing cached on failure; the next get() reloads
            Err(error) => Err(error),
        };
        guard.armed = false;

        if let Some((_, waiters)) = self.pending.remove(&collection) {
            if !waiters.is_empty() {
                log::debug!("notifying {} waiters for {collection}", waiters.len());
            }
            for waiter in waiters {
                let _ = waiter.send(result.clone());
            }
        }

        result
    }

    /// Eagerly populate a collection ahead of first use. Shares the same
    /// single-flight path as `get`.
    pub async fn prewarm(&self, collection: CollectionType) -> Result<()> {
        self.get(collection).await.map(|_| ())
    }

    /// Drop every cached collection. The next `get` per type reloads.
    pub fn clear(&self) {
        self.slots.clear();
        log::info!("collection cache cleared");
    }

    pub fn stats(&self) -> CacheStats {
        let mut collections: Vec<CollectionCacheStats> = self
            .slots
            .iter()
            .map(|slot| CollectionCacheStats {
                collection: slot.key().to_string(),
                records: slot.value().records.len(),
                populated_at: slot.value().populated_at,
            })
            .collect();
        collections.sort_by(|a, b| a.collection.cmp(&b.collection));

        CacheStats {
            populated_collections: collections.len(),
            total_records: collections.iter().map(|c| c.records).sum(),
            collections,
        }
    }
}

/// Removes the in-flight marker when an abandoned leading load unwinds.
/// Disarmed on the normal path, where `get` removes the marker itself
/// while notifying the waiters.
struct PendingGuard<'a> {
    pending: &'a DashMap<CollectionType, Vec<oneshot::Sender<LoadResult>>>,
    collection: CollectionType,
    armed: bool,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.armed && self.pending.remove(&self.collection).is_some() {
            log::debug!("abandoned load for {}, marker cleared", self.collection);
        }
    }
}

/// Keep the first record seen for each distinct key, in arrival order.
fn dedup_by_key(records: Vec<Record>) -> Vec<Arc<Record>> {
    let total = records.len();
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(total);
    for record in records {
        if seen.insert(record.key().to_string()) {
            unique.push(Arc::new(record));
        }
    }
    if unique.len() < total {
        log::debug!("dropped {} duplicate records", total - unique.len());
    }
    unique
}

/// Cache statistics, renderer-friendly.
#[derive(Debug, Clone, Serialize, Default)]
pub struct CacheStats {
    pub populated_collections: usize,
    pub total_records: usize,
    pub collections: Vec<CollectionCacheStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CollectionCacheStats {
    pub collection: String,
    pub records: usize,
    pub populated_at: DateTime<Utc>,
}
