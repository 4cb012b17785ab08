//! Durable record of POIs that have already triggered a notification.
//!
//! The ledger keeps two values in a [`KeyValueStore`]:
//!
//! - [`POI_IDS_KEY`]: a JSON array of every [`PoiId`] ever notified. It only
//!   grows; recording is a set union.
//! - [`VISITED_COUNT_KEY`]: the cumulative number of POIs that caused a
//!   notification, stored as a decimal string.
//!
//! Recording is read-modify-write against the store and is not atomic.
//! Callers must not run two recording passes concurrently; the refresh
//! controller serializes its cycles for this reason.

use std::collections::BTreeSet;
use std::sync::Arc;

use peak_motion_poi_models::PoiId;
use tokio::sync::watch;

use crate::{KeyValueStore, StorageError};

/// Storage key of the notified identifier list.
pub const POI_IDS_KEY: &str = "poiIds";

/// Storage key of the visited counter.
pub const VISITED_COUNT_KEY: &str = "poiCount";

/// Persistent set of notified POI identifiers plus the visited counter.
pub struct PoiLedger {
    store: Arc<dyn KeyValueStore>,
    visited: watch::Sender<u64>,
}

impl PoiLedger {
    /// Opens the ledger, loading the stored visited count.
    ///
    /// A missing or unreadable count starts at zero.
    pub async fn open(store: Arc<dyn KeyValueStore>) -> Self {
        let visited = match store.get(VISITED_COUNT_KEY).await {
            Ok(Some(value)) => value.trim().parse::<u64>().unwrap_or_else(|e| {
                log::warn!("Ignoring unparseable visited count {value:?}: {e}");
                0
            }),
            Ok(None) => 0,
            Err(e) => {
                log::warn!("Failed to read visited count, starting at 0: {e}");
                0
            }
        };

        Self {
            store,
            visited: watch::Sender::new(visited),
        }
    }

    /// Returns every identifier that has already been notified.
    ///
    /// Absent, unreadable, or undecodable state reads as an empty set.
    pub async fn notified_ids(&self) -> BTreeSet<PoiId> {
        match self.store.get(POI_IDS_KEY).await {
            Ok(Some(value)) => serde_json::from_str(&value).unwrap_or_else(|e| {
                log::warn!("Stored POI ids are not valid JSON, treating as empty: {e}");
                BTreeSet::new()
            }),
            Ok(None) => BTreeSet::new(),
            Err(e) => {
                log::warn!("Failed to read stored POI ids, treating as empty: {e}");
                BTreeSet::new()
            }
        }
    }

    /// Unions `ids` into the stored set. Does nothing for an empty set.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the union cannot be written.
    pub async fn record_new_ids(&self, ids: &BTreeSet<PoiId>) -> Result<(), StorageError> {
        if ids.is_empty() {
            return Ok(());
        }

        let mut stored = self.notified_ids().await;
        let before = stored.len();
        stored.extend(ids.iter().cloned());

        self.store
            .set(POI_IDS_KEY, &serde_json::to_string(&stored)?)
            .await?;

        log::debug!(
            "Ledger updated with {} new POI id(s), {} total",
            stored.len() - before,
            stored.len()
        );
        Ok(())
    }

    /// Adds `delta` to the visited counter and persists it.
    ///
    /// The in-memory counter (and every [`Self::subscribe_visited`]
    /// receiver) is updated even when persisting fails.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the new total cannot be written.
    pub async fn increment_visited(&self, delta: u64) -> Result<u64, StorageError> {
        let mut total = 0;
        self.visited.send_modify(|count| {
            *count = count.saturating_add(delta);
            total = *count;
        });

        self.store
            .set(VISITED_COUNT_KEY, &total.to_string())
            .await?;
        Ok(total)
    }

    /// Current visited count.
    #[must_use]
    pub fn visited_count(&self) -> u64 {
        *self.visited.borrow()
    }

    /// Subscribes to visited count changes.
    #[must_use]
    pub fn subscribe_visited(&self) -> watch::Receiver<u64> {
        self.visited.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::MemoryKeyValueStore;

    fn ids(values: &[i64]) -> BTreeSet<PoiId> {
        values.iter().copied().map(PoiId::Int).collect()
    }

    struct FailingStore;

    #[async_trait]
    impl KeyValueStore for FailingStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(std::io::Error::other("disk gone").into())
        }

        async fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(std::io::Error::other("disk gone").into())
        }
    }

    #[tokio::test]
    async fn union_is_idempotent() {
        let ledger = PoiLedger::open(Arc::new(MemoryKeyValueStore::new())).await;
        assert!(ledger.notified_ids().await.is_empty());

        ledger.record_new_ids(&ids(&[1, 2, 3])).await.unwrap();
        assert_eq!(ledger.notified_ids().await, ids(&[1, 2, 3]));

        ledger.record_new_ids(&ids(&[3, 4])).await.unwrap();
        assert_eq!(ledger.notified_ids().await, ids(&[1, 2, 3, 4]));
    }

    #[tokio::test]
    async fn empty_record_does_not_touch_store() {
        let store = Arc::new(MemoryKeyValueStore::new());
        let ledger = PoiLedger::open(store.clone()).await;
        ledger.record_new_ids(&BTreeSet::new()).await.unwrap();
        assert_eq!(store.get(POI_IDS_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn corrupt_ids_read_as_empty() {
        let store = Arc::new(MemoryKeyValueStore::new());
        store.set(POI_IDS_KEY, "{not a list").await.unwrap();
        let ledger = PoiLedger::open(store).await;
        assert!(ledger.notified_ids().await.is_empty());

        ledger.record_new_ids(&ids(&[9])).await.unwrap();
        assert_eq!(ledger.notified_ids().await, ids(&[9]));
    }

    #[tokio::test]
    async fn reads_mixed_id_kinds() {
        let store = Arc::new(MemoryKeyValueStore::new());
        store.set(POI_IDS_KEY, r#"[1, "way/7"]"#).await.unwrap();
        let ledger = PoiLedger::open(store).await;
        let stored = ledger.notified_ids().await;
        assert!(stored.contains(&PoiId::Int(1)));
        assert!(stored.contains(&PoiId::from("way/7")));
    }

    #[tokio::test]
    async fn visited_count_persists_and_reloads() {
        let store = Arc::new(MemoryKeyValueStore::new());
        let ledger = PoiLedger::open(store.clone()).await;
        assert_eq!(ledger.increment_visited(2).await.unwrap(), 2);
        assert_eq!(ledger.increment_visited(3).await.unwrap(), 5);
        assert_eq!(store.get(VISITED_COUNT_KEY).await.unwrap().as_deref(), Some("5"));

        let reopened = PoiLedger::open(store).await;
        assert_eq!(reopened.visited_count(), 5);
    }

    #[tokio::test]
    async fn subscribers_see_increments() {
        let ledger = PoiLedger::open(Arc::new(MemoryKeyValueStore::new())).await;
        let mut rx = ledger.subscribe_visited();
        ledger.increment_visited(4).await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), 4);
    }

    #[tokio::test]
    async fn failing_store_degrades_softly() {
        let ledger = PoiLedger::open(Arc::new(FailingStore)).await;
        assert_eq!(ledger.visited_count(), 0);
        assert!(ledger.notified_ids().await.is_empty());
        assert!(ledger.record_new_ids(&ids(&[1])).await.is_err());
        assert!(ledger.increment_visited(1).await.is_err());
        assert_eq!(ledger.visited_count(), 1);
    }
}
