//! The user's persisted set of watched fund codes.

use crate::core::error::{FundError, StoreError};
use crate::core::fanout::resolve_all;
use crate::core::quote::{Quote, QuoteProvider};
use crate::store::record::RecordStore;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const WATCHLIST_ID: &str = "watchlist";
const MAX_CONFLICT_RETRIES: usize = 3;

pub struct Watchlist {
    records: RecordStore,
    // Serializes read-modify-write cycles within this process.
    mutation: Mutex<()>,
}

impl Watchlist {
    pub fn new(records: RecordStore) -> Self {
        Self {
            records,
            mutation: Mutex::new(()),
        }
    }

    pub async fn list(&self) -> Result<Vec<String>, StoreError> {
        Ok(self
            .records
            .get::<Vec<String>>(WATCHLIST_ID)
            .await?
            .map(|record| record.data)
            .unwrap_or_default())
    }

    pub async fn contains(&self, code: &str) -> Result<bool, StoreError> {
        Ok(self.list().await?.iter().any(|c| c == code))
    }

    /// Adds `code`; adding a member again leaves the set unchanged.
    pub async fn add(&self, code: &str) -> Result<(), StoreError> {
        let changed = self
            .mutate(|codes| {
                if codes.iter().any(|c| c == code) {
                    return false;
                }
                codes.push(code.to_string());
                true
            })
            .await?;
        if changed {
            info!(code, "Added to watchlist");
        }
        Ok(())
    }

    /// Removes `code`; removing a non-member is a no-op.
    pub async fn remove(&self, code: &str) -> Result<(), StoreError> {
        let changed = self
            .mutate(|codes| {
                let before = codes.len();
                codes.retain(|c| c != code);
                codes.len() != before
            })
            .await?;
        if changed {
            info!(code, "Removed from watchlist");
        }
        Ok(())
    }

    /// Quotes for exactly the watched codes; failed lookups are dropped.
    pub async fn resolve_quotes(
        &self,
        provider: &dyn QuoteProvider,
        max_concurrency: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<Quote>, FundError> {
        let codes = self.list().await?;
        resolve_all(provider, &codes, max_concurrency, cancel).await
    }

    /// Reads the record, applies `f` and writes the whole set back, echoing the
    /// revision that was read. Nothing is written when `f` reports no change.
    async fn mutate<F>(&self, f: F) -> Result<bool, StoreError>
    where
        F: Fn(&mut Vec<String>) -> bool,
    {
        let _guard = self.mutation.lock().await;
        let mut attempt = 0;
        loop {
            let (mut codes, rev) = match self.records.get::<Vec<String>>(WATCHLIST_ID).await? {
                Some(record) => (record.data, record.rev),
                None => (Vec::new(), None),
            };

            if !f(&mut codes) {
                debug!("Watchlist unchanged");
                return Ok(false);
            }

            match self.records.put(WATCHLIST_ID, &codes, rev.as_deref()).await {
                Ok(_) => return Ok(true),
                Err(StoreError::Conflict { .. }) if attempt < MAX_CONFLICT_RETRIES => {
                    attempt += 1;
                    warn!(attempt, "Watchlist changed underneath us, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryCollection;
    use crate::core::cache::KeyValueCollection;
    use async_trait::async_trait;
    use futures::future::join_all;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn watchlist() -> Watchlist {
        Watchlist::new(RecordStore::new(Arc::new(MemoryCollection::new())))
    }

    #[tokio::test]
    async fn test_empty_by_default() {
        assert!(watchlist().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_is_idempotent() {
        let wl = watchlist();
        wl.add("110022").await.unwrap();
        wl.add("110022").await.unwrap();

        assert_eq!(wl.list().await.unwrap(), vec!["110022".to_string()]);
        assert!(wl.contains("110022").await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_member_and_non_member() {
        let wl = watchlist();
        wl.add("110022").await.unwrap();
        wl.add("000001").await.unwrap();

        wl.remove("110022").await.unwrap();
        assert_eq!(wl.list().await.unwrap(), vec!["000001".to_string()]);

        wl.remove("999999").await.unwrap();
        assert_eq!(wl.list().await.unwrap(), vec!["000001".to_string()]);
    }

    #[tokio::test]
    async fn test_concurrent_adds_are_not_lost() {
        let wl = watchlist();
        let codes: Vec<String> = (0..10).map(|i| format!("00000{i}")).collect();

        join_all(codes.iter().map(|c| wl.add(c))).await;

        let stored: HashSet<String> = wl.list().await.unwrap().into_iter().collect();
        assert_eq!(stored, codes.into_iter().collect());
    }

    #[tokio::test]
    async fn test_two_handles_share_one_record() {
        let collection = Arc::new(MemoryCollection::new());
        let first = Watchlist::new(RecordStore::new(collection.clone()));
        let second = Watchlist::new(RecordStore::new(collection));

        first.add("110022").await.unwrap();
        second.add("000001").await.unwrap();

        let stored: HashSet<String> = first.list().await.unwrap().into_iter().collect();
        assert_eq!(
            stored,
            HashSet::from(["110022".to_string(), "000001".to_string()])
        );
    }

    /// Another writer that adds `code` between each watchlist read and the
    /// following write, up to `remaining` times.
    struct RacingCollection {
        inner: MemoryCollection,
        code: String,
        remaining: AtomicUsize,
        reads: AtomicUsize,
    }

    impl RacingCollection {
        fn new(code: &str, times: usize) -> Self {
            Self {
                inner: MemoryCollection::new(),
                code: code.to_string(),
                remaining: AtomicUsize::new(times),
                reads: AtomicUsize::new(0),
            }
        }

        async fn write_competing(&self, key: &[u8], current: Option<&[u8]>) {
            let mut record = match current {
                Some(bytes) => serde_json::from_slice(bytes).unwrap(),
                None => json!({ "data": [] }),
            };
            record["data"].as_array_mut().unwrap().push(json!(self.code));
            let n = self.remaining.load(Ordering::SeqCst);
            record["_rev"] = json!(format!("99-{n}"));
            self.inner
                .put(key, &serde_json::to_vec(&record).unwrap())
                .await
                .unwrap();
        }
    }

    #[async_trait]
    impl KeyValueCollection for RacingCollection {
        async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
            let value = self.inner.get(key).await?;
            // Reads alternate: first the one in `mutate`, then the revision check in `put`.
            let read = self.reads.fetch_add(1, Ordering::SeqCst);
            if read % 2 == 0
                && self
                    .remaining
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok()
            {
                self.write_competing(key, value.as_deref()).await;
            }
            Ok(value)
        }

        async fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
            self.inner.put(key, value).await
        }
    }

    #[tokio::test]
    async fn test_conflicting_write_is_retried_and_merged() {
        let collection = Arc::new(RacingCollection::new("161725", 1));
        let wl = Watchlist::new(RecordStore::new(collection.clone()));

        wl.add("110022").await.unwrap();

        let stored: HashSet<String> = wl.list().await.unwrap().into_iter().collect();
        assert_eq!(
            stored,
            HashSet::from(["110022".to_string(), "161725".to_string()])
        );
        // One conflicting attempt plus the successful retry.
        assert_eq!(collection.remaining.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_persistent_conflicts_give_up() {
        let collection = Arc::new(RacingCollection::new("161725", 10));
        let wl = Watchlist::new(RecordStore::new(collection.clone()));

        let err = wl.add("110022").await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
        assert_eq!(
            collection.remaining.load(Ordering::SeqCst),
            10 - (MAX_CONFLICT_RETRIES + 1)
        );
        assert!(!wl.list().await.unwrap().contains(&"110022".to_string()));
    }
}
