pub mod disk;
pub mod document;
#[cfg(test)]
pub mod memory;
pub mod record;

use crate::core::cache::{KeyValueCollection, Store};
use crate::core::error::StoreError;
use disk::DiskCollection;
use fjall::{Keyspace, PartitionCreateOptions};
use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, PoisonError, RwLock},
};
use tracing::debug;

/// A thread-safe key-value store holding named collections, each a fjall
/// partition in one keyspace.
pub struct KeyValueStore {
    collections: RwLock<HashMap<String, Arc<dyn KeyValueCollection>>>,
    keyspace: Arc<Keyspace>,
}

impl KeyValueStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(path)?;
        let keyspace = fjall::Config::new(path).open()?;
        debug!("Opened keyspace at {}", path.display());

        Ok(Self {
            collections: RwLock::new(HashMap::new()),
            keyspace: Arc::new(keyspace),
        })
    }
}

impl Store for KeyValueStore {
    fn get_collection(&self, name: &str) -> Result<Arc<dyn KeyValueCollection>, StoreError> {
        if let Some(collection) = self
            .collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return Ok(Arc::clone(collection));
        }

        let mut collections = self
            .collections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(collection) = collections.get(name) {
            return Ok(Arc::clone(collection));
        }

        let partition = self
            .keyspace
            .open_partition(name, PartitionCreateOptions::default())?;
        let collection: Arc<dyn KeyValueCollection> =
            Arc::new(DiskCollection::new(Arc::clone(&self.keyspace), partition));
        collections.insert(name.to_string(), Arc::clone(&collection));
        Ok(collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_collections_are_shared_by_name() {
        let dir = tempdir().unwrap();
        let store = KeyValueStore::open(&dir.path().join("store")).unwrap();
        let first = store.get_collection("records").unwrap();
        first.put(b"k", b"v").await.unwrap();

        let second = store.get_collection("records").unwrap();
        assert_eq!(second.get(b"k").await.unwrap(), Some(b"v".to_vec()));

        let other = store.get_collection("other").unwrap();
        assert!(other.get(b"k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_open_creates_missing_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("store");
        let store = KeyValueStore::open(&path).unwrap();
        let records = store.get_collection("records").unwrap();
        records.put(b"k", b"v").await.unwrap();
        assert!(path.is_dir());
        assert_eq!(records.get(b"k").await.unwrap(), Some(b"v".to_vec()));
    }
}
