use crate::core::error::StoreError;
use async_trait::async_trait;
use std::sync::Arc;

/// A named collection of raw key-value blobs.
#[async_trait]
pub trait KeyValueCollection: Send + Sync {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;
    async fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;
}

/// Hands out collections by name, creating them on first use.
pub trait Store: Send + Sync {
    fn get_collection(&self, name: &str) -> Result<Arc<dyn KeyValueCollection>, StoreError>;
}
