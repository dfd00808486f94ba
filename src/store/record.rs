//! Revisioned JSON records on top of a key-value collection.
//!
//! Every stored record carries a `_rev` token. Writers echo back the token they
//! read; a write whose token no longer matches is rejected with
//! [`StoreError::Conflict`] instead of overwriting.

use crate::core::cache::KeyValueCollection;
use crate::core::error::StoreError;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// A record as read from the store together with its revision.
#[derive(Debug, Clone, PartialEq)]
pub struct Revisioned<T> {
    pub data: T,
    pub rev: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    data: T,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    rev: Option<String>,
}

pub struct RecordStore {
    collection: Arc<dyn KeyValueCollection>,
    // Held across the compare and the write of `put`.
    write_lock: Mutex<()>,
}

impl RecordStore {
    pub fn new(collection: Arc<dyn KeyValueCollection>) -> Self {
        Self {
            collection,
            write_lock: Mutex::new(()),
        }
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        id: &str,
    ) -> Result<Option<Revisioned<T>>, StoreError> {
        let Some(bytes) = self.collection.get(id.as_bytes()).await? else {
            return Ok(None);
        };
        let envelope: Envelope<T> = serde_json::from_slice(&bytes)?;
        Ok(Some(Revisioned {
            data: envelope.data,
            rev: envelope.rev,
        }))
    }

    /// Writes `data` if `rev` matches the stored revision. Pass `None` when the
    /// record is being created. Returns the new revision.
    pub async fn put<T: Serialize>(
        &self,
        id: &str,
        data: &T,
        rev: Option<&str>,
    ) -> Result<String, StoreError> {
        let _guard = self.write_lock.lock().await;

        let current = self.current_rev(id).await?;
        if current.as_deref() != rev {
            return Err(StoreError::Conflict {
                id: id.to_string(),
                expected: rev.map(str::to_string),
                found: current,
            });
        }

        let next = next_rev(current.as_deref());
        let envelope = Envelope {
            data,
            rev: Some(next.clone()),
        };
        self.collection
            .put(id.as_bytes(), &serde_json::to_vec(&envelope)?)
            .await?;
        debug!(id, rev = %next, "Record written");
        Ok(next)
    }

    async fn current_rev(&self, id: &str) -> Result<Option<String>, StoreError> {
        let Some(bytes) = self.collection.get(id.as_bytes()).await? else {
            return Ok(None);
        };
        let envelope: Envelope<serde_json::Value> = serde_json::from_slice(&bytes)?;
        Ok(envelope.rev)
    }
}

fn next_rev(current: Option<&str>) -> String {
    let generation = current
        .and_then(|rev| rev.split('-').next())
        .and_then(|n| n.parse::<u64>().ok())
        .unwrap_or(0);
    format!("{}-{}", generation + 1, chrono::Utc::now().timestamp_millis())
}
