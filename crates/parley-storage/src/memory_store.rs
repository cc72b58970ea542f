//! In-memory state store for tests and single-process deployments.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::RwLock;

use crate::{
    error::StorageError,
    traits::{StateStore, Versioned},
};

/// In-memory versioned store. Same conditional-write semantics as
/// [`crate::RedisStore`].
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, (u64, serde_json::Value)>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get<T: DeserializeOwned + Send>(
        &self,
        key: &str,
    ) -> Result<Option<Versioned<T>>, StorageError> {
        let entries = self.entries.read().await;

        match entries.get(key) {
            Some((version, value)) => {
                let parsed = serde_json::from_value(value.clone())
                    .map_err(|e| StorageError::DeserializationError(e.to_string()))?;
                Ok(Some(Versioned {
                    value: parsed,
                    version: *version,
                }))
            }
            None => Ok(None),
        }
    }

    async fn put<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        expected_version: Option<u64>,
    ) -> Result<u64, StorageError> {
        let serialized = serde_json::to_value(value)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;

        let mut entries = self.entries.write().await;
        let current = entries.get(key).map(|(version, _)| *version);

        if current != expected_version {
            return Err(StorageError::VersionConflict(key.to_string()));
        }

        let next = current.unwrap_or(0) + 1;
        entries.insert(key.to_string(), (next, serialized));
        Ok(next)
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.entries.read().await.contains_key(key))
    }
}
