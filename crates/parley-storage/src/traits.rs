//! Storage traits.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::StorageError;

/// A value read from the store together with its version.
#[derive(Debug, Clone)]
pub struct Versioned<T> {
    /// The stored value
    pub value: T,
    /// Monotonic version, starting at 1 on creation
    pub version: u64,
}

/// Versioned state store with conditional writes.
///
/// Optimistic concurrency: conflicts are detected, not prevented. Callers
/// that lose a conditional write must reload and re-decide.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Get a value and its version.
    async fn get<T: DeserializeOwned + Send>(
        &self,
        key: &str,
    ) -> Result<Option<Versioned<T>>, StorageError>;

    /// Conditionally write a value.
    ///
    /// `expected_version` of `None` requires the key to be absent (create);
    /// `Some(v)` requires the stored version to still be `v`. Returns the
    /// new version.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::VersionConflict`] when the expectation does
    /// not hold.
    async fn put<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        expected_version: Option<u64>,
    ) -> Result<u64, StorageError>;

    /// Delete a key. Absent keys are not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Check if a key exists.
    async fn exists(&self, key: &str) -> Result<bool, StorageError>;
}
