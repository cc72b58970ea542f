//! Redis state store implementation.
//!
//! Each key is a Redis hash of `version` and `value` (JSON). Conditional
//! writes go through a Lua script so the version check and the write are
//! atomic.

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client, Script};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info};

use crate::{
    error::StorageError,
    traits::{StateStore, Versioned},
};

/// Compare-and-swap: ARGV[1] is the expected version (0 = key must be
/// absent), ARGV[2] the serialized value. Returns the new version, or -1
/// on conflict.
const CAS_SCRIPT: &str = r"
local ver = redis.call('HGET', KEYS[1], 'version')
local expected = tonumber(ARGV[1])
if ver then
  if tonumber(ver) ~= expected then return -1 end
else
  if expected ~= 0 then return -1 end
end
local next = (ver and tonumber(ver) or 0) + 1
redis.call('HSET', KEYS[1], 'version', next, 'value', ARGV[2])
return next
";

/// Redis-based versioned store.
pub struct RedisStore {
    conn: ConnectionManager,
    cas: Script,
}

impl RedisStore {
    /// Connect to Redis.
    ///
    /// # Errors
    ///
    /// Returns an error if connection fails.
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        info!(url = %url, "Connecting to Redis");

        let client =
            Client::open(url).map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        info!("Connected to Redis");

        Ok(Self {
            conn,
            cas: Script::new(CAS_SCRIPT),
        })
    }
}

#[async_trait]
impl StateStore for RedisStore {
    async fn get<T: DeserializeOwned + Send>(
        &self,
        key: &str,
    ) -> Result<Option<Versioned<T>>, StorageError> {
        let mut conn = self.conn.clone();

        let (version, value): (Option<u64>, Option<String>) = redis::cmd("HMGET")
            .arg(key)
            .arg("version")
            .arg("value")
            .query_async(&mut conn)
            .await
            .map_err(|e| StorageError::GetFailed(e.to_string()))?;

        match (version, value) {
            (Some(version), Some(value)) => {
                let parsed = serde_json::from_str(&value)
                    .map_err(|e| StorageError::DeserializationError(e.to_string()))?;
                Ok(Some(Versioned {
                    value: parsed,
                    version,
                }))
            }
            _ => Ok(None),
        }
    }

    async fn put<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        expected_version: Option<u64>,
    ) -> Result<u64, StorageError> {
        let serialized = serde_json::to_string(value)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;

        let mut conn = self.conn.clone();
        let expected = expected_version.unwrap_or(0);

        debug!(key = %key, expected_version = expected, "Conditional write");

        let result: i64 = self
            .cas
            .key(key)
            .arg(expected)
            .arg(serialized)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| StorageError::SetFailed(e.to_string()))?;

        if result < 0 {
            return Err(StorageError::VersionConflict(key.to_string()));
        }

        Ok(result as u64)
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let mut conn = self.conn.clone();

        conn.del::<_, ()>(key)
            .await
            .map_err(|e| StorageError::DeleteFailed(e.to_string()))
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let mut conn = self.conn.clone();

        conn.exists(key)
            .await
            .map_err(|e| StorageError::GetFailed(e.to_string()))
    }
}
