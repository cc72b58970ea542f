//! Agent registry backed by the shared state store.
//!
//! The registry is one versioned key holding a name -> descriptor map.
//! Mutations go through a compare-and-swap loop because many agents
//! register concurrently at startup; reads are plain gets.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use parley_core::AgentDescriptor;

use crate::{error::StorageError, keys::KeyPatterns, traits::StateStore};

/// Mutation attempts before giving up on a contended registry key.
const CAS_ATTEMPTS: usize = 5;

/// Errors from registry operations.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Name already registered with a different topic
    #[error("Agent {name} is already registered with topic {existing}")]
    Conflict {
        /// The colliding agent name
        name: String,
        /// Topic held by the existing registration
        existing: String,
    },

    /// No registration under that name
    #[error("Agent not found: {0}")]
    NotFound(String),

    /// CAS retries exhausted under write contention
    #[error("Registry contention on {0}")]
    Contention(String),

    /// Underlying store failure
    #[error(transparent)]
    Store(#[from] StorageError),
}

/// Shared mapping from agent name to descriptor.
pub struct AgentRegistry<S> {
    store: Arc<S>,
    key: String,
}

impl<S> Clone for AgentRegistry<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            key: self.key.clone(),
        }
    }
}

type DescriptorMap = HashMap<String, AgentDescriptor>;

impl<S: StateStore> AgentRegistry<S> {
    /// Registry under the standard key.
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            key: KeyPatterns::agents_registry().to_string(),
        }
    }

    /// Registry under a custom key (separate namespaces for separate
    /// deployments sharing one store).
    #[must_use]
    pub fn with_key(store: Arc<S>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Register an agent, upserting by name.
    ///
    /// Re-registering the same name with the same topic refreshes the
    /// descriptor but keeps the original registration time, so round-robin
    /// order survives agent restarts.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Conflict`] if the name is held by a
    /// registration with a different topic.
    pub async fn register(&self, descriptor: AgentDescriptor) -> Result<(), RegistryError> {
        for _ in 0..CAS_ATTEMPTS {
            let current = self.store.get::<DescriptorMap>(&self.key).await?;
            let (mut map, expected) = match current {
                Some(v) => (v.value, Some(v.version)),
                None => (DescriptorMap::new(), None),
            };

            let mut descriptor = descriptor.clone();
            if let Some(existing) = map.get(&descriptor.name) {
                if existing.topic != descriptor.topic {
                    return Err(RegistryError::Conflict {
                        name: descriptor.name,
                        existing: existing.topic.clone(),
                    });
                }
                descriptor.registered_at = existing.registered_at;
            }

            let name = descriptor.name.clone();
            map.insert(name.clone(), descriptor);

            match self.store.put(&self.key, &map, expected).await {
                Ok(_) => {
                    info!(agent = %name, "Agent registered");
                    return Ok(());
                }
                Err(StorageError::VersionConflict(_)) => {
                    debug!(agent = %name, "Registry write raced, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(RegistryError::Contention(self.key.clone()))
    }

    /// Remove an agent. Best-effort: an absent name is not an error.
    pub async fn deregister(&self, name: &str) -> Result<(), RegistryError> {
        for _ in 0..CAS_ATTEMPTS {
            let Some(current) = self.store.get::<DescriptorMap>(&self.key).await? else {
                return Ok(());
            };

            let mut map = current.value;
            if map.remove(name).is_none() {
                return Ok(());
            }

            match self.store.put(&self.key, &map, Some(current.version)).await {
                Ok(_) => {
                    info!(agent = %name, "Agent deregistered");
                    return Ok(());
                }
                Err(StorageError::VersionConflict(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(RegistryError::Contention(self.key.clone()))
    }

    /// Look up one agent by name.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] for unknown names.
    pub async fn lookup(&self, name: &str) -> Result<AgentDescriptor, RegistryError> {
        let map = self
            .store
            .get::<DescriptorMap>(&self.key)
            .await?
            .map(|v| v.value)
            .unwrap_or_default();

        map.get(name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// All registered agents, ordered by registration time (then name, for
    /// ties). This order drives deterministic round-robin selection.
    pub async fn list(&self) -> Result<Vec<AgentDescriptor>, RegistryError> {
        let map = self
            .store
            .get::<DescriptorMap>(&self.key)
            .await?
            .map(|v| v.value)
            .unwrap_or_default();

        let mut agents: Vec<AgentDescriptor> = map.into_values().collect();
        agents.sort_by(|a, b| {
            a.registered_at
                .cmp(&b.registered_at)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(agents)
    }
}
