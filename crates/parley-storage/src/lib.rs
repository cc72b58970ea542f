//! # parley-storage
//!
//! Durable key/value persistence with optimistic concurrency, plus the
//! agent registry built on top of it.
//!
//! Every value carries a version; writers pass the version they read and
//! get [`StorageError::VersionConflict`] when a concurrent writer raced
//! ahead. [`RedisStore`] backs distributed deployments, [`MemoryStore`]
//! backs tests and single-process setups.

mod error;
mod keys;
mod memory_store;
mod redis_store;
mod registry;
mod traits;

pub use error::StorageError;
pub use keys::KeyPatterns;
pub use memory_store::MemoryStore;
pub use redis_store::RedisStore;
pub use registry::{AgentRegistry, RegistryError};
pub use traits::{StateStore, Versioned};
