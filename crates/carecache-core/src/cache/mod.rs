//! Two-tier client cache.
//!
//! This module provides the `CacheManager`, which keeps documents in a
//! process-lifetime memory tier backed by a persistent key-value store.
//! Every entry carries its own TTL and is dropped lazily once it expires.
//!
//! Building blocks:
//! - `entry`: `CacheEntry` and the string codec used by the persistent tier
//! - `memory`: the in-process map
//! - `persistent`: the `KeyValueStore` trait and the failure-swallowing adapter
//! - `file_store`: a `KeyValueStore` keeping one JSON file per key
//! - `collections`: per-collection key prefixes, TTLs and typed helpers
//! - `invalidation`: mutation-to-eviction map and the logout flush

pub mod collections;
pub mod entry;
pub mod error;
pub mod file_store;
pub mod invalidation;
pub mod manager;
pub mod memory;
pub mod persistent;

pub use collections::{Collection, CollectionCache};
pub use entry::CacheEntry;
pub use error::{DecodeError, EncodeError, StoreError};
pub use file_store::FileStore;
pub use invalidation::{CacheEvent, Invalidation, InvalidationCoordinator, Mutation};
pub use manager::{CacheConfig, CacheManager, CacheStats, CACHE_VERSION, KEY_NAMESPACE};
pub use memory::MemoryTier;
pub use persistent::{KeyValueStore, MemoryStore, PersistentTier};
