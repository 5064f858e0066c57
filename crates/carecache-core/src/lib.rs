//! carecache core - a two-tier client cache for a school pickup app.
//!
//! This crate keeps documents fetched from the remote document store in an
//! in-memory tier and a persistent key-value tier, so repeated reads during
//! a session (and across restarts, until TTL expiry) do not go back to the
//! network.
//!
//! Layout, leaves first:
//! - `cache`: entry codec, memory tier, persistent tier adapter, the
//!   `CacheManager`, typed collection helpers and the invalidation map
//! - `remote`: the remote document store interface and its HTTP client
//! - `access`: the cache-aware data access layer callers use
//! - `models`: serde models for the app's collections

pub mod access;
pub mod cache;
pub mod config;
pub mod models;
pub mod remote;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;

pub use access::{DataAccess, ReadOptions};
pub use cache::{CacheConfig, CacheManager, CacheStats, Collection, CollectionCache};
pub use config::Config;
pub use remote::{DocumentStore, Filter, FilterOp, Query, RemoteError};
