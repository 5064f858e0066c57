use thiserror::Error;

/// A persisted string could not be turned back into a cache entry.
///
/// Never surfaced past the cache manager: a decode failure reads as a miss.
#[derive(Error, Debug)]
#[error("Failed to decode cache entry: {0}")]
pub struct DecodeError(#[source] pub serde_json::Error);

/// A payload could not be serialized into a cache entry.
#[derive(Error, Debug)]
#[error("Failed to encode cache entry: {0}")]
pub struct EncodeError(#[source] pub serde_json::Error);

/// Failure reported by a persistent key-value store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}
