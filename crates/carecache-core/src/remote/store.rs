use async_trait::async_trait;
use serde_json::Value;

use super::error::RemoteError;
use super::query::Query;

/// A document as returned by the remote store: a JSON object carrying its `id`.
pub type Document = Value;

/// Port for the remote document database.
///
/// Any client offering these primitives can sit behind the cache.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    async fn read_all(&self, collection: &str) -> Result<Vec<Document>, RemoteError>;

    async fn read_by_id(&self, collection: &str, id: &str)
        -> Result<Option<Document>, RemoteError>;

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, RemoteError>;

    /// Returns the id assigned to the new document.
    async fn create(&self, collection: &str, data: Document) -> Result<String, RemoteError>;

    /// Merge `partial` into the stored document.
    async fn update(&self, collection: &str, id: &str, partial: Document)
        -> Result<(), RemoteError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<(), RemoteError>;
}
