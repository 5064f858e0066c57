//! Cache-aware data access.
//!
//! `DataAccess` wraps a [`DocumentStore`] with the cache-aside pattern:
//! reads consult the [`CacheManager`] first and populate it on a miss,
//! writes go to the remote store first and invalidate only once they have
//! succeeded. Remote failures are returned unchanged and never touch the
//! cache.

use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::cache::{
    CacheManager, Collection, CollectionCache, EncodeError, InvalidationCoordinator, Mutation,
};
use crate::remote::{Document, DocumentStore, Query, RemoteError};

/// Per-call cache behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    /// When false the cache is neither read nor written.
    pub use_cache: bool,
    /// Skip the cache read but still store the fresh result.
    pub force_refresh: bool,
    /// Overrides the collection's default TTL.
    pub ttl: Option<Duration>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            force_refresh: false,
            ttl: None,
        }
    }
}

impl ReadOptions {
    pub fn refresh() -> Self {
        Self {
            force_refresh: true,
            ..Self::default()
        }
    }

    pub fn uncached() -> Self {
        Self {
            use_cache: false,
            ..Self::default()
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

#[derive(Clone)]
pub struct DataAccess {
    cache: Arc<CacheManager>,
    remote: Arc<dyn DocumentStore>,
    invalidation: InvalidationCoordinator,
}

impl DataAccess {
    pub fn new(cache: Arc<CacheManager>, remote: Arc<dyn DocumentStore>) -> Self {
        let invalidation = InvalidationCoordinator::new(cache.clone());
        Self {
            cache,
            remote,
            invalidation,
        }
    }

    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    /// Whole collection, cached under its snapshot key.
    pub async fn read_all<T>(
        &self,
        collection: Collection,
        options: ReadOptions,
    ) -> Result<Vec<T>, RemoteError>
    where
        T: Serialize + DeserializeOwned,
    {
        let cache = self.typed::<T>(collection);
        if reads_cache(options) {
            if let Some(hit) = cache.get_all().await {
                debug!(collection = collection.name, "Cache hit for collection");
                return Ok(hit);
            }
        }

        let docs = self.remote.read_all(collection.name).await?;
        let fresh = decode_documents(collection, docs)?;
        if options.use_cache {
            log_encode_failure(collection, cache.set_all(&fresh, options.ttl));
        }
        Ok(fresh)
    }

    /// One document. Absent documents are not cached.
    pub async fn read_by_id<T>(
        &self,
        collection: Collection,
        id: &str,
        options: ReadOptions,
    ) -> Result<Option<T>, RemoteError>
    where
        T: Serialize + DeserializeOwned,
    {
        let cache = self.typed::<T>(collection);
        if reads_cache(options) {
            if let Some(hit) = cache.get(id).await {
                debug!(collection = collection.name, id = id, "Cache hit for document");
                return Ok(Some(hit));
            }
        }

        let Some(doc) = self.remote.read_by_id(collection.name, id).await? else {
            debug!(collection = collection.name, id = id, "Document not found");
            return Ok(None);
        };
        let value: T = decode_document(collection, doc)?;
        if options.use_cache {
            log_encode_failure(collection, cache.set(id, &value, options.ttl));
        }
        Ok(Some(value))
    }

    /// Filtered read, cached under the query's fingerprint.
    pub async fn query<T>(
        &self,
        collection: Collection,
        query: &Query,
        options: ReadOptions,
    ) -> Result<Vec<T>, RemoteError>
    where
        T: Serialize + DeserializeOwned,
    {
        let cache = self.typed::<T>(collection);
        if reads_cache(options) {
            if let Some(hit) = cache.get_query(query).await {
                debug!(collection = collection.name, query = %query.fingerprint(), "Cache hit for query");
                return Ok(hit);
            }
        }

        let docs = self.remote.query(collection.name, query).await?;
        let fresh = decode_documents(collection, docs)?;
        if options.use_cache {
            log_encode_failure(collection, cache.set_query(query, &fresh, options.ttl));
        }
        Ok(fresh)
    }

    pub async fn create<T: Serialize>(
        &self,
        collection: Collection,
        data: &T,
    ) -> Result<String, RemoteError> {
        let doc = encode_document(data)?;
        let id = self.remote.create(collection.name, doc).await?;
        self.invalidation
            .mutated(collection, Some(&id), Mutation::Create)
            .await;
        Ok(id)
    }

    pub async fn update<P: Serialize>(
        &self,
        collection: Collection,
        id: &str,
        partial: &P,
    ) -> Result<(), RemoteError> {
        let doc = encode_document(partial)?;
        self.remote.update(collection.name, id, doc).await?;
        self.invalidation
            .mutated(collection, Some(id), Mutation::Update)
            .await;
        Ok(())
    }

    pub async fn delete(&self, collection: Collection, id: &str) -> Result<(), RemoteError> {
        self.remote.delete(collection.name, id).await?;
        self.invalidation
            .mutated(collection, Some(id), Mutation::Delete)
            .await;
        Ok(())
    }

    /// Drop everything the cache holds, including collections this session never read.
    pub async fn logout(&self) {
        self.invalidation.logged_out().await;
    }

    fn typed<T: Serialize + DeserializeOwned>(&self, collection: Collection) -> CollectionCache<T> {
        CollectionCache::new(self.cache.clone(), collection)
    }
}

fn reads_cache(options: ReadOptions) -> bool {
    options.use_cache && !options.force_refresh
}

fn log_encode_failure(collection: Collection, result: Result<(), EncodeError>) {
    if let Err(e) = result {
        warn!(collection = collection.name, error = %e, "Failed to cache fetched data");
    }
}

fn decode_document<T: DeserializeOwned>(
    collection: Collection,
    doc: Document,
) -> Result<T, RemoteError> {
    serde_json::from_value(doc).map_err(|e| {
        RemoteError::InvalidResponse(format!(
            "Unexpected document shape in {}: {}",
            collection.name, e
        ))
    })
}

fn decode_documents<T: DeserializeOwned>(
    collection: Collection,
    docs: Vec<Document>,
) -> Result<Vec<T>, RemoteError> {
    docs.into_iter()
        .map(|doc| decode_document(collection, doc))
        .collect()
}

fn encode_document<T: Serialize>(data: &T) -> Result<Document, RemoteError> {
    serde_json::to_value(data)
        .map_err(|e| RemoteError::InvalidRequest(format!("Failed to encode document: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::models::{AttendanceRecord, AttendanceStatus, Role, User};
    use crate::test_support::{ScriptedRemote, Verb};
    use chrono::NaiveDate;
    use serde_json::json;

    async fn setup() -> (DataAccess, Arc<ScriptedRemote>) {
        let cache = Arc::new(CacheManager::with_defaults(Arc::new(MemoryStore::new())));
        cache.ready().await;
        let remote = Arc::new(ScriptedRemote::new());
        remote.insert(
            "users",
            json!({"id": "U1", "name": "Siti", "role": "parent", "studentIds": ["S1"]}),
        );
        remote.insert(
            "users",
            json!({"id": "U2", "name": "Ravi", "role": "teacher"}),
        );
        (DataAccess::new(cache, remote.clone()), remote)
    }

    #[tokio::test]
    async fn test_read_by_id_twice_calls_remote_once() {
        let (access, remote) = setup().await;

        let first: Option<User> = access
            .read_by_id(Collection::USERS, "U1", ReadOptions::default())
            .await
            .unwrap();
        let second: Option<User> = access
            .read_by_id(Collection::USERS, "U1", ReadOptions::default())
            .await
            .unwrap();

        assert_eq!(remote.calls(Verb::ReadById), 1);
        assert_eq!(first, second);
        assert_eq!(first.unwrap().role, Role::Parent);
    }

    #[tokio::test]
    async fn test_missing_document_is_not_cached() {
        let (access, remote) = setup().await;

        for _ in 0..2 {
            let user: Option<User> = access
                .read_by_id(Collection::USERS, "U9", ReadOptions::default())
                .await
                .unwrap();
            assert!(user.is_none());
        }
        assert_eq!(remote.calls(Verb::ReadById), 2);
    }

    #[tokio::test]
    async fn test_force_refresh_bypasses_read_but_repopulates() {
        let (access, remote) = setup().await;
        let _: Vec<User> = access
            .read_all(Collection::USERS, ReadOptions::default())
            .await
            .unwrap();

        remote.insert("users", json!({"id": "U3", "name": "Mei Ling", "role": "parent"}));

        let refreshed: Vec<User> = access
            .read_all(Collection::USERS, ReadOptions::refresh())
            .await
            .unwrap();
        assert_eq!(refreshed.len(), 3);

        let cached: Vec<User> = access
            .read_all(Collection::USERS, ReadOptions::default())
            .await
            .unwrap();
        assert_eq!(cached.len(), 3);
        assert_eq!(remote.calls(Verb::ReadAll), 2);
    }

    #[tokio::test]
    async fn test_uncached_reads_leave_cache_alone() {
        let (access, remote) = setup().await;
        for _ in 0..2 {
            let _: Vec<User> = access
                .read_all(Collection::USERS, ReadOptions::uncached())
                .await
                .unwrap();
        }
        assert_eq!(remote.calls(Verb::ReadAll), 2);
        assert_eq!(access.cache().stats().await.memory_entry_count, 0);
    }

    #[tokio::test]
    async fn test_query_is_cached_by_fingerprint() {
        let (access, remote) = setup().await;
        remote.insert(
            "attendance",
            json!({"id": "A1", "studentId": "S1", "date": "2025-11-20", "status": "present"}),
        );
        remote.insert(
            "attendance",
            json!({"id": "A2", "studentId": "S2", "date": "2025-11-21", "status": "late"}),
        );
        let date = NaiveDate::from_ymd_opt(2025, 11, 20).unwrap();

        let first: Vec<AttendanceRecord> = access
            .query(Collection::ATTENDANCE, &Query::on_date(date), ReadOptions::default())
            .await
            .unwrap();
        let second: Vec<AttendanceRecord> = access
            .query(Collection::ATTENDANCE, &Query::on_date(date), ReadOptions::default())
            .await
            .unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(first[0].status, AttendanceStatus::Present);
        assert_eq!(first, second);
        assert_eq!(remote.calls(Verb::Query), 1);
        assert!(access
            .cache()
            .get::<Vec<AttendanceRecord>>("attendance:date:2025-11-20")
            .await
            .is_some());
    }

    #[tokio::test]
    async fn test_ttl_override_is_applied() {
        let (access, _) = setup().await;
        let _: Option<User> = access
            .read_by_id(
                Collection::USERS,
                "U2",
                ReadOptions::default().with_ttl(Duration::from_secs(7)),
            )
            .await
            .unwrap();

        let cached = access
            .cache()
            .get_entry::<User>("users:id:U2")
            .await
            .unwrap();
        assert_eq!(cached.ttl_millis, 7_000);
    }

    #[tokio::test]
    async fn test_update_invalidates_item_and_collection() {
        let (access, remote) = setup().await;
        let _: Vec<User> = access
            .read_all(Collection::USERS, ReadOptions::default())
            .await
            .unwrap();
        let _: Option<User> = access
            .read_by_id(Collection::USERS, "U1", ReadOptions::default())
            .await
            .unwrap();

        access
            .update(Collection::USERS, "U1", &json!({"name": "Siti Aminah"}))
            .await
            .unwrap();

        let user: Option<User> = access
            .read_by_id(Collection::USERS, "U1", ReadOptions::default())
            .await
            .unwrap();
        assert_eq!(user.unwrap().name, "Siti Aminah");
        assert_eq!(remote.calls(Verb::ReadById), 2);

        let _: Vec<User> = access
            .read_all(Collection::USERS, ReadOptions::default())
            .await
            .unwrap();
        assert_eq!(remote.calls(Verb::ReadAll), 2);
    }

    #[tokio::test]
    async fn test_failed_update_keeps_cached_value() {
        let (access, remote) = setup().await;
        let before: Option<User> = access
            .read_by_id(Collection::USERS, "U1", ReadOptions::default())
            .await
            .unwrap();

        remote.fail(Verb::Update);
        let result = access
            .update(Collection::USERS, "U1", &json!({"name": "Changed"}))
            .await;
        assert!(matches!(result, Err(RemoteError::ServerError(_))));

        let after: Option<User> = access
            .read_by_id(Collection::USERS, "U1", ReadOptions::default())
            .await
            .unwrap();
        assert_eq!(after, before);
        assert_eq!(remote.calls(Verb::ReadById), 1);
    }

    #[tokio::test]
    async fn test_failed_read_populates_nothing() {
        let (access, remote) = setup().await;
        remote.fail(Verb::ReadAll);

        let result: Result<Vec<User>, _> = access
            .read_all(Collection::USERS, ReadOptions::default())
            .await;

        assert!(result.is_err());
        assert_eq!(access.cache().stats().await.memory_entry_count, 0);
    }

    #[tokio::test]
    async fn test_create_and_delete_invalidate_snapshot() {
        let (access, remote) = setup().await;
        let _: Vec<User> = access
            .read_all(Collection::USERS, ReadOptions::default())
            .await
            .unwrap();

        let id = access
            .create(
                Collection::USERS,
                &json!({"name": "Farah", "role": "parent"}),
            )
            .await
            .unwrap();
        let users: Vec<User> = access
            .read_all(Collection::USERS, ReadOptions::default())
            .await
            .unwrap();
        assert_eq!(users.len(), 3);

        access.delete(Collection::USERS, &id).await.unwrap();
        let users: Vec<User> = access
            .read_all(Collection::USERS, ReadOptions::default())
            .await
            .unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(remote.calls(Verb::ReadAll), 3);
    }

    #[tokio::test]
    async fn test_logout_clears_cache() {
        let (access, _) = setup().await;
        let _: Vec<User> = access
            .read_all(Collection::USERS, ReadOptions::default())
            .await
            .unwrap();
        access.cache().flush().await;

        access.logout().await;

        let stats = access.cache().stats().await;
        assert_eq!(stats.memory_entry_count, 0);
        assert_eq!(stats.persistent_entry_count, 0);
    }

    #[tokio::test]
    async fn test_malformed_remote_document_is_an_error() {
        let (access, remote) = setup().await;
        remote.insert("users", json!({"id": "U4", "role": "parent"}));

        let result: Result<Vec<User>, _> = access
            .read_all(Collection::USERS, ReadOptions::default())
            .await;

        assert!(matches!(result, Err(RemoteError::InvalidResponse(_))));
    }
}
