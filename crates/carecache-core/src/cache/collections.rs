//! Per-collection key prefixes, TTLs and typed cache helpers.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};

use super::error::EncodeError;
use super::manager::CacheManager;
use crate::remote::Query;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;

/// A remote collection as seen by the cache.
///
/// Prefixes are unique across collections so that evicting one prefix never
/// reaches into another collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collection {
    /// Collection name in the remote document store.
    pub name: &'static str,
    pub prefix: &'static str,
    pub default_ttl: Duration,
}

impl Collection {
    pub const USERS: Collection = Collection {
        name: "users",
        prefix: "users:",
        default_ttl: Duration::from_secs(24 * HOUR),
    };

    pub const STUDENTS: Collection = Collection {
        name: "students",
        prefix: "students:",
        default_ttl: Duration::from_secs(12 * HOUR),
    };

    pub const ANNOUNCEMENTS: Collection = Collection {
        name: "announcements",
        prefix: "announcements:",
        default_ttl: Duration::from_secs(15 * MINUTE),
    };

    /// Changes intraday as children are checked in and picked up.
    pub const ATTENDANCE: Collection = Collection {
        name: "attendance",
        prefix: "attendance:",
        default_ttl: Duration::from_secs(5 * MINUTE),
    };

    pub const AUTHORISED_PERSONS: Collection = Collection {
        name: "authorisedPersons",
        prefix: "authorised:",
        default_ttl: Duration::from_secs(12 * HOUR),
    };

    pub const QUESTIONS: Collection = Collection {
        name: "questions",
        prefix: "questions:",
        default_ttl: Duration::from_secs(HOUR),
    };

    pub const ANSWERS: Collection = Collection {
        name: "answers",
        prefix: "answers:",
        default_ttl: Duration::from_secs(HOUR),
    };

    pub const ALL: [Collection; 7] = [
        Collection::USERS,
        Collection::STUDENTS,
        Collection::ANNOUNCEMENTS,
        Collection::ATTENDANCE,
        Collection::AUTHORISED_PERSONS,
        Collection::QUESTIONS,
        Collection::ANSWERS,
    ];

    pub fn by_name(name: &str) -> Option<Collection> {
        Self::ALL.into_iter().find(|c| c.name == name)
    }

    /// Key of a single document.
    pub fn item_key(&self, id: &str) -> String {
        format!("{}id:{}", self.prefix, id)
    }

    /// Key of the whole-collection snapshot. Never collides with an item key.
    pub fn all_key(&self) -> String {
        format!("{}all", self.prefix)
    }

    /// Key of a filtered query's result set.
    pub fn query_key(&self, query: &Query) -> String {
        format!("{}{}", self.prefix, query.fingerprint())
    }
}

/// Typed view of the cache for one collection.
///
/// The snapshot stored by [`set_all`](Self::set_all) and the per-id entries
/// are independent: replacing or removing one leaves the other alone.
pub struct CollectionCache<T> {
    cache: Arc<CacheManager>,
    collection: Collection,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for CollectionCache<T> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            collection: self.collection,
            _marker: PhantomData,
        }
    }
}

impl<T: Serialize + DeserializeOwned> CollectionCache<T> {
    pub fn new(cache: Arc<CacheManager>, collection: Collection) -> Self {
        Self {
            cache,
            collection,
            _marker: PhantomData,
        }
    }

    fn ttl(&self, ttl: Option<Duration>) -> Duration {
        ttl.unwrap_or(self.collection.default_ttl)
    }

    pub async fn get(&self, id: &str) -> Option<T> {
        self.cache.get(&self.collection.item_key(id)).await
    }

    pub fn set(&self, id: &str, data: &T, ttl: Option<Duration>) -> Result<(), EncodeError> {
        self.cache
            .set_with_ttl(&self.collection.item_key(id), data, self.ttl(ttl))
    }

    pub async fn remove(&self, id: &str) {
        self.cache.remove(&self.collection.item_key(id)).await;
    }

    pub async fn get_all(&self) -> Option<Vec<T>> {
        self.cache.get(&self.collection.all_key()).await
    }

    pub fn set_all(&self, data: &[T], ttl: Option<Duration>) -> Result<(), EncodeError> {
        self.cache
            .set_with_ttl(&self.collection.all_key(), data, self.ttl(ttl))
    }

    pub async fn get_query(&self, query: &Query) -> Option<Vec<T>> {
        self.cache.get(&self.collection.query_key(query)).await
    }

    pub fn set_query(
        &self,
        query: &Query,
        data: &[T],
        ttl: Option<Duration>,
    ) -> Result<(), EncodeError> {
        self.cache
            .set_with_ttl(&self.collection.query_key(query), data, self.ttl(ttl))
    }

    /// Drop every cached entry of this collection: items, snapshot and queries.
    pub async fn clear(&self) {
        self.cache.clear_by_prefix(self.collection.prefix).await;
    }
}
