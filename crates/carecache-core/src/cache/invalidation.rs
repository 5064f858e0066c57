//! What to evict after a remote mutation, and the logout flush.
//!
//! Invalidation is coarse: a mutation drops the whole
//! collection prefix (snapshot, items and every cached query) rather than
//! tracking which cached queries could contain the changed document.

use std::sync::Arc;

use tracing::debug;

use super::collections::Collection;
use super::manager::CacheManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invalidation {
    Key(String),
    Prefix(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// A remote write in `collection` succeeded.
    Mutated {
        collection: Collection,
        id: Option<String>,
        mutation: Mutation,
    },
    LoggedOut,
}

/// A mutation in `from` whose effect shows up in other collections' cached results.
struct Cascade {
    from: &'static str,
    on: &'static [Mutation],
    to: &'static [Collection],
}

const CASCADES: &[Cascade] = &[
    // Attendance and pickup lists are keyed by student
    Cascade {
        from: "students",
        on: &[Mutation::Update, Mutation::Delete],
        to: &[Collection::ATTENDANCE, Collection::AUTHORISED_PERSONS],
    },
    // Orphaned answers
    Cascade {
        from: "questions",
        on: &[Mutation::Delete],
        to: &[Collection::ANSWERS],
    },
    // Questions carry an answer count
    Cascade {
        from: "answers",
        on: &[Mutation::Create, Mutation::Delete],
        to: &[Collection::QUESTIONS],
    },
];

fn dependents(
    collection: &Collection,
    mutation: Mutation,
) -> impl Iterator<Item = &'static Collection> + '_ {
    CASCADES
        .iter()
        .filter(move |c| c.from == collection.name && c.on.contains(&mutation))
        .flat_map(|c| c.to.iter())
}

/// Keys and prefixes to drop after `mutation` of document `id` in `collection`.
///
/// A created document was never cached under its own key, so only updates
/// and deletes name the item key.
pub fn plan(collection: &Collection, id: Option<&str>, mutation: Mutation) -> Vec<Invalidation> {
    let mut plan = Vec::new();
    if let (Some(id), Mutation::Update | Mutation::Delete) = (id, mutation) {
        plan.push(Invalidation::Key(collection.item_key(id)));
    }
    plan.push(Invalidation::Prefix(collection.prefix));
    plan.extend(dependents(collection, mutation).map(|c| Invalidation::Prefix(c.prefix)));
    plan
}

/// Applies [`CacheEvent`]s to a shared [`CacheManager`].
#[derive(Clone)]
pub struct InvalidationCoordinator {
    cache: Arc<CacheManager>,
}

impl InvalidationCoordinator {
    pub fn new(cache: Arc<CacheManager>) -> Self {
        Self { cache }
    }

    pub async fn handle(&self, event: &CacheEvent) {
        match event {
            CacheEvent::Mutated {
                collection,
                id,
                mutation,
            } => {
                for step in plan(collection, id.as_deref(), *mutation) {
                    debug!(collection = collection.name, ?mutation, ?step, "Invalidating");
                    match step {
                        Invalidation::Key(key) => self.cache.remove(&key).await,
                        Invalidation::Prefix(prefix) => self.cache.clear_by_prefix(prefix).await,
                    }
                }
            }
            // Also drops collections this session never touched
            CacheEvent::LoggedOut => self.cache.clear_all().await,
        }
    }

    pub async fn mutated(&self, collection: Collection, id: Option<&str>, mutation: Mutation) {
        self.handle(&CacheEvent::Mutated {
            collection,
            id: id.map(str::to_string),
            mutation,
        })
        .await;
    }

    pub async fn logged_out(&self) {
        self.handle(&CacheEvent::LoggedOut).await;
    }
}
