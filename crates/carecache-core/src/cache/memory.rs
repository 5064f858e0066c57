use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;

use super::entry::CacheEntry;

#[derive(Debug, Default)]
struct Entries {
    map: HashMap<String, CacheEntry<Value>>,
    /// Bumped by every mutation. Lets a reader that suspended between
    /// observing a miss and repopulating detect that it lost a race.
    epoch: u64,
}

/// Process-lifetime map from cache key to entry.
///
/// Not TTL-aware: expiry is enforced by the manager. Operations are
/// synchronous and never suspend; the mutex only matters because callers
/// may live on different runtime worker threads.
#[derive(Debug, Default)]
pub struct MemoryTier {
    entries: Mutex<Entries>,
}

impl MemoryTier {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        // A panic while holding the lock cannot leave a half-written entry
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &str) -> Option<CacheEntry<Value>> {
        self.lock().map.get(key).cloned()
    }

    pub fn put(&self, key: impl Into<String>, entry: CacheEntry<Value>) {
        let mut entries = self.lock();
        entries.epoch += 1;
        entries.map.insert(key.into(), entry);
    }

    /// Current mutation epoch, to be handed back to [`put_if_unchanged`](Self::put_if_unchanged).
    pub fn epoch(&self) -> u64 {
        self.lock().epoch
    }

    /// Insert `entry` only if nothing has been written or evicted since
    /// `epoch` was read. Returns whether the entry was stored.
    pub fn put_if_unchanged(
        &self,
        key: impl Into<String>,
        entry: CacheEntry<Value>,
        epoch: u64,
    ) -> bool {
        let mut entries = self.lock();
        if entries.epoch != epoch {
            return false;
        }
        entries.map.insert(key.into(), entry);
        true
    }

    pub fn delete(&self, key: &str) -> bool {
        let mut entries = self.lock();
        entries.epoch += 1;
        entries.map.remove(key).is_some()
    }

    /// Delete every entry whose key matches `predicate`, returning how many went.
    pub fn delete_where(&self, predicate: impl Fn(&str) -> bool) -> usize {
        let mut entries = self.lock();
        entries.epoch += 1;
        let before = entries.map.len();
        entries.map.retain(|key, _| !predicate(key));
        before - entries.map.len()
    }

    pub fn clear(&self) {
        let mut entries = self.lock();
        entries.epoch += 1;
        entries.map.clear();
    }

    pub fn size(&self) -> usize {
        self.lock().map.len()
    }
}
