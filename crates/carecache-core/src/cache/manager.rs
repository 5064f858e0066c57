use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use super::entry::{self, CacheEntry};
use super::error::EncodeError;
use super::memory::MemoryTier;
use super::persistent::{KeyValueStore, PersistentTier};

/// Schema version of persisted entries.
/// Bump whenever a cached model changes shape; older entries are wiped on startup.
pub const CACHE_VERSION: &str = "3";

/// Sentinel prefix of every key the cache owns in the persistent store.
pub const KEY_NAMESPACE: &str = "@cache_";

/// Key (under the namespace) holding the stored schema version.
/// Cache keys equal to this name are reserved.
const VERSION_KEY_NAME: &str = "version";

/// Default TTL for entries written without an explicit one.
const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Compared with the stored version at startup.
    pub version: String,
    pub default_ttl: Duration,
    /// Prefix applied to every persistent key.
    pub namespace: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            version: CACHE_VERSION.to_string(),
            default_ttl: DEFAULT_TTL,
            namespace: KEY_NAMESPACE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub memory_entry_count: usize,
    pub persistent_entry_count: usize,
}

/// Work for the persistence writer, applied strictly in send order.
enum PersistOp {
    Set {
        key: String,
        value: String,
    },
    Remove {
        key: String,
        done: oneshot::Sender<()>,
    },
    /// Remove the key only if what is stored there is still expired.
    PurgeExpired {
        key: String,
    },
    RemovePrefix {
        prefix: String,
        done: oneshot::Sender<()>,
    },
    Flush(oneshot::Sender<()>),
}

/// Orchestrates the memory and persistent tiers.
///
/// Reads check memory, then the persistent store. Writes land in memory
/// synchronously and are persisted by a background writer task; the memory
/// tier is the source of truth for the rest of the process lifetime.
///
/// On construction the writer first runs the schema version check, flushing
/// everything if the stored version differs from [`CacheConfig::version`].
/// Callers are not held up by this: a read racing ahead of the check may
/// still observe an entry that is about to be flushed.
pub struct CacheManager {
    config: CacheConfig,
    memory: Arc<MemoryTier>,
    persistent: PersistentTier,
    writer: mpsc::UnboundedSender<PersistOp>,
    ready: watch::Receiver<bool>,
}

impl CacheManager {
    /// Create a manager over `store` and start its persistence writer.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(store: Arc<dyn KeyValueStore>, config: CacheConfig) -> Self {
        let memory = Arc::new(MemoryTier::new());
        let persistent = PersistentTier::new(store);
        let (writer, rx) = mpsc::unbounded_channel();
        let (ready_tx, ready) = watch::channel(false);

        let worker = Writer {
            persistent: persistent.clone(),
            memory: memory.clone(),
            version: config.version.clone(),
            namespace: config.namespace.clone(),
        };
        tokio::spawn(worker.run(rx, ready_tx));

        Self {
            config,
            memory,
            persistent,
            writer,
            ready,
        }
    }

    pub fn with_defaults(store: Arc<dyn KeyValueStore>) -> Self {
        Self::new(store, CacheConfig::default())
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Wait until the startup version check has finished.
    pub async fn ready(&self) {
        let mut ready = self.ready.clone();
        if ready.wait_for(|done| *done).await.is_err() {
            warn!("Cache writer stopped before the version check completed");
        }
    }

    fn storage_key(&self, key: &str) -> String {
        format!("{}{}", self.config.namespace, key)
    }

    fn enqueue(&self, op: PersistOp) {
        if self.writer.send(op).is_err() {
            warn!("Cache writer is gone, change applied to memory only");
        }
    }

    async fn enqueue_and_wait(&self, op: PersistOp, done: oneshot::Receiver<()>) {
        self.enqueue(op);
        // The writer drops `done` without answering only when it is shutting down
        let _ = done.await;
    }

    /// Fresh payload for `key`, if any.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_entry(key).await.map(|entry| entry.payload)
    }

    /// Like [`get`](Self::get) but keeps the entry metadata.
    pub async fn get_entry<T: DeserializeOwned>(&self, key: &str) -> Option<CacheEntry<T>> {
        if let Some(cached) = self.memory.get(key) {
            if cached.is_fresh_at(Utc::now()) {
                return Self::typed(key, cached);
            }
            debug!(key = %key, "Memory entry expired");
            self.memory.delete(key);
        }

        let storage_key = self.storage_key(key);
        let epoch = self.memory.epoch();
        let raw = self.persistent.get(&storage_key).await?;
        let stored: CacheEntry<Value> = match entry::decode(&raw) {
            Ok(stored) => stored,
            Err(e) => {
                debug!(key = %key, error = %e, "Undecodable persistent entry, treating as miss");
                return None;
            }
        };

        if !stored.is_fresh_at(Utc::now()) {
            debug!(key = %key, "Persistent entry expired");
            self.enqueue(PersistOp::PurgeExpired { key: storage_key });
            return None;
        }

        let typed = Self::typed(key, stored.clone())?;
        if !self.memory.put_if_unchanged(key, stored, epoch) {
            debug!(key = %key, "Memory tier changed during persistent read, not repopulating");
        }
        Some(typed)
    }

    fn typed<T: DeserializeOwned>(key: &str, cached: CacheEntry<Value>) -> Option<CacheEntry<T>> {
        let CacheEntry {
            payload,
            written_at,
            ttl_millis,
        } = cached;
        match serde_json::from_value(payload) {
            Ok(payload) => Some(CacheEntry {
                payload,
                written_at,
                ttl_millis,
            }),
            Err(e) => {
                debug!(key = %key, error = %e, "Cached payload has unexpected shape, treating as miss");
                None
            }
        }
    }

    /// Store `payload` under `key` with the default TTL.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, payload: &T) -> Result<(), EncodeError> {
        self.set_with_ttl(key, payload, self.config.default_ttl)
    }

    /// Store `payload` under `key`, replacing any previous entry.
    ///
    /// The memory tier is updated before this returns; the persistent write
    /// happens in the background and its failure is only logged.
    pub fn set_with_ttl<T: Serialize + ?Sized>(
        &self,
        key: &str,
        payload: &T,
        ttl: Duration,
    ) -> Result<(), EncodeError> {
        let value = serde_json::to_value(payload).map_err(EncodeError)?;
        let cached = CacheEntry::new(value, ttl);
        let encoded = entry::encode(&cached)?;

        self.memory.put(key, cached);
        self.enqueue(PersistOp::Set {
            key: self.storage_key(key),
            value: encoded,
        });
        Ok(())
    }

    pub async fn remove(&self, key: &str) {
        self.memory.delete(key);
        let (done, wait) = oneshot::channel();
        self.enqueue_and_wait(
            PersistOp::Remove {
                key: self.storage_key(key),
                done,
            },
            wait,
        )
        .await;
    }

    /// Drop every entry whose key starts with `prefix`, in both tiers.
    pub async fn clear_by_prefix(&self, prefix: &str) {
        let removed = self.memory.delete_where(|k| k.starts_with(prefix));
        debug!(prefix = %prefix, removed, "Cleared memory entries by prefix");
        let (done, wait) = oneshot::channel();
        self.enqueue_and_wait(
            PersistOp::RemovePrefix {
                prefix: self.storage_key(prefix),
                done,
            },
            wait,
        )
        .await;
    }

    /// Drop every cache-owned entry. Unrelated keys in the store are untouched.
    pub async fn clear_all(&self) {
        info!("Clearing all cached data");
        self.memory.clear();
        let (done, wait) = oneshot::channel();
        self.enqueue_and_wait(
            PersistOp::RemovePrefix {
                prefix: self.config.namespace.clone(),
                done,
            },
            wait,
        )
        .await;
    }

    /// Wait for every persistent write queued so far to be applied.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        self.enqueue_and_wait(PersistOp::Flush(done), wait).await;
    }

    /// Entry counts per tier. Diagnostic only.
    pub async fn stats(&self) -> CacheStats {
        let version_key = self.storage_key(VERSION_KEY_NAME);
        let persistent_entry_count = self
            .persistent
            .list_keys()
            .await
            .iter()
            .filter(|k| k.starts_with(&self.config.namespace) && **k != version_key)
            .count();
        CacheStats {
            memory_entry_count: self.memory.size(),
            persistent_entry_count,
        }
    }

    /// Schema version currently recorded in the persistent store.
    pub async fn stored_version(&self) -> Option<String> {
        self.persistent
            .get(&self.storage_key(VERSION_KEY_NAME))
            .await
    }
}

/// Background task applying persistent writes in order.
struct Writer {
    persistent: PersistentTier,
    memory: Arc<MemoryTier>,
    version: String,
    namespace: String,
}

impl Writer {
    fn version_key(&self) -> String {
        format!("{}{}", self.namespace, VERSION_KEY_NAME)
    }

    async fn run(self, mut rx: mpsc::UnboundedReceiver<PersistOp>, ready: watch::Sender<bool>) {
        self.initialize().await;
        let _ = ready.send(true);

        while let Some(op) = rx.recv().await {
            match op {
                PersistOp::Set { key, value } => {
                    self.persistent.set(&key, &value).await;
                }
                PersistOp::Remove { key, done } => {
                    self.persistent.remove(&key).await;
                    let _ = done.send(());
                }
                PersistOp::PurgeExpired { key } => self.purge_expired(&key).await,
                PersistOp::RemovePrefix { prefix, done } => {
                    self.remove_prefix(&prefix).await;
                    let _ = done.send(());
                }
                PersistOp::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }
        debug!("Cache writer stopped");
    }

    /// Compare the stored schema version with ours; wipe everything on mismatch.
    async fn initialize(&self) {
        let version_key = self.version_key();
        match self.persistent.get(&version_key).await {
            Some(stored) if stored == self.version => {
                debug!(version = %stored, "Cache version current");
            }
            stored => {
                info!(
                    stored = ?stored,
                    expected = %self.version,
                    "Cache version changed, flushing cache"
                );
                self.remove_prefix(&self.namespace).await;
                self.memory.clear();
                self.persistent.set(&version_key, &self.version).await;
            }
        }
    }

    async fn remove_prefix(&self, prefix: &str) {
        let version_key = self.version_key();
        let keys: Vec<String> = self
            .persistent
            .list_keys()
            .await
            .into_iter()
            .filter(|k| k.starts_with(prefix) && *k != version_key)
            .collect();
        self.persistent.remove_many(&keys).await;
    }

    async fn purge_expired(&self, key: &str) {
        let Some(raw) = self.persistent.get(key).await else {
            return;
        };
        let still_expired = match entry::decode::<Value>(&raw) {
            Ok(stored) => !stored.is_fresh_at(Utc::now()),
            Err(_) => false,
        };
        if still_expired {
            self.persistent.remove(key).await;
        }
    }
}
