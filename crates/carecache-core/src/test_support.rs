//! Test doubles shared by the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Notify;

use crate::cache::{KeyValueStore, MemoryStore, StoreError};
use crate::remote::{Document, DocumentStore, FilterOp, Query, RemoteError};

/// [`MemoryStore`] that can be told to fail reads or writes.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_read(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("simulated read failure".to_string()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("simulated storage full".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check_read()?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.check_write()?;
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.check_write()?;
        self.inner.remove(key).await
    }

    async fn list_keys(&self) -> Result<Vec<String>, StoreError> {
        self.check_read()?;
        self.inner.list_keys().await
    }

    async fn remove_many(&self, keys: &[String]) -> Result<(), StoreError> {
        self.check_write()?;
        self.inner.remove_many(keys).await
    }
}

/// [`MemoryStore`] whose next `get` can be held after reading its value.
#[derive(Default)]
pub struct GatedStore {
    inner: MemoryStore,
    armed: AtomicBool,
    parked: Notify,
    release: Notify,
}

impl GatedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold the next `get` until [`release`](Self::release).
    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    /// Wait until an armed `get` has read its value and is held.
    pub async fn wait_parked(&self) {
        self.parked.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[async_trait]
impl KeyValueStore for GatedStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = self.inner.get(key).await?;
        if self.armed.swap(false, Ordering::SeqCst) {
            self.parked.notify_one();
            self.release.notified().await;
        }
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.inner.remove(key).await
    }

    async fn list_keys(&self) -> Result<Vec<String>, StoreError> {
        self.inner.list_keys().await
    }

    async fn remove_many(&self, keys: &[String]) -> Result<(), StoreError> {
        self.inner.remove_many(keys).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    ReadAll,
    ReadById,
    Query,
    Create,
    Update,
    Delete,
}

/// In-memory document store that counts calls and fails on demand.
#[derive(Default)]
pub struct ScriptedRemote {
    collections: Mutex<HashMap<String, Vec<Document>>>,
    calls: Mutex<HashMap<Verb, usize>>,
    failing: Mutex<HashSet<Verb>>,
    next_id: AtomicU64,
}

impl ScriptedRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, collection: &str, doc: Document) {
        self.collections
            .lock()
            .unwrap()
            .entry(collection.to_string())
            .or_default()
            .push(doc);
    }

    pub fn calls(&self, verb: Verb) -> usize {
        self.calls.lock().unwrap().get(&verb).copied().unwrap_or(0)
    }

    pub fn fail(&self, verb: Verb) {
        self.failing.lock().unwrap().insert(verb);
    }

    fn record(&self, verb: Verb) -> Result<(), RemoteError> {
        *self.calls.lock().unwrap().entry(verb).or_insert(0) += 1;
        if self.failing.lock().unwrap().contains(&verb) {
            return Err(RemoteError::ServerError(format!("simulated {:?} failure", verb)));
        }
        Ok(())
    }

    fn docs(&self, collection: &str) -> Vec<Document> {
        self.collections
            .lock()
            .unwrap()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }
}

fn id_of(doc: &Document) -> Option<&str> {
    doc.get("id").and_then(Value::as_str)
}

fn matches(doc: &Document, query: &Query) -> bool {
    query.filters.iter().all(|f| {
        let field = doc.get(&f.field).unwrap_or(&Value::Null);
        match f.op {
            FilterOp::Eq => *field == f.value,
            FilterOp::NotEq => *field != f.value,
            FilterOp::In => f
                .value
                .as_array()
                .map(|values| values.contains(field))
                .unwrap_or(false),
            _ => true,
        }
    })
}

#[async_trait]
impl DocumentStore for ScriptedRemote {
    async fn read_all(&self, collection: &str) -> Result<Vec<Document>, RemoteError> {
        self.record(Verb::ReadAll)?;
        Ok(self.docs(collection))
    }

    async fn read_by_id(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, RemoteError> {
        self.record(Verb::ReadById)?;
        Ok(self
            .docs(collection)
            .into_iter()
            .find(|doc| id_of(doc) == Some(id)))
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, RemoteError> {
        self.record(Verb::Query)?;
        Ok(self
            .docs(collection)
            .into_iter()
            .filter(|doc| matches(doc, query))
            .collect())
    }

    async fn create(&self, collection: &str, mut data: Document) -> Result<String, RemoteError> {
        self.record(Verb::Create)?;
        let id = format!("new-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        if let Some(object) = data.as_object_mut() {
            object.insert("id".to_string(), Value::String(id.clone()));
        }
        self.insert(collection, data);
        Ok(id)
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        partial: Document,
    ) -> Result<(), RemoteError> {
        self.record(Verb::Update)?;
        let mut collections = self.collections.lock().unwrap();
        let doc = collections
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|doc| id_of(doc) == Some(id)))
            .ok_or_else(|| RemoteError::NotFound(format!("{}/{}", collection, id)))?;
        if let (Some(target), Some(fields)) = (doc.as_object_mut(), partial.as_object()) {
            for (k, v) in fields {
                target.insert(k.clone(), v.clone());
            }
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), RemoteError> {
        self.record(Verb::Delete)?;
        if let Some(docs) = self.collections.lock().unwrap().get_mut(collection) {
            docs.retain(|doc| id_of(doc) != Some(id));
        }
        Ok(())
    }
}
