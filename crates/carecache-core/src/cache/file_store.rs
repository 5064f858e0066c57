use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use futures::future::join_all;
use tracing::debug;

use super::error::StoreError;
use super::persistent::KeyValueStore;

/// Extension of every value file in the store directory.
const VALUE_EXTENSION: &str = "json";

/// [`KeyValueStore`] keeping one file per key inside a directory.
///
/// Keys are percent-encoded into file names so that `:` and `@` survive on
/// every platform. Writes go to a temporary file first and are renamed into
/// place, so a crash never leaves a truncated value behind.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    tmp_counter: AtomicU64,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            tmp_counter: AtomicU64::new(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn value_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        if key.is_empty() {
            return Err(StoreError::InvalidKey("empty key".to_string()));
        }
        Ok(self
            .dir
            .join(format!("{}.{}", escape_key(key), VALUE_EXTENSION)))
    }
}

fn escape_key(key: &str) -> String {
    urlencoding::encode(key).into_owned()
}

/// Key stored in file stem `name`, or `None` for files this store did not write.
fn unescape_key(name: &str) -> Option<String> {
    let key = urlencoding::decode(name).ok()?;
    // Only canonical encodings round-trip; anything else is a foreign file
    (escape_key(&key) == name).then(|| key.into_owned())
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.value_path(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.value_path(key)?;
        let n = self.tmp_counter.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("{}.tmp", n));
        tokio::fs::write(&tmp, value).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.value_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_keys(&self) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(VALUE_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match unescape_key(stem) {
                Some(key) => keys.push(key),
                None => debug!(file = %path.display(), "Skipping foreign file in store directory"),
            }
        }
        Ok(keys)
    }

    async fn remove_many(&self, keys: &[String]) -> Result<(), StoreError> {
        let results = join_all(keys.iter().map(|key| self.remove(key))).await;
        results.into_iter().collect()
    }
}
