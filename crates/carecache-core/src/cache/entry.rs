use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::error::{DecodeError, EncodeError};

/// A cached payload together with the instant it was written and its TTL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub payload: T,
    #[serde(rename = "writtenAt")]
    pub written_at: DateTime<Utc>,
    #[serde(rename = "ttlMillis")]
    pub ttl_millis: u64,
}

impl<T> CacheEntry<T> {
    pub fn new(payload: T, ttl: Duration) -> Self {
        Self {
            payload,
            written_at: Utc::now(),
            ttl_millis: u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Fresh only inside `[written_at, written_at + ttl)`.
    ///
    /// An entry exactly `ttl` old is already expired, and so is one stamped in
    /// the future (clock moved backwards since it was written).
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        let age_ms = (now - self.written_at).num_milliseconds();
        if age_ms < 0 {
            return false;
        }
        (age_ms as u64) < self.ttl_millis
    }

    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(Utc::now())
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.written_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            format!("{}h ago", minutes / 60)
        } else {
            format!("{}d ago", minutes / 1440)
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CacheEntry<U> {
        CacheEntry {
            payload: f(self.payload),
            written_at: self.written_at,
            ttl_millis: self.ttl_millis,
        }
    }
}

/// Encode an entry into the persistent tier's string format.
pub fn encode<T: Serialize>(entry: &CacheEntry<T>) -> Result<String, EncodeError> {
    serde_json::to_string(entry).map_err(EncodeError)
}

/// Decode an entry previously produced by [`encode`].
///
/// Malformed or foreign strings, as well as payloads of a different shape
/// than `T`, yield a [`DecodeError`].
pub fn decode<T: DeserializeOwned>(raw: &str) -> Result<CacheEntry<T>, DecodeError> {
    serde_json::from_str(raw).map_err(DecodeError)
}
