use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use super::ApiPayload;

/// A cached read response and the instant it stops being valid.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    pub key: String,
    pub payload: ApiPayload,
    pub expires_at: Instant,
}

/// TTL cache for idempotent reads.
///
/// Writes come from whichever task completed the request, so every access
/// goes through the mutex. Expired entries are evicted lazily on lookup.
#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: Mutex<HashMap<String, CachedResponse>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<ApiPayload> {
        self.get_at(key, Instant::now())
    }

    /// Lookup as of `now`. An entry is valid strictly before its expiry.
    pub fn get_at(&self, key: &str, now: Instant) -> Option<ApiPayload> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if now < entry.expires_at => Some(entry.payload.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: String, payload: ApiPayload, ttl: Duration) {
        self.insert_at(key, payload, ttl, Instant::now());
    }

    pub fn insert_at(
        &self,
        key: String,
        payload: ApiPayload,
        ttl: Duration,
        now: Instant,
    ) {
        let entry = CachedResponse {
            key: key.clone(),
            payload,
            expires_at: now + ttl,
        };
        self.entries.lock().insert(key, entry);
    }

    pub fn invalidate(&self, key: &str) {
        self.entries.lock().remove(key);
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cache key for `path` plus query parameters.
///
/// Parameters are sorted before hashing so the key does not depend on the
/// order the caller supplied them in.
pub fn cache_key(path: &str, query: &[(String, String)]) -> String {
    if query.is_empty() {
        return path.to_string();
    }

    let mut params: Vec<_> = query.iter().collect();
    params.sort();

    let mut hasher = Sha256::new();
    for (name, value) in params {
        hasher.update(name.as_bytes());
        hasher.update(b"=");
        hasher.update(value.as_bytes());
        hasher.update(b"&");
    }
    let digest = hasher.finalize();
    let hex: String = digest[..8].iter().map(|b| format!("{b:02x}")).collect();
    format!("{path}_{hex}")
}
