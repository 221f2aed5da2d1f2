//! Named cache buckets.
//!
//! A bucket maps request URL to a stored response snapshot. Bucket names are
//! derived from the version tag, so the activation sweep can retire a whole
//! generation by name alone.

use bytes::Bytes;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use sklabs_net::{FetchRequest, FetchResponse};

/// A stored request/response pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Request URL.
    pub url: String,

    /// Request method. Only GET is ever stored.
    pub method: String,

    /// Response status.
    pub status: u16,

    /// Response headers.
    pub headers: HashMap<String, String>,

    /// Response body.
    pub body: Vec<u8>,

    /// Stored-at timestamp (ms since epoch).
    pub stored_at: u64,
}

impl CacheEntry {
    /// Snapshot a response for storage.
    ///
    /// This is the "clone before put": the returned entry owns copies of the
    /// headers and body, so the original response can still go to the caller.
    pub fn snapshot(request: &FetchRequest, response: &FetchResponse) -> Self {
        Self {
            url: request.url.to_string(),
            method: request.method.clone(),
            status: response.status,
            headers: response.headers.clone(),
            body: response.body.to_vec(),
            stored_at: now_millis(),
        }
    }

    /// Rebuild a response from this entry, marked as cache-served.
    pub fn to_response(&self) -> FetchResponse {
        FetchResponse {
            status: self.status,
            headers: self.headers.clone(),
            body: Bytes::copy_from_slice(&self.body),
            from_cache: true,
        }
    }
}

fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// A named cache bucket.
#[derive(Debug, Default)]
pub struct Cache {
    /// Bucket name.
    pub name: String,

    /// Stored entries keyed by URL.
    entries: HashMap<String, CacheEntry>,
}

impl Cache {
    /// Create an empty bucket.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: HashMap::new(),
        }
    }

    /// Match a request URL.
    pub fn match_request(&self, url: &str) -> Option<&CacheEntry> {
        self.entries.get(url)
    }

    /// Store an entry under its URL, replacing any previous one.
    pub fn put(&mut self, entry: CacheEntry) {
        self.entries.insert(entry.url.clone(), entry);
    }

    /// Commit a batch of entries at once.
    ///
    /// Install uses this for its all-or-nothing contract: every precache
    /// response is fetched before any of them lands in the bucket.
    pub fn put_all(&mut self, entries: Vec<CacheEntry>) {
        for entry in entries {
            self.put(entry);
        }
    }

    /// Delete an entry.
    pub fn delete(&mut self, url: &str) -> bool {
        self.entries.remove(url).is_some()
    }

    /// All stored URLs.
    pub fn keys(&self) -> Vec<&str> {
        self.entries.keys().map(|s| s.as_str()).collect()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the bucket is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The set of named buckets owned by this agent.
#[derive(Debug, Default)]
pub struct CacheStorage {
    caches: HashMap<String, Cache>,
}

impl CacheStorage {
    /// Create empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a bucket, creating it on first use.
    pub fn open(&mut self, name: &str) -> &mut Cache {
        self.caches
            .entry(name.to_string())
            .or_insert_with(|| Cache::new(name))
    }

    /// Check if a bucket exists.
    pub fn has(&self, name: &str) -> bool {
        self.caches.contains_key(name)
    }

    /// Delete a bucket by name.
    pub fn delete(&mut self, name: &str) -> bool {
        self.caches.remove(name).is_some()
    }

    /// All bucket names.
    pub fn keys(&self) -> Vec<&str> {
        self.caches.keys().map(|s| s.as_str()).collect()
    }

    /// Match a URL across every bucket.
    pub fn match_request(&self, url: &str) -> Option<&CacheEntry> {
        self.caches
            .values()
            .find_map(|cache| cache.match_request(url))
    }
}
