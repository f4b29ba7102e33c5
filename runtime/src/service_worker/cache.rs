//! Cache API Implementation
//!
//! Named request/response caches for the worker. Entries keep insertion
//! order; that order is the only thing eviction looks at.

use std::collections::BTreeMap;
use std::sync::Arc;

use hashbrown::HashMap;
use spin::RwLock;

use super::fetch::{Request, Response};

/// Cache error types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    /// Cache not found
    #[error("cache '{0}' not found")]
    NotFound(String),
    /// Storage error
    #[error("cache storage error: {0}")]
    StorageError(String),
}

/// Cache match options
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheMatchOptions {
    /// Ignore search (query string)
    pub ignore_search: bool,
    /// Ignore method
    pub ignore_method: bool,
}

/// A cached request-response pair
#[derive(Debug, Clone)]
struct CacheEntry {
    request: Request,
    response: Response,
    size: usize,
}

/// A single named cache
#[derive(Debug)]
pub struct Cache {
    /// Cache name
    name: String,
    /// Entries by insertion sequence
    entries: BTreeMap<u64, CacheEntry>,
    /// Request key -> insertion sequence
    index: HashMap<String, u64>,
    next_seq: u64,
    total_size: usize,
}

impl Cache {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: BTreeMap::new(),
            index: HashMap::new(),
            next_seq: 0,
            total_size: 0,
        }
    }

    /// Get cache name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total body bytes held
    pub fn size(&self) -> usize {
        self.total_size
    }

    /// Match a request
    pub fn match_request(&self, request: &Request, options: &CacheMatchOptions) -> Option<Response> {
        if !options.ignore_search && !options.ignore_method {
            return self
                .index
                .get(&request.cache_key())
                .and_then(|seq| self.entries.get(seq))
                .map(|entry| entry.response.clone());
        }

        let wanted = loose_key(request, options);
        self.entries
            .values()
            .rev()
            .find(|entry| loose_key(&entry.request, options) == wanted)
            .map(|entry| entry.response.clone())
    }

    /// Store a request/response pair. An existing entry for the same key is
    /// replaced and becomes the newest entry.
    pub fn put(&mut self, request: Request, response: Response) {
        let key = request.cache_key();
        self.remove_key(&key);

        let seq = self.next_seq;
        self.next_seq += 1;
        let size = response.body.len();
        self.total_size += size;
        self.index.insert(key, seq);
        self.entries.insert(
            seq,
            CacheEntry {
                request,
                response,
                size,
            },
        );
    }

    /// Delete a cached request
    pub fn delete(&mut self, request: &Request) -> bool {
        self.remove_key(&request.cache_key())
    }

    /// Cached requests, oldest first
    pub fn keys(&self) -> Vec<Request> {
        self.entries.values().map(|e| e.request.clone()).collect()
    }

    /// Drop the oldest entries until at most `keep` remain. Returns the
    /// number of entries removed.
    pub fn trim_oldest(&mut self, keep: usize) -> usize {
        let mut removed = 0;
        while self.entries.len() > keep {
            let Some((_, entry)) = self.entries.pop_first() else {
                break;
            };
            self.index.remove(&entry.request.cache_key());
            self.total_size -= entry.size;
            removed += 1;
        }
        removed
    }

    fn remove_key(&mut self, key: &str) -> bool {
        let Some(seq) = self.index.remove(key) else {
            return false;
        };
        if let Some(old) = self.entries.remove(&seq) {
            self.total_size -= old.size;
        }
        true
    }
}

fn loose_key(request: &Request, options: &CacheMatchOptions) -> String {
    let mut url = request.url.clone();
    url.set_fragment(None);
    if options.ignore_search {
        url.set_query(None);
    }
    if options.ignore_method {
        url.to_string()
    } else {
        format!("{}:{}", request.method.as_str(), url)
    }
}

/// Cache storage (manages the named caches of one origin)
///
/// Cheap to clone; clones share the same caches. Locks are only held for
/// the duration of a single call.
#[derive(Debug, Clone, Default)]
pub struct CacheStorage {
    caches: Arc<RwLock<BTreeMap<String, Cache>>>,
}

impl CacheStorage {
    /// Create new cache storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Open or create a cache
    pub fn open(&self, name: &str) {
        let mut caches = self.caches.write();
        if !caches.contains_key(name) {
            log::debug!("[SW] Opening cache {}", name);
            caches.insert(name.to_string(), Cache::new(name));
        }
    }

    /// Check if a cache exists
    pub fn has(&self, name: &str) -> bool {
        self.caches.read().contains_key(name)
    }

    /// Delete a cache. `Ok(false)` when no such cache existed.
    pub fn delete(&self, name: &str) -> Result<bool, CacheError> {
        Ok(self.caches.write().remove(name).is_some())
    }

    /// Get all cache names
    pub fn keys(&self) -> Vec<String> {
        self.caches.read().keys().cloned().collect()
    }

    /// Store a pair in `name`, creating the cache if needed.
    pub fn put(&self, name: &str, request: Request, response: Response) {
        let mut caches = self.caches.write();
        caches
            .entry(name.to_string())
            .or_insert_with(|| Cache::new(name))
            .put(request, response);
    }

    /// Store several pairs in `name` under one lock acquisition.
    pub fn put_all(&self, name: &str, pairs: impl IntoIterator<Item = (Request, Response)>) {
        let mut caches = self.caches.write();
        let cache = caches
            .entry(name.to_string())
            .or_insert_with(|| Cache::new(name));
        for (request, response) in pairs {
            cache.put(request, response);
        }
    }

    /// Match a request in one named cache
    pub fn match_in(&self, name: &str, request: &Request) -> Option<Response> {
        self.caches
            .read()
            .get(name)
            .and_then(|c| c.match_request(request, &CacheMatchOptions::default()))
    }

    /// Match across all caches
    pub fn match_any(&self, request: &Request, options: &CacheMatchOptions) -> Option<Response> {
        self.caches
            .read()
            .values()
            .find_map(|cache| cache.match_request(request, options))
    }

    /// Delete one request from a named cache
    pub fn delete_entry(&self, name: &str, request: &Request) -> Result<bool, CacheError> {
        let mut caches = self.caches.write();
        let cache = caches
            .get_mut(name)
            .ok_or_else(|| CacheError::NotFound(name.to_string()))?;
        Ok(cache.delete(request))
    }

    /// Entry count of a named cache
    pub fn entry_count(&self, name: &str) -> Result<usize, CacheError> {
        self.caches
            .read()
            .get(name)
            .map(Cache::len)
            .ok_or_else(|| CacheError::NotFound(name.to_string()))
    }

    /// Cached requests of a named cache, oldest first
    pub fn entry_keys(&self, name: &str) -> Result<Vec<Request>, CacheError> {
        self.caches
            .read()
            .get(name)
            .map(Cache::keys)
            .ok_or_else(|| CacheError::NotFound(name.to_string()))
    }

    /// FIFO-trim a named cache down to `keep` entries
    pub fn trim_oldest(&self, name: &str, keep: usize) -> Result<usize, CacheError> {
        self.caches
            .write()
            .get_mut(name)
            .map(|c| c.trim_oldest(keep))
            .ok_or_else(|| CacheError::NotFound(name.to_string()))
    }

    /// Total body bytes across all caches
    pub fn usage(&self) -> usize {
        self.caches.read().values().map(Cache::size).sum()
    }
}
