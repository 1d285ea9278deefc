//! Read-through cache of materialized content.
//!
//! Keyed by `(document, patch)`. Entries for a document are dropped whenever
//! its head or published pointer moves, so a cached value is never served
//! across a pointer change even though the content at a given patch is
//! itself immutable.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use folio_core::{DocumentId, MaterializedContent, PatchId};
use lru::LruCache;

type Key = (DocumentId, PatchId);

/// Hit/miss counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

pub struct ContentCache {
    entries: Option<Mutex<LruCache<Key, Arc<MaterializedContent>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ContentCache {
    /// A capacity of zero disables caching; every lookup misses.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap))),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.entries.is_some()
    }

    pub fn get(&self, document: DocumentId, patch: PatchId) -> Option<Arc<MaterializedContent>> {
        let found = self
            .lock()
            .and_then(|mut lru| lru.get(&(document, patch)).cloned());
        match found {
            Some(content) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                log::debug!("Cache hit for {document}@{patch}");
                Some(content)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn insert(&self, content: Arc<MaterializedContent>) {
        if let Some(mut lru) = self.lock() {
            lru.put((content.document, content.patch), content);
        }
    }

    /// Drop every entry belonging to `document`. Returns how many were removed.
    pub fn invalidate_document(&self, document: DocumentId) -> usize {
        let Some(mut lru) = self.lock() else {
            return 0;
        };
        let stale: Vec<Key> = lru
            .iter()
            .filter(|(key, _)| key.0 == document)
            .map(|(key, _)| *key)
            .collect();
        for key in &stale {
            lru.pop(key);
        }
        if !stale.is_empty() {
            log::debug!("Invalidated {} cached revisions of {document}", stale.len());
        }
        stale.len()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.lock().map(|lru| lru.len()).unwrap_or(0),
        }
    }

    // A poisoned cache only ever held finished values, so keep using it.
    fn lock(&self) -> Option<MutexGuard<'_, LruCache<Key, Arc<MaterializedContent>>>> {
        self.entries
            .as_ref()
            .map(|m| m.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }
}
