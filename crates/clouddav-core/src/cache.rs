//! Time- and size-bounded cache of directory listings.
//!
//! Keys are absolute virtual paths; values are immutable
//! [`DirectoryListing`]s shared by `Arc`. An entry older than the TTL
//! is logically absent even while still physically present, and the
//! entry count never exceeds the configured capacity (strict LRU
//! eviction). A plain exclusive lock is enough here: the cache sees a
//! handful of entries, and no lock is ever held across a remote call.

use crate::listing::DirectoryListing;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::trace;

struct CacheSlot {
    listing: Arc<DirectoryListing>,
    inserted: Instant,
}

/// Bounded, expiring map from virtual path to directory listing.
pub struct DirCache {
    inner: Mutex<LruCache<String, CacheSlot>>,
    ttl: Duration,
}

impl DirCache {
    /// Create a cache with the given TTL and capacity.
    ///
    /// A zero capacity is clamped to one entry.
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        let cap = NonZeroUsize::new(max_entries.max(1)).expect("clamped to >= 1");
        Self {
            inner: Mutex::new(LruCache::new(cap)),
            ttl,
        }
    }

    /// Look up the listing cached for `path`, refreshing its recency.
    ///
    /// Expired entries are dropped on the way out and reported absent.
    pub fn get(&self, path: &str) -> Option<Arc<DirectoryListing>> {
        let mut inner = self.inner.lock();
        match inner.get(path) {
            Some(slot) if slot.inserted.elapsed() >= self.ttl => {
                trace!(path, "cache entry expired");
            }
            Some(slot) => {
                trace!(path, "cache hit");
                return Some(Arc::clone(&slot.listing));
            }
            None => {
                trace!(path, "cache miss");
                return None;
            }
        }
        inner.pop(path);
        None
    }

    /// Insert or replace the listing for `path`, evicting the least
    /// recently used entry when the capacity bound is exceeded.
    pub fn put(&self, path: String, listing: Arc<DirectoryListing>) {
        let slot = CacheSlot {
            listing,
            inserted: Instant::now(),
        };
        self.inner.lock().put(path, slot);
    }

    /// Drop the entry for `path`. A no-op for absent keys.
    pub fn invalidate(&self, path: &str) {
        if self.inner.lock().pop(path).is_some() {
            trace!(path, "cache entry invalidated");
        }
    }

    /// Drop every entry. The recovery valve for a cache whose contents
    /// can no longer be trusted.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// Number of physically present entries (expired ones included
    /// until their next lookup).
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// True when no entries are present.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured time-to-live.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::ListingEntry;
    use std::time::SystemTime;

    fn listing(names: &[&str]) -> Arc<DirectoryListing> {
        let entries = names
            .iter()
            .map(|name| ListingEntry {
                name: (*name).to_string(),
                remote_path: format!("/{name}"),
                size: 0,
                is_dir: false,
                created: SystemTime::UNIX_EPOCH,
                modified: SystemTime::UNIX_EPOCH,
            })
            .collect();
        Arc::new(DirectoryListing::new(entries))
    }

    #[test]
    fn get_returns_what_put_stored() {
        let cache = DirCache::new(Duration::from_secs(60), 10);
        cache.put("/docs".to_string(), listing(&["a.txt"]));
        let cached = cache.get("/docs").expect("should be cached");
        assert!(cached.find("a.txt").is_some());
        assert!(cache.get("/other").is_none());
    }

    #[test]
    fn entries_expire_after_ttl() {
        let cache = DirCache::new(Duration::from_millis(20), 10);
        cache.put("/docs".to_string(), listing(&["a.txt"]));
        assert!(cache.get("/docs").is_some());

        std::thread::sleep(Duration::from_millis(40));
        assert!(cache.get("/docs").is_none());
        // The expired slot was physically dropped too.
        assert!(cache.is_empty());
    }

    #[test]
    fn capacity_bound_evicts_least_recently_used() {
        let cache = DirCache::new(Duration::from_secs(60), 3);
        cache.put("/a".to_string(), listing(&[]));
        cache.put("/b".to_string(), listing(&[]));
        cache.put("/c".to_string(), listing(&[]));

        // Touch /a so /b becomes the least recently used.
        cache.get("/a");
        cache.put("/d".to_string(), listing(&[]));

        assert_eq!(cache.len(), 3);
        assert!(cache.get("/b").is_none());
        assert!(cache.get("/a").is_some());
        assert!(cache.get("/c").is_some());
        assert!(cache.get("/d").is_some());
    }

    #[test]
    fn invalidate_is_idempotent_for_absent_keys() {
        let cache = DirCache::new(Duration::from_secs(60), 10);
        cache.invalidate("/never-inserted");
        cache.put("/docs".to_string(), listing(&[]));
        cache.invalidate("/docs");
        cache.invalidate("/docs");
        assert!(cache.get("/docs").is_none());
    }

    #[test]
    fn concurrent_access_does_not_corrupt() {
        let cache = Arc::new(DirCache::new(Duration::from_secs(60), 5));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for round in 0..200 {
                        let path = format!("/dir{}", (i + round) % 7);
                        cache.put(path.clone(), listing(&["x"]));
                        cache.get(&path);
                        cache.invalidate(&path);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(cache.len() <= 5);
    }
}
