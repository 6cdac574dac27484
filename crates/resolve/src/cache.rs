//! Expiring in-memory result cache.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

use crate::CacheKey;

/// Outcome of a cache read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// No usable entry: never stored, or expired (and now evicted).
    Absent,
    /// A live entry. `found = false` is a cached miss: the last resolution
    /// produced nothing usable and `value` holds whatever fallback was stored.
    Present { value: String, found: bool },
}
impl Lookup {
    /// The `(value, found, present)` triple.
    pub fn into_parts(self) -> (String, bool, bool) {
        match self {
            Self::Absent => (String::new(), false, false),
            Self::Present { value, found } => (value, found, true),
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present { .. })
    }
}

#[derive(Debug)]
struct Entry {
    value: String,
    found: bool,
    expires_at: Instant,
}

/// Key/value store where every entry carries its own expiry.
///
/// Cached hits and cached misses are both ordinary entries; they only differ
/// in their `found` flag and in the TTL the writer chose. Expired entries are
/// evicted lazily, by the read that notices them. The cache never fails.
///
/// Expiry follows the Tokio clock, so paused-time tests can step past a TTL.
#[derive(Debug, Default)]
pub struct ResultCache {
    entries: Mutex<HashMap<CacheKey, Entry>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Lookup {
        self.get_at(key, Instant::now())
    }

    /// Store `value`, replacing any previous entry, until `ttl` from now.
    pub fn set(&self, key: &CacheKey, value: impl Into<String>, found: bool, ttl: Duration) {
        self.set_at(key, value, found, ttl, Instant::now());
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub(crate) fn get_at(&self, key: &CacheKey, now: Instant) -> Lookup {
        let mut entries = self.lock();
        match entries.get(key) {
            None => return Lookup::Absent,
            Some(entry) if entry.expires_at > now => {
                return Lookup::Present { value: entry.value.clone(), found: entry.found };
            },
            Some(_) => {},
        }
        entries.remove(key);
        Lookup::Absent
    }

    pub(crate) fn set_at(&self, key: &CacheKey, value: impl Into<String>, found: bool, ttl: Duration, now: Instant) {
        // An unrepresentable expiry is "forever" for any practical purpose.
        let expires_at = now.checked_add(ttl).unwrap_or_else(|| now + Duration::from_secs(100 * 365 * 24 * 60 * 60));
        self.lock().insert(key.clone(), Entry { value: value.into(), found, expires_at });
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, Entry>> {
        // Every critical section is a single map operation, so a panic while
        // holding the lock cannot leave the map half-updated.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> CacheKey {
        CacheKey::cover("site", name, None)
    }

    #[test]
    fn test_get_after_set_before_expiry() {
        let cache = ResultCache::new();
        let now = Instant::now();
        cache.set_at(&key("a"), "https://img.example/a.jpg", true, Duration::from_secs(60), now);
        let lookup = cache.get_at(&key("a"), now + Duration::from_secs(59));
        assert_eq!(lookup.into_parts(), ("https://img.example/a.jpg".to_string(), true, true));
    }

    #[test]
    fn test_expired_entry_is_absent_and_evicted() {
        let cache = ResultCache::new();
        let now = Instant::now();
        cache.set_at(&key("a"), "https://img.example/a.jpg", true, Duration::from_secs(60), now);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get_at(&key("a"), now + Duration::from_secs(60)), Lookup::Absent);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cached_miss_is_present_but_not_found() {
        let cache = ResultCache::new();
        cache.set(&key("a"), "", false, Duration::from_secs(60));
        assert_eq!(cache.get(&key("a")), Lookup::Present { value: String::new(), found: false });
        assert_eq!(cache.get(&key("b")), Lookup::Absent);
    }

    #[test]
    fn test_set_overwrites() {
        let cache = ResultCache::new();
        let now = Instant::now();
        cache.set_at(&key("a"), "", false, Duration::from_secs(10), now);
        cache.set_at(&key("a"), "https://img.example/new.jpg", true, Duration::from_secs(600), now);
        let lookup = cache.get_at(&key("a"), now + Duration::from_secs(30));
        assert_eq!(lookup, Lookup::Present { value: "https://img.example/new.jpg".to_string(), found: true });
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_independent_expiry_per_entry() {
        let cache = ResultCache::new();
        let now = Instant::now();
        cache.set_at(&key("hit"), "x", true, Duration::from_secs(3600), now);
        cache.set_at(&key("miss"), "", false, Duration::from_secs(30), now);
        let later = now + Duration::from_secs(31);
        assert!(cache.get_at(&key("hit"), later).is_present());
        assert!(!cache.get_at(&key("miss"), later).is_present());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_follows_tokio_clock() {
        let cache = ResultCache::new();
        cache.set(&key("a"), "", false, Duration::from_secs(30));
        tokio::time::advance(Duration::from_secs(29)).await;
        assert!(cache.get(&key("a")).is_present());
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get(&key("a")), Lookup::Absent);
    }

    #[test]
    fn test_huge_ttl_does_not_panic() {
        let cache = ResultCache::new();
        cache.set(&key("a"), "x", true, Duration::MAX);
        assert!(cache.get(&key("a")).is_present());
    }
}
