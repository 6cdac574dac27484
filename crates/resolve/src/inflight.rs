//! Registry of cache keys with an outstanding resolution.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::CacheKey;

type Keys = Arc<Mutex<HashSet<CacheKey>>>;

/// Set of keys currently being resolved.
///
/// A key is marked by [`InFlight::try_begin`] and unmarked when the returned
/// [`InFlightGuard`] is dropped, whatever way the owning task ends.
#[derive(Debug, Default, Clone)]
pub struct InFlight {
    keys: Keys,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `key` as in flight, unless it already is.
    ///
    /// Check and insert happen under one lock acquisition, so two callers
    /// racing on the same key can never both receive a guard.
    pub fn try_begin(&self, key: &CacheKey) -> Option<InFlightGuard> {
        let mut keys = lock(&self.keys);
        if !keys.insert(key.clone()) {
            return None;
        }
        Some(InFlightGuard { keys: Arc::clone(&self.keys), key: key.clone() })
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        lock(&self.keys).contains(key)
    }

    pub fn len(&self) -> usize {
        lock(&self.keys).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.keys).is_empty()
    }
}

fn lock(keys: &Keys) -> MutexGuard<'_, HashSet<CacheKey>> {
    keys.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clears its key from the registry on drop.
#[derive(Debug)]
#[must_use = "the key is unmarked as soon as the guard is dropped"]
pub struct InFlightGuard {
    keys: Keys,
    key: CacheKey,
}
impl InFlightGuard {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }
}
impl Drop for InFlightGuard {
    fn drop(&mut self) {
        lock(&self.keys).remove(&self.key);
    }
}
