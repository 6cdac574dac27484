//! Bounded concurrency for upstream calls.

use lectern_connector::normalize_key;
use std::collections::HashSet;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Which pool a source draws its tokens from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolKind {
    Default,
    /// Reserved for sources known to be slow or rate-limited.
    Slow,
}
impl Display for PoolKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Default => f.write_str("default"),
            Self::Slow => f.write_str("slow"),
        }
    }
}

/// A capacity unit of a pool. Capacity is returned when this is dropped.
#[derive(Debug)]
pub struct PoolToken {
    kind: PoolKind,
    _permit: OwnedSemaphorePermit,
}
impl PoolToken {
    pub fn kind(&self) -> PoolKind {
        self.kind
    }
}

/// Two fixed-capacity gates in front of every upstream call.
///
/// Sources listed as slow share a small pool of their own, so a site that
/// takes thirty seconds per request can tie up at most `slow_capacity`
/// workers while everything else keeps flowing through the default pool.
#[derive(Debug)]
pub struct FetchPools {
    default: Arc<Semaphore>,
    slow: Arc<Semaphore>,
    default_capacity: usize,
    slow_capacity: usize,
    slow_sources: HashSet<String>,
}

impl FetchPools {
    /// Capacities below one are raised to one.
    pub fn new<S: AsRef<str>>(
        default_capacity: usize,
        slow_capacity: usize,
        slow_sources: impl IntoIterator<Item = S>,
    ) -> Self {
        let default_capacity = default_capacity.max(1);
        let slow_capacity = slow_capacity.max(1);
        Self {
            default: Arc::new(Semaphore::new(default_capacity)),
            slow: Arc::new(Semaphore::new(slow_capacity)),
            default_capacity,
            slow_capacity,
            slow_sources: slow_sources.into_iter().map(|s| normalize_key(s.as_ref())).collect(),
        }
    }

    pub fn is_slow(&self, source_key: &str) -> bool {
        self.slow_sources.contains(&normalize_key(source_key))
    }

    pub fn kind_for(&self, source_key: &str) -> PoolKind {
        if self.is_slow(source_key) { PoolKind::Slow } else { PoolKind::Default }
    }

    pub fn capacity(&self, kind: PoolKind) -> usize {
        match kind {
            PoolKind::Default => self.default_capacity,
            PoolKind::Slow => self.slow_capacity,
        }
    }

    /// Tokens currently available in the pool.
    pub fn available(&self, kind: PoolKind) -> usize {
        self.semaphore(kind).available_permits()
    }

    /// Wait for a token from the pool serving `kind`.
    ///
    /// Returns `None` only if the pool has been closed.
    pub async fn acquire(&self, kind: PoolKind) -> Option<PoolToken> {
        let permit = Arc::clone(self.semaphore(kind)).acquire_owned().await.ok()?;
        Some(PoolToken { kind, _permit: permit })
    }

    /// Refuse all further acquisitions. Tokens already handed out stay valid.
    pub fn close(&self) {
        self.default.close();
        self.slow.close();
    }

    fn semaphore(&self, kind: PoolKind) -> &Arc<Semaphore> {
        match kind {
            PoolKind::Default => &self.default,
            PoolKind::Slow => &self.slow,
        }
    }
}
