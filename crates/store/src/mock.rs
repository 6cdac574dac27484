//! In-memory tracker store for testing.

use crate::error::{ErrorKind, Result};
use crate::models::{NewTracker, Status, Tracker};
use crate::TrackerStore;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use time::UtcDateTime;
use tokio::sync::RwLock;

/// In-memory tracker store.
///
/// Trackers live in a `BTreeMap` keyed by id behind a [`RwLock`], which gives
/// the same id ordering as the SQLite implementation.
///
/// # Examples
///
/// ```
/// use lectern_store::{MockStore, NewTracker, TrackerStore};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let store = MockStore::with_trackers([NewTracker::new("Title", "site", "https://site.example/t/1")]);
/// assert_eq!(store.list_for_polling(&[]).await.unwrap().len(), 1);
/// # }
/// ```
#[derive(Default)]
pub struct MockStore {
    trackers: RwLock<BTreeMap<i64, Tracker>>,
    updates: AtomicUsize,
    fail_listing: AtomicBool,
}

impl MockStore {
    /// Create a store pre-populated with trackers, assigning ids from 1.
    pub fn with_trackers(trackers: impl IntoIterator<Item = NewTracker>) -> Self {
        let map = trackers
            .into_iter()
            .enumerate()
            .map(|(index, tracker)| {
                let id = i64::try_from(index).unwrap_or(i64::MAX - 1) + 1;
                (id, tracker.into_tracker(id))
            })
            .collect();
        Self { trackers: RwLock::new(map), ..Self::default() }
    }

    pub async fn get(&self, id: i64) -> Option<Tracker> {
        self.trackers.read().await.get(&id).cloned()
    }

    /// Number of successful [`update_polling_state`](TrackerStore::update_polling_state) calls.
    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    /// Make every subsequent listing fail with a database error.
    pub fn fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl TrackerStore for MockStore {
    async fn list_for_polling(&self, statuses: &[Status]) -> Result<Vec<Tracker>> {
        if self.fail_listing.load(Ordering::SeqCst) {
            exn::bail!(ErrorKind::Database);
        }
        Ok(self
            .trackers
            .read()
            .await
            .values()
            .filter(|tracker| statuses.is_empty() || statuses.contains(&tracker.status))
            .cloned()
            .collect())
    }

    async fn update_polling_state(
        &self,
        id: i64,
        latest_chapter: Option<f64>,
        latest_release_at: Option<UtcDateTime>,
        checked_at: UtcDateTime,
    ) -> Result<()> {
        let mut guard = self.trackers.write().await;
        let tracker = guard.get_mut(&id).ok_or_else(|| exn::Exn::from(ErrorKind::TrackerNotFound(id)))?;
        tracker.latest_chapter = latest_chapter;
        if latest_release_at.is_some() {
            tracker.latest_release_at = latest_release_at;
        }
        tracker.last_checked_at = Some(checked_at);
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
