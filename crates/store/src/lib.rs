//! Tracker persistence.
//!
//! Synchronization only needs two things from storage: the list of trackers
//! to poll, and a way to write back the chapter/timestamp fields it owns.
//! Those two operations form the [`TrackerStore`] port. [`Repository`] is the
//! SQLite implementation; a `MockStore` is available behind the `mock`
//! feature for tests in other crates.

mod db;
pub mod error;
#[cfg(feature = "mock")]
mod mock;
mod models;
mod repo;

pub use crate::db::{Database, Location};
#[cfg(feature = "mock")]
pub use crate::mock::MockStore;
pub use crate::models::{NewTracker, Status, Tracker};
pub use crate::repo::Repository;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use time::UtcDateTime;

pub type StoreHandle = Arc<dyn TrackerStore + Send + Sync>;

/// Persistence port used by the poller.
#[async_trait]
pub trait TrackerStore: Send + Sync {
    /// Trackers eligible for polling, ordered by id. An empty `statuses`
    /// slice means "every status".
    async fn list_for_polling(&self, statuses: &[Status]) -> Result<Vec<Tracker>>;

    /// Write back the result of polling one tracker.
    ///
    /// `latest_release_at = None` leaves the stored release timestamp
    /// untouched; it is never cleared. `checked_at` is always written.
    async fn update_polling_state(
        &self,
        id: i64,
        latest_chapter: Option<f64>,
        latest_release_at: Option<UtcDateTime>,
        checked_at: UtcDateTime,
    ) -> Result<()>;
}
