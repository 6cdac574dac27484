//! SQLite-backed tracker repository.

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{NewTracker, Status, Tracker, TrackerRow};
use crate::TrackerStore;
use async_trait::async_trait;
use exn::ResultExt;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use time::UtcDateTime;
use tracing::instrument;

const SELECT_TRACKERS: &str = "SELECT id, title, status, source_key, source_url, source_item_id, \
     latest_chapter, latest_release_at, last_checked_at FROM trackers";

/// Repository for tracker rows.
///
/// Implements the narrow [`TrackerStore`] port used by synchronization, plus
/// the few extra operations the CLI needs to seed and inspect trackers.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl Repository {
    /// Store a new tracker and return its identifier.
    pub async fn insert(&self, tracker: &NewTracker) -> Result<i64> {
        let result = sqlx::query(include_str!("../queries/insert_tracker.sql"))
            .bind(&tracker.title)
            .bind(tracker.status.to_string())
            .bind(&tracker.source_key)
            .bind(&tracker.source_url)
            .bind(&tracker.source_item_id)
            .bind(tracker.latest_chapter)
            .bind(tracker.latest_release_at.map(UtcDateTime::unix_timestamp))
            .bind(UtcDateTime::now().unix_timestamp())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get(&self, id: i64) -> Result<Option<Tracker>> {
        let row: Option<TrackerRow> = sqlx::query_as(include_str!("../queries/get_tracker.sql"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(Tracker::try_from).transpose()
    }
}

#[async_trait]
impl TrackerStore for Repository {
    #[instrument(skip(self))]
    async fn list_for_polling(&self, statuses: &[Status]) -> Result<Vec<Tracker>> {
        let mut query = QueryBuilder::<Sqlite>::new(SELECT_TRACKERS);
        if !statuses.is_empty() {
            query.push(" WHERE status IN (");
            let mut separated = query.separated(", ");
            for status in statuses {
                separated.push_bind(status.to_string());
            }
            separated.push_unseparated(")");
        }
        query.push(" ORDER BY id ASC");
        let rows: Vec<TrackerRow> =
            query.build_query_as::<TrackerRow>().fetch_all(&self.pool).await.or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(Tracker::try_from).collect()
    }

    #[instrument(skip(self))]
    async fn update_polling_state(
        &self,
        id: i64,
        latest_chapter: Option<f64>,
        latest_release_at: Option<UtcDateTime>,
        checked_at: UtcDateTime,
    ) -> Result<()> {
        let result = sqlx::query(include_str!("../queries/update_polling_state.sql"))
            .bind(latest_chapter)
            .bind(latest_release_at.map(UtcDateTime::unix_timestamp))
            .bind(checked_at.unix_timestamp())
            .bind(id)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        if result.rows_affected() == 0 {
            exn::bail!(ErrorKind::TrackerNotFound(id));
        }
        Ok(())
    }
}
