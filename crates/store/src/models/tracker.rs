use crate::error::{Error, ErrorKind};
use crate::models::Status;
use exn::ResultExt;
use time::UtcDateTime;

/// Polling projection of a tracked title.
///
/// Only `latest_chapter`, `latest_release_at` and `last_checked_at` are ever
/// written back by synchronization; everything else is owned by whoever
/// manages the tracker list.
#[derive(Debug, Clone, PartialEq)]
pub struct Tracker {
    pub id: i64,
    pub title: String,
    pub status: Status,
    pub source_key: String,
    pub source_url: String,
    pub source_item_id: Option<String>,
    pub latest_chapter: Option<f64>,
    pub latest_release_at: Option<UtcDateTime>,
    pub last_checked_at: Option<UtcDateTime>,
}

/// A tracker that has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTracker {
    pub title: String,
    pub status: Status,
    pub source_key: String,
    pub source_url: String,
    pub source_item_id: Option<String>,
    pub latest_chapter: Option<f64>,
    pub latest_release_at: Option<UtcDateTime>,
}
impl NewTracker {
    pub fn new(title: impl Into<String>, source_key: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            status: Status::Reading,
            source_key: source_key.into(),
            source_url: source_url.into(),
            source_item_id: None,
            latest_chapter: None,
            latest_release_at: None,
        }
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    pub fn with_item_id(mut self, item_id: impl Into<String>) -> Self {
        self.source_item_id = Some(item_id.into());
        self
    }

    pub fn with_chapter(mut self, chapter: f64) -> Self {
        self.latest_chapter = Some(chapter);
        self
    }

    pub fn with_release(mut self, at: UtcDateTime) -> Self {
        self.latest_release_at = Some(at);
        self
    }

    /// Materialize with an identifier assigned by the store.
    pub fn into_tracker(self, id: i64) -> Tracker {
        Tracker {
            id,
            title: self.title,
            status: self.status,
            source_key: self.source_key,
            source_url: self.source_url,
            source_item_id: self.source_item_id,
            latest_chapter: self.latest_chapter,
            latest_release_at: self.latest_release_at,
            last_checked_at: None,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct TrackerRow {
    id: i64,
    title: String,
    status: String,
    source_key: String,
    source_url: String,
    source_item_id: Option<String>,
    latest_chapter: Option<f64>,
    latest_release_at: Option<i64>,
    last_checked_at: Option<i64>,
}

fn from_timestamp(timestamp: Option<i64>, field: &'static str) -> Result<Option<UtcDateTime>, Error> {
    timestamp
        .map(|ts| UtcDateTime::from_unix_timestamp(ts).or_raise(|| ErrorKind::InvalidData(field)))
        .transpose()
}

impl TryFrom<TrackerRow> for Tracker {
    type Error = Error;
    fn try_from(row: TrackerRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            title: row.title,
            status: row.status.parse()?,
            source_key: row.source_key,
            source_url: row.source_url,
            source_item_id: row.source_item_id.filter(|id| !id.trim().is_empty()),
            latest_chapter: row.latest_chapter,
            latest_release_at: from_timestamp(row.latest_release_at, "latest release date")?,
            last_checked_at: from_timestamp(row.last_checked_at, "last checked date")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> TrackerRow {
        TrackerRow {
            id: 7,
            title: "The Teatime Cookbook".to_string(),
            status: "on_hold".to_string(),
            source_key: "novels".to_string(),
            source_url: "https://novels.example/n/12345".to_string(),
            source_item_id: Some(String::new()),
            latest_chapter: Some(10.5),
            latest_release_at: Some(1_700_000_000),
            last_checked_at: None,
        }
    }

    #[test]
    fn test_row_to_model() {
        let tracker = Tracker::try_from(row()).unwrap();
        assert_eq!(tracker.status, Status::OnHold);
        assert_eq!(tracker.latest_chapter, Some(10.5));
        assert_eq!(tracker.latest_release_at.unwrap().unix_timestamp(), 1_700_000_000);
        assert!(tracker.last_checked_at.is_none());
        // Blank item IDs are treated as missing.
        assert!(tracker.source_item_id.is_none());
    }

    #[test]
    fn test_row_with_unknown_status() {
        let mut row = row();
        row.status = "abandoned".to_string();
        let err = Tracker::try_from(row).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidData("status")));
    }
}
