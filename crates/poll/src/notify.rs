//! New-chapter notifications.

use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use lectern_connector::format_chapter;
use lectern_store::Tracker;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

pub type NotifierHandle = Arc<dyn Notifier + Send + Sync>;

/// A message for the user, with machine-readable context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub context: BTreeMap<String, String>,
}

impl Notification {
    /// Announce that `tracker` advanced from `previous` to `chapter`.
    pub fn new_chapter(tracker: &Tracker, previous: Option<f64>, chapter: f64) -> Self {
        let new_chapter = format_chapter(chapter);
        let previous_chapter = previous.map(format_chapter).unwrap_or_default();
        let body = if previous_chapter.is_empty() {
            format!("Chapter {new_chapter} is available.")
        } else {
            format!("Chapter {new_chapter} is available (previously {previous_chapter}).")
        };
        let context = BTreeMap::from([
            ("tracker_id".to_string(), tracker.id.to_string()),
            ("title".to_string(), tracker.title.clone()),
            ("status".to_string(), tracker.status.to_string()),
            ("source_key".to_string(), tracker.source_key.clone()),
            ("source_url".to_string(), tracker.source_url.clone()),
            ("previous_chapter".to_string(), previous_chapter),
            ("new_chapter".to_string(), new_chapter),
        ]);
        Self { title: format!("New chapter: {}", tracker.title), body, context }
    }
}

/// Delivery channel for notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &Notification) -> Result<()>;
}

/// Posts each notification as a JSON document to a fixed URL.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("lectern/", env!("CARGO_PKG_VERSION")))
            .build()
            .or_raise(|| ErrorKind::Notify)?;
        Ok(Self { client, url: url.into() })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    #[tracing::instrument(level = "debug", skip_all, fields(url = %self.url))]
    async fn notify(&self, message: &Notification) -> Result<()> {
        self.client
            .post(&self.url)
            .json(message)
            .send()
            .await
            .or_raise(|| ErrorKind::Notify)?
            .error_for_status()
            .or_raise(|| ErrorKind::Notify)?;
        Ok(())
    }
}

/// Discards every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, message: &Notification) -> Result<()> {
        tracing::debug!(title = %message.title, "Notifications disabled; dropping");
        Ok(())
    }
}
