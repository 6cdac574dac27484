//! In-memory connector for testing.

use crate::error::{ErrorKind, Result};
use crate::{ChapterUrlResolver, Connector, Metadata, format_chapter};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// What a [`MockConnector`] answers for a URL.
#[derive(Debug, Clone)]
pub enum MockResponse {
    Metadata(Metadata),
    Fail(ErrorKind),
    /// Never answer; only useful together with a caller-side timeout.
    Hang,
}

/// Scriptable connector that counts its calls.
///
/// Every call to [`resolve`](Connector::resolve) or
/// [`resolve_chapter_url`](ChapterUrlResolver::resolve_chapter_url) is
/// counted, and the highest number of calls executing at the same time is
/// recorded, so tests can assert on deduplication and concurrency limits.
///
/// # Examples
///
/// ```
/// use lectern_connector::{Connector, Metadata, MockConnector};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let connector = MockConnector::new("site")
///     .with_default(Metadata::default().with_chapter(12.0));
/// let metadata = connector.resolve("https://site.example/t/1").await.unwrap();
/// assert_eq!(metadata.latest_chapter, Some(12.0));
/// assert_eq!(connector.calls(), 1);
/// # }
/// ```
pub struct MockConnector {
    key: String,
    domains: Vec<&'static str>,
    default: MockResponse,
    responses: Mutex<HashMap<String, MockResponse>>,
    chapter_urls: Option<HashMap<String, String>>,
    delay: Duration,
    calls: AtomicUsize,
    chapter_calls: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl MockConnector {
    /// A connector answering every URL with empty metadata.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            domains: Vec::new(),
            default: MockResponse::Metadata(Metadata::default()),
            responses: Mutex::new(HashMap::new()),
            chapter_urls: None,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            chapter_calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    pub fn with_domains(mut self, domains: impl IntoIterator<Item = &'static str>) -> Self {
        self.domains = domains.into_iter().collect();
        self
    }

    /// Answer for URLs without a specific response.
    pub fn with_default(mut self, metadata: Metadata) -> Self {
        self.default = MockResponse::Metadata(metadata);
        self
    }

    pub fn with_default_response(mut self, response: MockResponse) -> Self {
        self.default = response;
        self
    }

    pub fn with_response(self, url: impl Into<String>, response: MockResponse) -> Self {
        self.set_response(url, response);
        self
    }

    /// Simulated upstream latency, applied to every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Enable the chapter URL capability. The resolved link is
    /// `{url}/chapter/{chapter}` unless overridden with [`Self::with_chapter_url`].
    pub fn with_chapter_support(mut self) -> Self {
        self.chapter_urls.get_or_insert_with(HashMap::new);
        self
    }

    /// Enable the chapter URL capability with a fixed answer for one chapter.
    /// An empty string simulates a site that has no link for it.
    pub fn with_chapter_url(mut self, url: &str, chapter: f64, link: impl Into<String>) -> Self {
        self.chapter_urls
            .get_or_insert_with(HashMap::new)
            .insert(chapter_key(url, chapter), link.into());
        self
    }

    /// Change the answer for `url` after construction.
    pub fn set_response(&self, url: impl Into<String>, response: MockResponse) {
        self.responses.lock().unwrap_or_else(|e| e.into_inner()).insert(url.into(), response);
    }

    /// Number of [`resolve`](Connector::resolve) calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of chapter URL calls so far.
    pub fn chapter_calls(&self) -> usize {
        self.chapter_calls.load(Ordering::SeqCst)
    }

    /// Highest number of calls (of either kind) that were executing at once.
    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    async fn enter(&self) -> ActiveGuard<'_> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        let guard = ActiveGuard(&self.active);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        guard
    }
}

fn chapter_key(url: &str, chapter: f64) -> String {
    format!("{url}#{}", format_chapter(chapter))
}

/// Decrements the active counter even when the call future is dropped
/// half-way (e.g. by a caller-side timeout).
struct ActiveGuard<'a>(&'a AtomicUsize);
impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connector for MockConnector {
    fn key(&self) -> &str {
        &self.key
    }

    fn domains(&self) -> &[&str] {
        &self.domains
    }

    async fn resolve(&self, url: &str) -> Result<Metadata> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let _active = self.enter().await;
        let response = self
            .responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(url)
            .cloned()
            .unwrap_or_else(|| self.default.clone());
        match response {
            MockResponse::Metadata(metadata) => Ok(metadata),
            MockResponse::Fail(kind) => Err(exn::Exn::from(kind)),
            MockResponse::Hang => std::future::pending().await,
        }
    }

    fn chapter_urls(&self) -> Option<&dyn ChapterUrlResolver> {
        self.chapter_urls.as_ref().map(|_| self as &dyn ChapterUrlResolver)
    }
}

#[async_trait]
impl ChapterUrlResolver for MockConnector {
    async fn resolve_chapter_url(&self, url: &str, chapter: f64) -> Result<String> {
        self.chapter_calls.fetch_add(1, Ordering::SeqCst);
        let _active = self.enter().await;
        let Some(links) = &self.chapter_urls else {
            exn::bail!(ErrorKind::Unsupported);
        };
        Ok(links
            .get(&chapter_key(url, chapter))
            .cloned()
            .unwrap_or_else(|| format!("{}/chapter/{}", url.trim_end_matches('/'), format_chapter(chapter))))
    }
}
