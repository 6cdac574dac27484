use lectern_connector::{ConnectorHandle, Registry, normalize_key};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio_util::task::TaskTracker;

use crate::cache::{Lookup, ResultCache};
use crate::inflight::{InFlight, InFlightGuard};
use crate::page::PageLiveness;
use crate::pool::{FetchPools, PoolKind};
use crate::CacheKey;

/// How long resolution outcomes stay cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtlPolicy {
    /// A successful resolution. Catalog art and links rarely change.
    pub positive: Duration,
    /// A failed or empty resolution.
    pub negative: Duration,
    /// A failed or empty resolution for a source in the slow set.
    pub unreliable: Duration,
    /// The connector cannot produce this kind of value at all.
    pub definitive_miss: Duration,
}
impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            positive: Duration::from_secs(6 * 60 * 60),
            negative: Duration::from_secs(5 * 60),
            unreliable: Duration::from_secs(30),
            definitive_miss: Duration::from_secs(6 * 60 * 60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolverOptions {
    pub default_capacity: usize,
    pub slow_capacity: usize,
    /// Source keys routed through the slow pool.
    pub slow_sources: Vec<String>,
    /// Upper bound for a single connector call.
    pub fetch_timeout: Duration,
    pub ttl: TtlPolicy,
}
impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            default_capacity: 8,
            slow_capacity: 2,
            slow_sources: Vec::new(),
            fetch_timeout: Duration::from_secs(15),
            ttl: TtlPolicy::default(),
        }
    }
}

/// Answer to a dashboard request.
///
/// With `pending` set, `value` is a fallback (an empty cover, or the plain
/// source URL for chapter links) and a background fetch has been queued; the
/// real value will be served from cache on a later request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub value: String,
    pub pending: bool,
}
impl Resolution {
    pub fn ready(value: impl Into<String>) -> Self {
        Self { value: value.into(), pending: false }
    }

    pub fn pending(fallback: impl Into<String>) -> Self {
        Self { value: fallback.into(), pending: true }
    }
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Cover,
    Chapter,
}

#[derive(Debug)]
enum Job {
    Cover { source_key: String, source_url: String },
    Chapter { source_key: String, source_url: String, chapter: f64 },
}
impl Job {
    fn source_key(&self) -> &str {
        match self {
            Self::Cover { source_key, .. } | Self::Chapter { source_key, .. } => source_key,
        }
    }
}

/// Cover art and chapter link resolution for dashboard rendering.
///
/// None of the request-path methods wait on an upstream site. A request is
/// answered from cache when possible; otherwise at most one background fetch
/// per cache key is queued and a fallback is returned immediately.
///
/// Cloning is cheap and every clone shares the same caches, pools and
/// in-flight registry. Construct one per process.
///
/// Queued fetches are spawned on the Tokio runtime of the calling thread, so
/// the request methods must be called from within a runtime.
#[derive(Debug, Clone)]
pub struct Resolver {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    registry: Arc<Registry>,
    covers: ResultCache,
    chapters: ResultCache,
    in_flight: InFlight,
    pools: FetchPools,
    pages: PageLiveness,
    ttl: TtlPolicy,
    fetch_timeout: Duration,
    tasks: TaskTracker,
    /// Set once by `shutdown`. Guards every reopen of `tasks`.
    shut_down: Mutex<bool>,
}

impl Resolver {
    pub fn new(registry: Arc<Registry>, options: ResolverOptions) -> Self {
        let pools = FetchPools::new(options.default_capacity, options.slow_capacity, &options.slow_sources);
        Self {
            inner: Arc::new(Inner {
                registry,
                covers: ResultCache::new(),
                chapters: ResultCache::new(),
                in_flight: InFlight::new(),
                pools,
                pages: PageLiveness::new(),
                ttl: options.ttl,
                fetch_timeout: options.fetch_timeout,
                tasks: TaskTracker::new(),
                shut_down: Mutex::new(false),
            }),
        }
    }

    /// Record the listing being rendered. Called once per render, before any
    /// resolution for that render.
    pub fn set_active_page(&self, page_key: &str) {
        self.inner.pages.set_active(page_key);
    }

    /// Cover image URL for a title. The fallback is an empty string.
    pub fn resolve_or_queue_cover(
        &self,
        source_key: &str,
        source_url: &str,
        item_id: Option<&str>,
        page_key: &str,
    ) -> Resolution {
        let key = CacheKey::cover(source_key, source_url, item_id);
        let job = Job::Cover { source_key: source_key.to_string(), source_url: source_url.to_string() };
        self.resolve_or_queue(Slot::Cover, key, String::new(), job, page_key)
    }

    /// Deep link to one chapter. The fallback is the title's source URL.
    pub fn resolve_or_queue_chapter_url(
        &self,
        source_key: &str,
        source_url: &str,
        chapter: f64,
        page_key: &str,
    ) -> Resolution {
        let key = CacheKey::chapter(source_key, source_url, chapter);
        let job = Job::Chapter { source_key: source_key.to_string(), source_url: source_url.to_string(), chapter };
        self.resolve_or_queue(Slot::Chapter, key, source_url.to_string(), job, page_key)
    }

    /// Number of keys with a fetch queued or running.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.len()
    }

    pub fn available(&self, kind: PoolKind) -> usize {
        self.inner.pools.available(kind)
    }

    /// Wait until every fetch queued so far has finished. New fetches may
    /// still be queued while (and after) waiting. Safe to race with
    /// [`Self::shutdown`].
    pub async fn wait_idle(&self) {
        self.inner.tasks.close();
        self.inner.tasks.wait().await;
        let shut_down = self.inner.shut_down.lock().unwrap_or_else(PoisonError::into_inner);
        if !*shut_down {
            self.inner.tasks.reopen();
        }
    }

    /// Stop accepting work and wait for running fetches. Fetches still
    /// waiting for a pool token are abandoned.
    pub async fn shutdown(&self) {
        {
            let mut shut_down = self.inner.shut_down.lock().unwrap_or_else(PoisonError::into_inner);
            *shut_down = true;
            self.inner.pools.close();
            self.inner.tasks.close();
        }
        self.inner.tasks.wait().await;
    }

    fn resolve_or_queue(&self, slot: Slot, key: CacheKey, fallback: String, job: Job, page_key: &str) -> Resolution {
        match self.inner.cache(slot).get(&key) {
            Lookup::Present { value, found: true } => Resolution::ready(value),
            // A cached miss is retried like an absent key. The in-flight
            // registry keeps it to one fetch at a time.
            Lookup::Present { found: false, .. } | Lookup::Absent => {
                self.queue_fetch(key, job, page_key);
                Resolution::pending(fallback)
            },
        }
    }

    /// Queue a background fetch unless one is already in flight for `key`.
    /// Returns whether a new fetch was queued.
    fn queue_fetch(&self, key: CacheKey, job: Job, page_key: &str) -> bool {
        let Some(marker) = self.inner.in_flight.try_begin(&key) else {
            tracing::trace!(%key, "Fetch already in flight");
            return false;
        };
        let Ok(runtime) = Handle::try_current() else {
            tracing::warn!(%key, "No async runtime available; not queueing fetch");
            return false;
        };
        let kind = self.inner.pools.kind_for(job.source_key());
        let inner = Arc::clone(&self.inner);
        let page_key = page_key.to_string();
        tracing::debug!(%key, pool = %kind, "Queueing background fetch");
        self.inner.tasks.spawn_on(async move { inner.run(marker, kind, key, job, page_key).await }, &runtime);
        true
    }
}

impl Inner {
    fn cache(&self, slot: Slot) -> &ResultCache {
        match slot {
            Slot::Cover => &self.covers,
            Slot::Chapter => &self.chapters,
        }
    }

    fn negative_ttl(&self, source_key: &str) -> Duration {
        if self.pools.is_slow(source_key) { self.ttl.unreliable } else { self.ttl.negative }
    }

    /// Body of a queued fetch. The pool token and the in-flight marker are
    /// released when this returns, however it returns.
    async fn run(&self, _marker: InFlightGuard, kind: PoolKind, key: CacheKey, job: Job, page_key: String) {
        let Some(_token) = self.pools.acquire(kind).await else {
            tracing::debug!(%key, "Fetch pools closed; abandoning fetch");
            return;
        };
        if !self.pages.is_current(&page_key) {
            tracing::debug!(%key, page = %page_key, "Page no longer displayed; abandoning fetch");
            return;
        }
        match job {
            Job::Cover { source_key, source_url } => self.fetch_cover(&key, &source_key, &source_url).await,
            Job::Chapter { source_key, source_url, chapter } => {
                self.fetch_chapter_url(&key, &source_key, &source_url, chapter).await
            },
        }
    }

    async fn fetch_cover(&self, key: &CacheKey, source_key: &str, source_url: &str) {
        let primary = self.registry.get(source_key);
        let mut cover = match &primary {
            Some(connector) => self.cover_from(connector, source_url).await,
            None => {
                tracing::debug!(source = %source_key, "No connector registered for source");
                None
            },
        };
        // The nominal source does not always match where a title is actually
        // hosted, so give the connector owning the URL's domain one chance.
        if cover.is_none()
            && let Some(fallback) = self.registry.infer_from_url(source_url)
            && primary.as_ref().is_none_or(|p| normalize_key(p.key()) != normalize_key(fallback.key()))
        {
            tracing::debug!(source = %source_key, fallback = %fallback.key(), "Trying connector inferred from URL");
            cover = self.cover_from(&fallback, source_url).await;
        }
        match cover {
            Some(url) => self.covers.set(key, url, true, self.ttl.positive),
            None => self.covers.set(key, "", false, self.negative_ttl(source_key)),
        }
    }

    async fn cover_from(&self, connector: &ConnectorHandle, source_url: &str) -> Option<String> {
        match tokio::time::timeout(self.fetch_timeout, connector.resolve(source_url)).await {
            Ok(Ok(metadata)) => metadata.usable_cover().map(str::to_string),
            Ok(Err(err)) => {
                tracing::warn!(source = %connector.key(), url = %source_url, error = ?err, "Cover resolution failed");
                None
            },
            Err(_) => {
                tracing::warn!(source = %connector.key(), url = %source_url, "Cover resolution timed out");
                None
            },
        }
    }

    async fn fetch_chapter_url(&self, key: &CacheKey, source_key: &str, source_url: &str, chapter: f64) {
        let Some(connector) = self.registry.get(source_key) else {
            tracing::debug!(source = %source_key, "No connector registered for source");
            self.chapters.set(key, source_url, false, self.ttl.definitive_miss);
            return;
        };
        let Some(resolver) = connector.chapter_urls() else {
            self.chapters.set(key, source_url, false, self.ttl.definitive_miss);
            return;
        };
        let outcome = tokio::time::timeout(self.fetch_timeout, resolver.resolve_chapter_url(source_url, chapter)).await;
        match outcome {
            Ok(Ok(link)) if !link.trim().is_empty() => {
                self.chapters.set(key, link.trim(), true, self.ttl.positive);
            },
            Ok(Ok(_)) => {
                tracing::debug!(source = %source_key, chapter, "Connector has no link for chapter");
                self.chapters.set(key, source_url, false, self.negative_ttl(source_key));
            },
            Ok(Err(err)) => {
                tracing::warn!(source = %source_key, chapter, error = ?err, "Chapter URL resolution failed");
                self.chapters.set(key, source_url, false, self.negative_ttl(source_key));
            },
            Err(_) => {
                tracing::warn!(source = %source_key, chapter, "Chapter URL resolution timed out");
                self.chapters.set(key, source_url, false, self.negative_ttl(source_key));
            },
        }
    }
}
