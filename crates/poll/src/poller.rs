use crate::error::{ErrorKind, Result};
use crate::notify::{Notification, NotifierHandle};
use derive_more::Display;
use exn::ResultExt;
use lectern_connector::{Metadata, Registry, format_chapter};
use lectern_store::{Status, StoreHandle, Tracker};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use time::UtcDateTime;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct PollerOptions {
    /// Time between the start of two cycles.
    pub interval: Duration,
    /// Upper bound for resolving a single tracker.
    pub timeout: Duration,
    /// Statuses eligible for polling. Empty means every status.
    pub statuses: Vec<Status>,
    pub notify_enabled: bool,
    /// Statuses for which a new chapter is announced.
    pub notify_statuses: Vec<Status>,
}
impl Default for PollerOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30 * 60),
            timeout: Duration::from_secs(15),
            statuses: Vec::new(),
            notify_enabled: false,
            notify_statuses: vec![Status::Reading],
        }
    }
}
impl PollerOptions {
    /// Replace a zero interval or timeout with the default.
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();
        if self.interval.is_zero() {
            tracing::warn!(default_secs = defaults.interval.as_secs(), "Poll interval must be positive; using default");
            self.interval = defaults.interval;
        }
        if self.timeout.is_zero() {
            tracing::warn!(default_secs = defaults.timeout.as_secs(), "Poll timeout must be positive; using default");
            self.timeout = defaults.timeout;
        }
        self
    }
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    #[display("idle")]
    Idle,
    #[display("running")]
    Running,
}

/// Tally of one synchronization cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Trackers returned by the store.
    pub listed: usize,
    /// Trackers resolved and written back.
    pub checked: usize,
    /// Trackers left untouched because of a missing connector or a failure.
    pub skipped: usize,
    pub advanced: usize,
    pub notified: usize,
}

/// Fields to write back after resolving one tracker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannedUpdate {
    pub latest_chapter: Option<f64>,
    /// `None` leaves the stored release timestamp as it is.
    pub latest_release_at: Option<UtcDateTime>,
    pub advanced: bool,
}

/// Whether `current` is a chapter the user has not seen yet.
pub fn is_new_chapter(previous: Option<f64>, current: Option<f64>) -> bool {
    match (previous, current) {
        (_, None) => false,
        (None, Some(_)) => true,
        (Some(previous), Some(current)) => current > previous,
    }
}

/// Work out what to persist for a tracker whose stored chapter is `previous`.
///
/// The release timestamp is the connector's when it reports one; otherwise
/// an advance is dated `now`, and no advance leaves it unchanged.
pub fn plan_update(previous: Option<f64>, metadata: &Metadata, now: UtcDateTime) -> PlannedUpdate {
    let latest_chapter = metadata.latest_chapter.or(previous);
    let advanced = is_new_chapter(previous, latest_chapter);
    let latest_release_at = metadata.last_updated.or(advanced.then_some(now));
    PlannedUpdate { latest_chapter, latest_release_at, advanced }
}

enum Outcome {
    Skipped,
    Checked { advanced: bool, notified: bool },
}

/// Periodic synchronization of trackers against their sources.
///
/// One cycle resolves every eligible tracker in turn, records the result and
/// announces new chapters. Cycles never overlap: a manual [`run_once`]
/// during a scheduled cycle waits for it to finish.
///
/// [`run_once`]: Poller::run_once
pub struct Poller {
    inner: Arc<Inner>,
    task: Mutex<Option<Scheduled>>,
}

struct Scheduled {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

struct Inner {
    store: StoreHandle,
    registry: Arc<Registry>,
    notifier: NotifierHandle,
    options: PollerOptions,
    cycle: tokio::sync::Mutex<()>,
    running: AtomicBool,
}

impl Poller {
    pub fn new(store: StoreHandle, registry: Arc<Registry>, notifier: NotifierHandle, options: PollerOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                registry,
                notifier,
                options: options.validated(),
                cycle: tokio::sync::Mutex::new(()),
                running: AtomicBool::new(false),
            }),
            task: Mutex::new(None),
        }
    }

    pub fn state(&self) -> PollerState {
        if self.inner.running.load(Ordering::SeqCst) { PollerState::Running } else { PollerState::Idle }
    }

    /// Run one cycle immediately, then one every interval, until `shutdown`
    /// (or [`stop_wait`](Self::stop_wait)) cancels the schedule.
    ///
    /// Must be called from within a Tokio runtime. Starting an already
    /// started poller does nothing.
    pub fn start(&self, shutdown: &CancellationToken) {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if task.as_ref().is_some_and(|scheduled| !scheduled.handle.is_finished()) {
            tracing::warn!("Poller already started");
            return;
        }
        let token = shutdown.child_token();
        let inner = Arc::clone(&self.inner);
        let cancelled = token.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(inner.options.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    () = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        inner.run_cycle(&cancelled).await;
                    },
                }
            }
            tracing::info!("Poller stopped");
        });
        tracing::info!(interval_secs = self.inner.options.interval.as_secs(), "Poller started");
        *task = Some(Scheduled { token, handle });
    }

    /// Cancel the schedule and wait up to `timeout` for the running cycle to
    /// wind down. Returns `false` if it was still running when time ran out.
    pub async fn stop_wait(&self, timeout: Duration) -> bool {
        let scheduled = self.task.lock().unwrap_or_else(PoisonError::into_inner).take();
        let Some(Scheduled { token, handle }) = scheduled else {
            return true;
        };
        token.cancel();
        match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(())) => true,
            Ok(Err(err)) => {
                tracing::error!(error = %err, "Poller task failed");
                true
            },
            Err(_) => {
                tracing::warn!(timeout_secs = timeout.as_secs(), "Poller did not stop in time");
                false
            },
        }
    }

    /// Run one cycle now and report what it did.
    pub async fn run_once(&self) -> CycleReport {
        self.inner.run_cycle(&CancellationToken::new()).await
    }
}

/// Clears the running flag however the cycle ends.
struct RunningFlag<'a>(&'a AtomicBool);
impl<'a> RunningFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}
impl Drop for RunningFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Inner {
    #[tracing::instrument(level = "info", name = "poll_cycle", skip_all)]
    async fn run_cycle(&self, cancelled: &CancellationToken) -> CycleReport {
        let _cycle = self.cycle.lock().await;
        let _running = RunningFlag::raise(&self.running);
        let mut report = CycleReport::default();

        let trackers = match self.eligible().await {
            Ok(trackers) => trackers,
            Err(err) => {
                tracing::error!(error = ?err, "Could not list trackers; skipping cycle");
                return report;
            },
        };
        report.listed = trackers.len();

        for tracker in &trackers {
            if cancelled.is_cancelled() {
                tracing::info!(remaining = report.listed - report.checked - report.skipped, "Cycle interrupted");
                break;
            }
            match self.poll_tracker(tracker).await {
                Outcome::Skipped => report.skipped += 1,
                Outcome::Checked { advanced, notified } => {
                    report.checked += 1;
                    report.advanced += usize::from(advanced);
                    report.notified += usize::from(notified);
                },
            }
        }

        tracing::info!(
            listed = report.listed,
            checked = report.checked,
            skipped = report.skipped,
            advanced = report.advanced,
            notified = report.notified,
            "Poll cycle complete"
        );
        report
    }

    async fn eligible(&self) -> Result<Vec<Tracker>> {
        self.store.list_for_polling(&self.options.statuses).await.or_raise(|| ErrorKind::Store)
    }

    async fn poll_tracker(&self, tracker: &Tracker) -> Outcome {
        let Some(connector) = self.registry.get(&tracker.source_key) else {
            tracing::warn!(tracker = tracker.id, source = %tracker.source_key, "No connector for source; skipping");
            return Outcome::Skipped;
        };
        let metadata = match tokio::time::timeout(self.options.timeout, connector.resolve(&tracker.source_url)).await {
            Ok(Ok(metadata)) => metadata,
            Ok(Err(err)) => {
                tracing::warn!(tracker = tracker.id, url = %tracker.source_url, error = ?err, "Resolution failed");
                return Outcome::Skipped;
            },
            Err(_) => {
                tracing::warn!(tracker = tracker.id, url = %tracker.source_url, "Resolution timed out");
                return Outcome::Skipped;
            },
        };

        let now = UtcDateTime::now();
        let update = plan_update(tracker.latest_chapter, &metadata, now);
        if let Err(err) = self.persist(tracker.id, &update, now).await {
            tracing::error!(tracker = tracker.id, error = ?err, "Could not record polling state");
            return Outcome::Skipped;
        }

        let notified = match update.latest_chapter {
            Some(chapter) if update.advanced => {
                tracing::info!(
                    tracker = tracker.id,
                    title = %tracker.title,
                    chapter = %format_chapter(chapter),
                    "New chapter"
                );
                self.announce(tracker, chapter).await
            },
            _ => false,
        };
        Outcome::Checked { advanced: update.advanced, notified }
    }

    async fn persist(&self, id: i64, update: &PlannedUpdate, checked_at: UtcDateTime) -> Result<()> {
        self.store
            .update_polling_state(id, update.latest_chapter, update.latest_release_at, checked_at)
            .await
            .or_raise(|| ErrorKind::Store)
    }

    /// Deliver a new-chapter notification if this tracker wants one.
    /// Returns whether one was delivered.
    async fn announce(&self, tracker: &Tracker, chapter: f64) -> bool {
        if !self.options.notify_enabled || !self.options.notify_statuses.contains(&tracker.status) {
            return false;
        }
        let message = Notification::new_chapter(tracker, tracker.latest_chapter, chapter);
        match self.notifier.notify(&message).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(tracker = tracker.id, error = ?err, "Notification failed");
                false
            },
        }
    }
}
