use async_trait::async_trait;
use lectern_connector::error::ErrorKind as ConnectorError;
use lectern_connector::{Metadata, MockConnector, MockResponse, Registry};
use lectern_poll::error::{ErrorKind, Result};
use lectern_poll::{CycleReport, Notification, Notifier, Poller, PollerOptions, PollerState};
use lectern_store::{MockStore, NewTracker, Status};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use time::UtcDateTime;
use tokio_util::sync::CancellationToken;

const URL: &str = "https://site.example/t/1";

/// Notifier that keeps what it was asked to send.
#[derive(Default)]
struct Recorder {
    sent: Mutex<Vec<Notification>>,
    fail: bool,
}
impl Recorder {
    fn failing() -> Self {
        Self { fail: true, ..Self::default() }
    }

    fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for Recorder {
    async fn notify(&self, message: &Notification) -> Result<()> {
        if self.fail {
            exn::bail!(ErrorKind::Notify);
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

struct Fixture {
    store: Arc<MockStore>,
    connector: Arc<MockConnector>,
    notifier: Arc<Recorder>,
    poller: Poller,
}

fn fixture(trackers: Vec<NewTracker>, connector: MockConnector, notifier: Recorder, options: PollerOptions) -> Fixture {
    let store = Arc::new(MockStore::with_trackers(trackers));
    let connector = Arc::new(connector);
    let notifier = Arc::new(notifier);
    let registry = Registry::new().with(Arc::clone(&connector) as _);
    let poller = Poller::new(Arc::clone(&store) as _, Arc::new(registry), Arc::clone(&notifier) as _, options);
    Fixture { store, connector, notifier, poller }
}

fn notifying() -> PollerOptions {
    PollerOptions { notify_enabled: true, ..PollerOptions::default() }
}

#[tokio::test]
async fn advance_with_reported_timestamp_is_persisted_and_announced() {
    let released = UtcDateTime::now() - time::Duration::hours(3);
    let f = fixture(
        vec![NewTracker::new("Title", "site", URL).with_chapter(10.0)],
        MockConnector::new("site").with_default(Metadata::default().with_chapter(11.0).with_last_updated(released)),
        Recorder::default(),
        notifying(),
    );

    let report = f.poller.run_once().await;

    assert_eq!(report, CycleReport { listed: 1, checked: 1, skipped: 0, advanced: 1, notified: 1 });
    let tracker = f.store.get(1).await.unwrap();
    assert_eq!(tracker.latest_chapter, Some(11.0));
    assert_eq!(tracker.latest_release_at, Some(released));
    assert!(tracker.last_checked_at.is_some());
    let sent = f.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].context["previous_chapter"], "10");
    assert_eq!(sent[0].context["new_chapter"], "11");
}

#[tokio::test]
async fn unchanged_chapter_only_updates_checked_timestamp() {
    let released = UtcDateTime::now() - time::Duration::days(7);
    let f = fixture(
        vec![NewTracker::new("Title", "site", URL).with_chapter(10.0).with_release(released)],
        MockConnector::new("site").with_default(Metadata::default().with_chapter(10.0)),
        Recorder::default(),
        notifying(),
    );

    let report = f.poller.run_once().await;

    assert_eq!(report.advanced, 0);
    assert!(f.notifier.sent().is_empty());
    let tracker = f.store.get(1).await.unwrap();
    assert_eq!(tracker.latest_chapter, Some(10.0));
    assert_eq!(tracker.latest_release_at, Some(released));
    assert!(tracker.last_checked_at.is_some());
    assert_eq!(f.store.updates(), 1);
}

#[tokio::test]
async fn advance_without_timestamp_is_dated_now() {
    let before = UtcDateTime::now();
    let f = fixture(
        vec![NewTracker::new("Title", "site", URL).with_chapter(340.0)],
        MockConnector::new("site").with_default(Metadata::default().with_chapter(341.0)),
        Recorder::default(),
        PollerOptions::default(),
    );

    f.poller.run_once().await;

    let tracker = f.store.get(1).await.unwrap();
    assert_eq!(tracker.latest_chapter, Some(341.0));
    let released = tracker.latest_release_at.expect("release timestamp should be set");
    assert!(released >= before);
}

#[tokio::test]
async fn failures_are_contained_to_their_tracker() {
    let broken = "https://site.example/t/broken";
    let f = fixture(
        vec![
            NewTracker::new("Broken", "site", broken).with_chapter(1.0),
            NewTracker::new("Unknown source", "elsewhere", "https://elsewhere.example/t/1"),
            NewTracker::new("Fine", "site", URL).with_chapter(1.0),
        ],
        MockConnector::new("site")
            .with_default(Metadata::default().with_chapter(2.0))
            .with_response(broken, MockResponse::Fail(ConnectorError::Upstream)),
        Recorder::default(),
        notifying(),
    );

    let report = f.poller.run_once().await;

    assert_eq!(report, CycleReport { listed: 3, checked: 1, skipped: 2, advanced: 1, notified: 1 });
    let broken = f.store.get(1).await.unwrap();
    assert_eq!(broken.latest_chapter, Some(1.0));
    assert_eq!(broken.last_checked_at, None);
    assert_eq!(f.store.get(2).await.unwrap().last_checked_at, None);
    assert_eq!(f.store.get(3).await.unwrap().latest_chapter, Some(2.0));
}

#[tokio::test(start_paused = true)]
async fn slow_connector_is_skipped_after_timeout() {
    let f = fixture(
        vec![NewTracker::new("Title", "site", URL).with_chapter(1.0)],
        MockConnector::new("site").with_default_response(MockResponse::Hang),
        Recorder::default(),
        PollerOptions { timeout: Duration::from_secs(5), ..PollerOptions::default() },
    );

    let report = f.poller.run_once().await;

    assert_eq!(report.skipped, 1);
    assert_eq!(f.store.updates(), 0);
}

#[tokio::test]
async fn failed_notification_does_not_undo_the_update() {
    let f = fixture(
        vec![
            NewTracker::new("A", "site", URL).with_chapter(1.0),
            NewTracker::new("B", "site", "https://site.example/t/2").with_chapter(1.0),
        ],
        MockConnector::new("site").with_default(Metadata::default().with_chapter(2.0)),
        Recorder::failing(),
        notifying(),
    );

    let report = f.poller.run_once().await;

    assert_eq!(report, CycleReport { listed: 2, checked: 2, skipped: 0, advanced: 2, notified: 0 });
    assert_eq!(f.store.get(1).await.unwrap().latest_chapter, Some(2.0));
    assert_eq!(f.store.get(2).await.unwrap().latest_chapter, Some(2.0));
}

#[tokio::test]
async fn only_eligible_statuses_are_announced() {
    let f = fixture(
        vec![
            NewTracker::new("Reading", "site", URL).with_chapter(1.0),
            NewTracker::new("Parked", "site", "https://site.example/t/2").with_chapter(1.0).with_status(Status::OnHold),
        ],
        MockConnector::new("site").with_default(Metadata::default().with_chapter(2.0)),
        Recorder::default(),
        notifying(),
    );

    let report = f.poller.run_once().await;

    assert_eq!(report.advanced, 2);
    let sent = f.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].context["title"], "Reading");
}

#[tokio::test]
async fn disabled_notifications_send_nothing() {
    let f = fixture(
        vec![NewTracker::new("Title", "site", URL)],
        MockConnector::new("site").with_default(Metadata::default().with_chapter(1.0)),
        Recorder::default(),
        PollerOptions::default(),
    );
    assert_eq!(f.poller.run_once().await.advanced, 1);
    assert!(f.notifier.sent().is_empty());
}

#[tokio::test]
async fn status_filter_limits_the_cycle() {
    let f = fixture(
        vec![
            NewTracker::new("Reading", "site", URL),
            NewTracker::new("Done", "site", "https://site.example/t/2").with_status(Status::Completed),
        ],
        MockConnector::new("site").with_default(Metadata::default().with_chapter(1.0)),
        Recorder::default(),
        PollerOptions { statuses: vec![Status::Reading], ..PollerOptions::default() },
    );
    let report = f.poller.run_once().await;
    assert_eq!(report.listed, 1);
    assert_eq!(f.connector.calls(), 1);
    assert_eq!(f.store.get(2).await.unwrap().last_checked_at, None);
}

#[tokio::test]
async fn store_failure_skips_the_cycle() {
    let f = fixture(
        vec![NewTracker::new("Title", "site", URL)],
        MockConnector::new("site"),
        Recorder::default(),
        PollerOptions::default(),
    );
    f.store.fail_listing(true);
    assert_eq!(f.poller.run_once().await, CycleReport::default());
    assert_eq!(f.connector.calls(), 0);
    assert_eq!(f.poller.state(), PollerState::Idle);
}

#[tokio::test(start_paused = true)]
async fn scheduled_cycles_run_until_stopped() {
    let f = fixture(
        vec![NewTracker::new("Title", "site", URL)],
        MockConnector::new("site").with_default(Metadata::default().with_chapter(1.0)),
        Recorder::default(),
        PollerOptions { interval: Duration::from_secs(60), ..PollerOptions::default() },
    );
    let shutdown = CancellationToken::new();

    f.poller.start(&shutdown);
    // A second start is ignored.
    f.poller.start(&shutdown);

    // The first cycle runs straight away, then one per interval.
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(f.connector.calls(), 1);
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(f.connector.calls(), 3);

    assert!(f.poller.stop_wait(Duration::from_secs(10)).await);
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(f.connector.calls(), 3);
    assert_eq!(f.poller.state(), PollerState::Idle);
}

#[tokio::test(start_paused = true)]
async fn zero_interval_schedules_at_the_default() {
    let f = fixture(
        vec![NewTracker::new("Title", "site", URL)],
        MockConnector::new("site").with_default(Metadata::default().with_chapter(1.0)),
        Recorder::default(),
        PollerOptions { interval: Duration::ZERO, ..PollerOptions::default() },
    );
    let shutdown = CancellationToken::new();
    f.poller.start(&shutdown);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(f.connector.calls(), 1);
    tokio::time::sleep(Duration::from_secs(30 * 60)).await;
    assert_eq!(f.connector.calls(), 2);

    assert!(f.poller.stop_wait(Duration::from_secs(10)).await);
}

#[tokio::test(start_paused = true)]
async fn parent_cancellation_stops_the_schedule() {
    let f = fixture(
        vec![NewTracker::new("Title", "site", URL)],
        MockConnector::new("site"),
        Recorder::default(),
        PollerOptions { interval: Duration::from_secs(60), ..PollerOptions::default() },
    );
    let shutdown = CancellationToken::new();
    f.poller.start(&shutdown);
    tokio::time::sleep(Duration::from_secs(1)).await;

    shutdown.cancel();
    assert!(f.poller.stop_wait(Duration::from_secs(1)).await);
    assert_eq!(f.connector.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn stop_wait_gives_up_on_a_stuck_cycle() {
    let f = fixture(
        vec![NewTracker::new("Title", "site", URL)],
        MockConnector::new("site").with_default_response(MockResponse::Hang),
        Recorder::default(),
        PollerOptions { timeout: Duration::from_secs(3600), ..PollerOptions::default() },
    );
    f.poller.start(&CancellationToken::new());
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(f.poller.state(), PollerState::Running);

    assert!(!f.poller.stop_wait(Duration::from_secs(5)).await);
}
