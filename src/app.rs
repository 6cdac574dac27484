//! Wiring of the long-lived services from configuration.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use lectern_config::Config;
use lectern_connector::Registry;
use lectern_poll::{NoopNotifier, NotifierHandle, Poller, PollerOptions, WebhookNotifier};
use lectern_resolve::{Resolver, ResolverOptions, TtlPolicy};
use lectern_store::{Database, Repository, Status};
use std::sync::Arc;

pub struct App {
    pub db: Database,
    pub resolver: Resolver,
    pub poller: Poller,
}

impl App {
    pub async fn build(config: &Config) -> Result<Self> {
        let db = open_database(config).await?;
        let repo = Repository::from(&db);
        let registry = Arc::new(registry());

        let resolver = Resolver::new(Arc::clone(&registry), resolver_options(config));
        let poller = Poller::new(Arc::new(repo), registry, notifier(config)?, poller_options(config));
        Ok(Self { db, resolver, poller })
    }
}

pub async fn open_database(config: &Config) -> Result<Database> {
    if let Some(parent) = config.database.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).or_raise(|| ErrorKind::Database)?;
    }
    tracing::debug!(path = %config.database.display(), "Opening tracker database");
    Database::connect(&config.database).await.or_raise(|| ErrorKind::Database)
}

/// Connectors are provided by integrations built on top of this crate; the
/// stock binary ships with none.
fn registry() -> Registry {
    let registry = Registry::new();
    if registry.is_empty() {
        tracing::warn!("No source connectors registered; every tracker will be skipped");
    }
    registry
}

fn notifier(config: &Config) -> Result<NotifierHandle> {
    match (&config.notify.webhook_url, config.notify.enabled) {
        (Some(url), true) => {
            let webhook = WebhookNotifier::new(url, config.fetch.timeout()).or_raise(|| ErrorKind::Notifier)?;
            Ok(Arc::new(webhook))
        },
        _ => Ok(Arc::new(NoopNotifier)),
    }
}

pub fn resolver_options(config: &Config) -> ResolverOptions {
    ResolverOptions {
        default_capacity: config.fetch.default_capacity,
        slow_capacity: config.fetch.slow_capacity,
        slow_sources: config.fetch.slow_sources.clone(),
        fetch_timeout: config.fetch.timeout(),
        ttl: TtlPolicy {
            positive: config.cache.positive_ttl(),
            negative: config.cache.negative_ttl(),
            unreliable: config.cache.unreliable_ttl(),
            definitive_miss: config.cache.positive_ttl(),
        },
    }
}

pub fn poller_options(config: &Config) -> PollerOptions {
    PollerOptions {
        interval: config.poll.interval(),
        timeout: config.poll.timeout(),
        statuses: parse_statuses("poll.statuses", &config.poll.statuses),
        notify_enabled: config.notify.enabled,
        notify_statuses: parse_statuses("notify.statuses", &config.notify.statuses),
    }
}

/// Unknown status names are dropped with a warning.
fn parse_statuses(setting: &str, raw: &[String]) -> Vec<Status> {
    raw.iter()
        .filter_map(|name| match name.parse::<Status>() {
            Ok(status) => Some(status),
            Err(_) => {
                tracing::warn!(setting, value = %name, "Ignoring unknown status");
                None
            },
        })
        .collect()
}
