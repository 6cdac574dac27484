use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL_SECS: i64 = 30 * 60;
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_POOL_CAPACITY: usize = 8;
pub const DEFAULT_SLOW_POOL_CAPACITY: usize = 2;
pub const DEFAULT_POSITIVE_TTL_SECS: u64 = 6 * 60 * 60;
pub const DEFAULT_NEGATIVE_TTL_SECS: u64 = 5 * 60;
pub const DEFAULT_UNRELIABLE_TTL_SECS: u64 = 30;
const DATABASE_FILENAME: &str = "lectern.sqlite3";

/// Top-level configuration.
///
/// Every field has a default, so an empty configuration source is valid.
/// Call [`Config::validated`] after extraction to correct nonsensical values
/// (the loader in this crate does so automatically).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path of the SQLite database holding trackers.
    pub database: PathBuf,
    pub poll: PollConfig,
    pub notify: NotifyConfig,
    pub fetch: FetchConfig,
    pub cache: CacheConfig,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            database: default_database_path(),
            poll: PollConfig::default(),
            notify: NotifyConfig::default(),
            fetch: FetchConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

fn default_database_path() -> PathBuf {
    directories::ProjectDirs::from("", "", "lectern")
        .map(|dirs| dirs.data_dir().join(DATABASE_FILENAME))
        .unwrap_or_else(|| PathBuf::from(DATABASE_FILENAME))
}

/// Background chapter polling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Seconds between the start of two polling cycles. Signed so that a
    /// negative value in a config file can be detected and corrected.
    pub interval_secs: i64,
    /// Upper bound for a single connector call, in seconds.
    pub timeout_secs: u64,
    /// Only trackers with one of these statuses are polled (empty = all).
    pub statuses: Vec<String>,
}
impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            timeout_secs: DEFAULT_CALL_TIMEOUT_SECS,
            statuses: Vec::new(),
        }
    }
}
impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1).unsigned_abs())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Chapter-advance notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub enabled: bool,
    /// Tracker statuses that are eligible for a notification.
    pub statuses: Vec<String>,
    /// Endpoint receiving a JSON `POST` for every chapter advance.
    pub webhook_url: Option<String>,
}
impl Default for NotifyConfig {
    fn default() -> Self {
        Self { enabled: false, statuses: vec!["reading".to_string()], webhook_url: None }
    }
}

/// On-demand cover/chapter-link fetching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Concurrent upstream calls allowed for ordinary sources.
    pub default_capacity: usize,
    /// Concurrent upstream calls allowed for sources listed in `slow_sources`.
    pub slow_capacity: usize,
    /// Source keys known to be slow or rate-limited.
    pub slow_sources: Vec<String>,
    pub timeout_secs: u64,
}
impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            default_capacity: DEFAULT_POOL_CAPACITY,
            slow_capacity: DEFAULT_SLOW_POOL_CAPACITY,
            slow_sources: Vec::new(),
            timeout_secs: DEFAULT_CALL_TIMEOUT_SECS,
        }
    }
}
impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Result cache expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Lifetime of a successful resolution.
    pub positive_ttl_secs: u64,
    /// Lifetime of a failed resolution.
    pub negative_ttl_secs: u64,
    /// Lifetime of a failed resolution for a source listed in `fetch.slow_sources`.
    pub unreliable_ttl_secs: u64,
}
impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            positive_ttl_secs: DEFAULT_POSITIVE_TTL_SECS,
            negative_ttl_secs: DEFAULT_NEGATIVE_TTL_SECS,
            unreliable_ttl_secs: DEFAULT_UNRELIABLE_TTL_SECS,
        }
    }
}
impl CacheConfig {
    pub fn positive_ttl(&self) -> Duration {
        Duration::from_secs(self.positive_ttl_secs)
    }

    pub fn negative_ttl(&self) -> Duration {
        Duration::from_secs(self.negative_ttl_secs)
    }

    pub fn unreliable_ttl(&self) -> Duration {
        Duration::from_secs(self.unreliable_ttl_secs)
    }
}

impl Config {
    /// Replace values that would break the daemon with their defaults.
    ///
    /// Never fails: every correction is logged as a warning instead.
    pub fn validated(mut self) -> Self {
        if self.poll.interval_secs <= 0 {
            tracing::warn!(value = self.poll.interval_secs, "Non-positive poll interval; using default");
            self.poll.interval_secs = DEFAULT_POLL_INTERVAL_SECS;
        }
        if self.poll.timeout_secs == 0 {
            tracing::warn!("Zero poll timeout; using default");
            self.poll.timeout_secs = DEFAULT_CALL_TIMEOUT_SECS;
        }
        if self.fetch.timeout_secs == 0 {
            tracing::warn!("Zero fetch timeout; using default");
            self.fetch.timeout_secs = DEFAULT_CALL_TIMEOUT_SECS;
        }
        if self.fetch.default_capacity == 0 {
            tracing::warn!("Zero default pool capacity; using default");
            self.fetch.default_capacity = DEFAULT_POOL_CAPACITY;
        }
        if self.fetch.slow_capacity == 0 {
            tracing::warn!("Zero slow-source pool capacity; using default");
            self.fetch.slow_capacity = DEFAULT_SLOW_POOL_CAPACITY;
        }
        if self.fetch.slow_capacity > self.fetch.default_capacity {
            // The slow pool exists to protect everything else; letting it
            // outgrow the default pool defeats that.
            tracing::warn!(
                slow = self.fetch.slow_capacity,
                default = self.fetch.default_capacity,
                "Slow-source pool larger than default pool; clamping"
            );
            self.fetch.slow_capacity = self.fetch.default_capacity;
        }
        if self.cache.positive_ttl_secs == 0 {
            tracing::warn!("Zero positive cache TTL; using default");
            self.cache.positive_ttl_secs = DEFAULT_POSITIVE_TTL_SECS;
        }
        if self.cache.negative_ttl_secs == 0 {
            tracing::warn!("Zero negative cache TTL; using default");
            self.cache.negative_ttl_secs = DEFAULT_NEGATIVE_TTL_SECS;
        }
        if self.cache.unreliable_ttl_secs == 0 {
            tracing::warn!("Zero unreliable-source cache TTL; using default");
            self.cache.unreliable_ttl_secs = DEFAULT_UNRELIABLE_TTL_SECS;
        }
        if self.notify.enabled && self.notify.webhook_url.as_deref().is_none_or(|url| url.trim().is_empty()) {
            tracing::warn!("Notifications enabled without a webhook URL; disabling");
            self.notify.enabled = false;
        }
        self
    }
}
