//! Poller Error Types

use derive_more::{Display, Error};

/// A poller error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for poller operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// Connector failures never surface here: they are contained to the tracker
/// being polled and only logged.
#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A notification could not be delivered.
    #[display("notification delivery failed")]
    Notify,
    /// Tracker persistence failed.
    #[display("tracker store failure")]
    Store,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Notify)
    }
}
