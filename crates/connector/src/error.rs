//! Connector Error Types
//!
//! Structured errors using `exn` for automatic location tracking. Connectors
//! wrap their site-specific failures in one of these kinds so that callers can
//! decide what to do without knowing anything about the site.

use derive_more::{Display, Error};

/// A connector error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for connector operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The upstream site could not be reached or answered with a failure.
    #[display("upstream failure")]
    Upstream,
    /// The upstream site did not answer in time.
    #[display("upstream timed out")]
    Timeout,
    /// The upstream site answered with something the connector cannot read.
    #[display("malformed upstream response: {_0}")]
    Malformed(#[error(not(source))] String),
    /// The URL does not belong to this connector, or the operation is not
    /// offered by it.
    #[display("unsupported by connector")]
    Unsupported,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Upstream | Self::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_display() {
        assert_eq!(ErrorKind::Upstream.to_string(), "upstream failure");
        assert_eq!(ErrorKind::Malformed("no chapter list".to_string()).to_string(), "malformed upstream response: no chapter list");
    }

    #[test]
    fn error_kind_retryable() {
        assert!(ErrorKind::Upstream.is_retryable());
        assert!(ErrorKind::Timeout.is_retryable());
        assert!(!ErrorKind::Malformed(String::new()).is_retryable());
        assert!(!ErrorKind::Unsupported.is_retryable());
    }
}
