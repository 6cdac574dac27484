//! Store Error Types
//!
//! Every failure below the [`TrackerStore`](crate::TrackerStore) port maps
//! to one of these kinds; the underlying sqlx error stays attached as the
//! source in the `exn` tree.

use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The database could not be reached, or rejected a statement.
    #[display("tracker database unavailable")]
    Database,
    #[display("tracker schema migration failed")]
    Migration,
    #[display("no tracker with id {_0}")]
    TrackerNotFound(#[error(not(source))] i64),
    /// A stored value could not be converted to or from its model.
    #[display("invalid tracker data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database)
    }
}
