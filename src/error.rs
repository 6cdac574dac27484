//! Binary Error Types

use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("could not load configuration")]
    Config,
    #[display("could not open tracker database")]
    Database,
    #[display("could not set up notifications")]
    Notifier,
    #[display("invalid argument: {_0}")]
    InvalidArgument(#[error(not(source))] String),
}
