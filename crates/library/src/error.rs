//! Library Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction. Failures of the lower crates are chained underneath
//! one of these kinds with `or_raise`.

use derive_more::{Display, Error};

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("storage backend error")]
    Storage,
    #[display("index error")]
    Index,
    /// An item of an older library could not be copied in.
    #[display("import error")]
    Import,
    /// The library could not be assembled from its configuration.
    #[display("could not open library: {_0}")]
    Setup(#[error(not(source))] &'static str),
    /// Scheduling needs a Tokio runtime and none is running.
    #[display("no async runtime available")]
    Runtime,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage | Self::Index)
    }
}
