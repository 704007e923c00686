//! Index Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};

/// An index error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for index operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("database error")]
    Database,
    #[display("database migration error")]
    Migration,
    /// An archive was handed a database it cannot work with. This is a
    /// programming error and is never recovered from.
    #[display("archive misuse: {_0}")]
    BackendMisuse(#[error(not(source))] &'static str),
    #[display("content not found: {_0}")]
    ContentNotFound(#[error(not(source))] String),
    /// Stored data could not be converted back into a model.
    #[display("invalid index data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
    /// The descriptor of a content directory could not be used.
    #[display("unusable content metadata")]
    Metadata,
    #[display("storage operation failed")]
    Storage,
    #[display("facet extraction failed")]
    Facets,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database | Self::Storage)
    }
}
