//! Metadata Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A metadata error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for metadata operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// Every variant is scoped to a single descriptor: the item is skipped, the
/// rest of a scan carries on.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// None of the recognised descriptor files exist in the directory.
    #[display("missing metadata file in {}", _0.display())]
    MissingDescriptor(#[error(not(source))] PathBuf),
    #[display("metadata file cannot be opened: {}", _0.display())]
    UnreadableDescriptor(#[error(not(source))] PathBuf),
    /// Not JSON, or not a JSON object.
    #[display("malformed metadata file: {}", _0.display())]
    MalformedDescriptor(#[error(not(source))] PathBuf),
    /// Schema validation failed; one message per offending key.
    #[display("invalid metadata: {}", _0.join("; "))]
    Invalid(#[error(not(source))] Vec<String>),
    /// No registered generation recognises the descriptor's shape.
    #[display("unrecognised metadata generation")]
    UnknownGeneration,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::UnreadableDescriptor(_))
    }

    /// Descriptor was missing, unreadable, malformed or schema-invalid.
    pub fn is_validation(&self) -> bool {
        !matches!(self, Self::UnknownGeneration)
    }
}
