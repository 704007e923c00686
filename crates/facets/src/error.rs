//! Facet Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A facet error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for facet operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// The `Probe*` variants are extraction failures: they only ever cost the
/// detail fields of a single file.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("ffprobe not detected on your system")]
    ProbeNotFound,
    #[display("ffprobe did not finish in time")]
    ProbeTimeout,
    /// The probe exited with a non-zero exit code (`-1` when killed by a
    /// signal).
    #[display("ffprobe exited with code: {_0}")]
    ProbeFailed(#[error(not(source))] i32),
    /// The probe succeeded but its output was not the expected JSON.
    #[display("unexpected ffprobe output")]
    ProbeOutput,
    /// The probe can only read files that exist on the local filesystem.
    #[display("not a local file: {}", _0.display())]
    NotLocal(#[error(not(source))] PathBuf),
    #[display("storage operation failed")]
    Storage,
    /// The probe process could not be spawned or waited on.
    #[display("I/O error while running ffprobe")]
    Io,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ProbeTimeout | Self::Storage)
    }

    /// Metadata could not be extracted from a file.
    pub fn is_extraction(&self) -> bool {
        matches!(
            self,
            Self::ProbeNotFound | Self::ProbeTimeout | Self::ProbeFailed(_) | Self::ProbeOutput | Self::NotLocal(_)
        )
    }
}
