//! Media metadata extraction collaborators.

mod ffprobe;
#[cfg(any(test, feature = "mock"))]
mod mock;

pub use self::ffprobe::{FfprobeProbe, parse_ffprobe};
#[cfg(any(test, feature = "mock"))]
pub use self::mock::MockProbe;
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use curator_storage::StorageBackend;
use std::path::Path;

/// What a probe could learn about a single media file. Every field is
/// optional: a tool reports what the container has.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    pub title: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub duration: Option<f64>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub genre: Option<String>,
    pub album: Option<String>,
}

/// Extracts a [`Fragment`] from a file in the content tree.
///
/// Implementations must not block indefinitely: a probe that wraps an
/// external tool bounds every call with a timeout.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, backend: &dyn StorageBackend, path: &Path) -> Result<Fragment>;
}

/// Probe used when no extraction tool is available; every call fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProbe;

#[async_trait]
impl Probe for NullProbe {
    async fn probe(&self, _backend: &dyn StorageBackend, _path: &Path) -> Result<Fragment> {
        exn::bail!(ErrorKind::ProbeNotFound)
    }
}
