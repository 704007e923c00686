//! Canned probe results for testing.

use super::{Fragment, Probe};
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use curator_storage::StorageBackend;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Probe that answers from a fixed table. Files missing from the table fail
/// the way a broken tool would.
#[derive(Debug, Default)]
pub struct MockProbe {
    fragments: HashMap<PathBuf, Fragment>,
    calls: AtomicUsize,
}

impl MockProbe {
    pub fn with_fragments(fragments: impl IntoIterator<Item = (impl Into<PathBuf>, Fragment)>) -> Self {
        Self {
            fragments: fragments.into_iter().map(|(path, fragment)| (path.into(), fragment)).collect(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of times the probe has been asked about a file.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Probe for MockProbe {
    async fn probe(&self, _backend: &dyn StorageBackend, path: &Path) -> Result<Fragment> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        match self.fragments.get(path) {
            Some(fragment) => Ok(fragment.clone()),
            None => exn::bail!(ErrorKind::ProbeOutput),
        }
    }
}
