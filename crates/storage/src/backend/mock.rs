//! In-memory storage backend for testing.

use super::FileInfoStream;
use crate::change::ChangeQueue;
use crate::error::{ErrorKind, Result};
use crate::models::{ChangeEvent, FileInfo, Listing};
use crate::path::{validate as validate_path, validate_dir};
use async_stream::stream;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::StorageBackend;

/// In-memory storage backend for testing.
///
/// Files are stored in a map behind a [`RwLock`]; directories exist
/// implicitly whenever a file lives below them. Change events are queued
/// with [`push_change()`](Self::push_change) the way a watch transport would.
///
/// # Examples
///
/// ```
/// use curator_storage::backend::{MockBackend, StorageBackend};
/// use std::path::Path;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_files([
///     ("music/album/01.mp3", b"ID3..."),
/// ]);
/// assert!(backend.exists(Path::new("music/album")).await?);
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    storage: RwLock<BTreeMap<PathBuf, (OffsetDateTime, Vec<u8>)>>,
    changes: ChangeQueue,
}

impl MockBackend {
    /// Create a mock backend pre-populated with files.
    ///
    /// Panics if any path fails validation. If test setup is wrong, then the
    /// test should not pass.
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<PathBuf>, impl Into<Vec<u8>>)>) -> Self {
        let mut map = BTreeMap::new();
        let now = OffsetDateTime::now_utc();
        for (path, data) in files {
            let path = path.into();
            let Ok(validated) = validate_path(&path) else {
                panic!("MockBackend::with_files: invalid path {}", path.display());
            };
            map.insert(validated, (now, data.into()));
        }
        Self { name: "mock".to_string(), storage: RwLock::new(map), changes: ChangeQueue::default() }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Queue a change event for the next [`changes()`](StorageBackend::changes).
    pub async fn push_change(&self, event: ChangeEvent) {
        self.changes.push(event).await;
    }

    fn below<'m>(
        map: &'m BTreeMap<PathBuf, (OffsetDateTime, Vec<u8>)>,
        dir: &'m Path,
    ) -> impl Iterator<Item = (&'m PathBuf, &'m (OffsetDateTime, Vec<u8>))> + 'm {
        map.iter().filter(move |(path, _)| path.starts_with(dir) && path.as_path() != dir)
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        let files: [(&str, &str); 0] = [];
        Self::with_files(files)
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_dir(&self, path: &Path) -> Result<Listing> {
        let dir = validate_dir(path)?;
        let guard = self.storage.read().await;
        let mut listing = Listing::default();
        let mut dirs = BTreeSet::new();
        for (file, (inserted, data)) in Self::below(&guard, &dir) {
            let Ok(rest) = file.strip_prefix(&dir) else { continue };
            let mut components = rest.components();
            let Some(first) = components.next() else { continue };
            match components.next() {
                None => listing.push(FileInfo::file(file.clone(), data.len() as u64, *inserted)),
                Some(_) => {
                    dirs.insert(dir.join(first));
                },
            }
        }
        for sub in dirs {
            listing.push(FileInfo::dir(sub, 0, OffsetDateTime::now_utc()));
        }
        Ok(listing.sorted())
    }

    fn walk<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a> {
        let validated = match prefix.map(validate_dir).transpose() {
            Ok(pfx) => pfx.unwrap_or_default(),
            Err(e) => return Box::pin(futures::stream::once(async { Err(e) })),
        };

        Box::pin(stream! {
            // Snapshot under the read lock, then drop it before yielding.
            let entries: Vec<FileInfo> = {
                let guard = self.storage.read().await;
                Self::below(&guard, &validated)
                    .map(|(path, (inserted, data))| FileInfo::file(path.clone(), data.len() as u64, *inserted))
                    .collect()
            };
            for info in entries {
                yield Ok(info);
            }
        })
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let path = validate_path(path)?;
        let guard = self.storage.read().await;
        Ok(guard.contains_key(&path) || Self::below(&guard, &path).next().is_some())
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        let path = validate_path(path)?;
        let guard = self.storage.read().await;
        if let Some((inserted, data)) = guard.get(&path) {
            return Ok(FileInfo::file(path, data.len() as u64, *inserted));
        }
        let mut children = Self::below(&guard, &path).peekable();
        if children.peek().is_none() {
            exn::bail!(ErrorKind::NotFound(path.clone()));
        }
        let (size, modified) = children.fold((0, OffsetDateTime::UNIX_EPOCH), |(size, modified), (_, (at, data))| {
            (size + data.len() as u64, modified.max(*at))
        });
        Ok(FileInfo::dir(path, size, modified))
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let path = validate_path(path)?;
        let (_inserted, data) =
            self.storage.read().await.get(&path).cloned().ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path)))?;
        Ok(data)
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let path = validate_path(path)?;
        self.storage.write().await.insert(path, (OffsetDateTime::now_utc(), data.to_vec()));
        Ok(())
    }

    async fn remove(&self, path: &Path) -> Result<()> {
        let path = validate_path(path)?;
        let mut guard = self.storage.write().await;
        let before = guard.len();
        guard.retain(|file, _| !file.starts_with(&path));
        match guard.len() < before {
            true => Ok(()),
            false => exn::bail!(ErrorKind::NotFound(path)),
        }
    }

    async fn changes(&self) -> Result<Vec<ChangeEvent>> {
        Ok(self.changes.drain().await)
    }
}
