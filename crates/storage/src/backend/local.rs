//! Local filesystem storage backend.
//!
//! Files live in a configured content directory and are accessed with
//! `tokio::fs` for async I/O.

use crate::backend::FileInfoStream;
use crate::change::ChangeQueue;
use crate::error::ErrorKind;
use crate::models::{ChangeEvent, FileInfo, Listing};
use crate::path::{validate as validate_path, validate_dir};
use crate::{StorageBackend, error::Result};
use async_stream::stream;
use async_trait::async_trait;
use exn::ResultExt;
use futures::TryStreamExt;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use tokio::fs::{self, DirEntry};

enum WalkEntry {
    File(FileInfo),
    Descend(PathBuf),
    Skip,
}

/// Local filesystem storage backend.
///
/// All paths are relative to the configured content root.
///
/// # Examples
///
/// ```no_run
/// use curator_storage::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalBackend::new("content", "/srv/content")?;
/// let transport = backend.change_queue();
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalBackend {
    name: String,
    /// Content root directory
    root: PathBuf,
    changes: ChangeQueue,
}
impl LocalBackend {
    /// Create a new local filesystem backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute or is not an existing
    /// directory. Unlike a download library, the content root is never
    /// created on demand: a missing root means a missing disk.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() || !root.is_dir() {
            exn::bail!(ErrorKind::InvalidPath(root));
        }
        Ok(Self { name: name.into(), root, changes: ChangeQueue::default() })
    }

    /// Handle through which a watch transport reports changes.
    pub fn change_queue(&self) -> ChangeQueue {
        self.changes.clone()
    }

    fn absolute_path(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let validated = validate_path(path.as_ref())?;
        Ok(self.root.join(validated))
    }

    fn absolute_dir(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let validated = validate_dir(path.as_ref())?;
        Ok(self.root.join(validated))
    }

    fn relative_path(&self, absolute: impl AsRef<Path>) -> Result<PathBuf> {
        let absolute = absolute.as_ref();
        let relative = absolute.strip_prefix(&self.root).or_raise(|| {
            ErrorKind::BackendError(format!("path `{:?}` is not within root `{:?}`", absolute, self.root))
        })?;
        validate_path(relative)
    }

    fn info(path: &Path, metadata: &Metadata) -> Result<FileInfo> {
        let modified = metadata.modified().map_err(ErrorKind::Io)?.into();
        Ok(match metadata.is_dir() {
            true => FileInfo::dir(path, 0, modified),
            false => FileInfo::file(path, metadata.len(), modified),
        })
    }

    fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_path_buf()),
            _ => ErrorKind::Io(e),
        }
    }

    async fn process_entry(&self, entry: DirEntry) -> Result<WalkEntry> {
        let path = entry.path();
        let metadata = entry.metadata().await.map_err(|e| Self::map_io_error(e, &path))?;
        if metadata.is_dir() {
            return Ok(WalkEntry::Descend(path));
        }
        if metadata.is_file() {
            let relative = self.relative_path(&path)?;
            return Ok(WalkEntry::File(Self::info(&relative, &metadata)?));
        }
        // Broken symlinks and other oddities are not content.
        Ok(WalkEntry::Skip)
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_dir(&self, path: &Path) -> Result<Listing> {
        let relative = validate_dir(path)?;
        let absolute = self.root.join(&relative);
        let mut listing = Listing::default();
        let mut entries = match fs::read_dir(&absolute).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(listing),
            Err(err) => exn::bail!(Self::map_io_error(err, path)),
        };
        while let Some(entry) = entries.next_entry().await.map_err(|e| Self::map_io_error(e, path))? {
            let metadata = entry.metadata().await.map_err(|e| Self::map_io_error(e, path))?;
            if !metadata.is_dir() && !metadata.is_file() {
                continue;
            }
            listing.push(Self::info(&relative.join(entry.file_name()), &metadata)?);
        }
        Ok(listing.sorted())
    }

    fn walk<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a> {
        let start = match prefix.map(|p| self.absolute_dir(p)).transpose() {
            Ok(start) => start.unwrap_or_else(|| self.root.clone()),
            Err(e) => return Box::pin(futures::stream::once(async { Result::Err(e) })),
        };
        let mut stack = vec![start];

        Box::pin(stream! {
            'dirs: while let Some(current) = stack.pop() {
                let mut entries = match fs::read_dir(&current).await {
                    Ok(entries) => entries,
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                    Err(err) => {
                        yield Err(exn::Exn::from(Self::map_io_error(err, &current)));
                        continue 'dirs;
                    }
                };
                'entries: loop {
                    let entry = match entries.next_entry().await {
                        Ok(Some(entry)) => entry,
                        Ok(None) => break 'entries,
                        Err(e) => { yield Err(exn::Exn::from(Self::map_io_error(e, &current))); continue 'entries; },
                    };
                    match self.process_entry(entry).await {
                        Ok(WalkEntry::File(f)) => yield Ok(f),
                        Ok(WalkEntry::Descend(d)) => stack.push(d),
                        Ok(WalkEntry::Skip) => {},
                        Err(e) => yield Err(e),
                    };
                }
            }
        })
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let abs_path = self.absolute_path(path)?;
        Ok(fs::try_exists(&abs_path).await.map_err(ErrorKind::Io)?)
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        let relative = validate_path(path)?;
        let metadata = fs::metadata(self.root.join(&relative)).await.map_err(|e| Self::map_io_error(e, path))?;
        let mut info = Self::info(&relative, &metadata)?;
        if info.is_dir {
            info.size = self.walk(Some(relative.as_path())).try_fold(0, |total, f| async move { Ok(total + f.size) }).await?;
        }
        Ok(info)
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let abs_path = self.absolute_path(path)?;
        Ok(fs::read(&abs_path).await.map_err(|e| Self::map_io_error(e, path))?)
    }

    async fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        let abs_path = self.absolute_path(path)?;
        if let Some(parent) = abs_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| Self::map_io_error(e, path))?;
        }
        Ok(fs::write(&abs_path, data).await.map_err(|e| Self::map_io_error(e, path))?)
    }

    async fn remove(&self, path: &Path) -> Result<()> {
        let abs_path = self.absolute_path(path)?;
        let metadata = fs::symlink_metadata(&abs_path).await.map_err(|e| Self::map_io_error(e, path))?;
        let result = match metadata.is_dir() {
            true => fs::remove_dir_all(&abs_path).await,
            false => fs::remove_file(&abs_path).await,
        };
        tracing::debug!(backend = %self.name, path = %path.display(), "Removed from content tree");
        Ok(result.map_err(|e| Self::map_io_error(e, path))?)
    }

    fn local_path(&self, path: &Path) -> Option<PathBuf> {
        self.absolute_path(path).ok()
    }

    async fn changes(&self) -> Result<Vec<ChangeEvent>> {
        Ok(self.changes.drain().await)
    }
}
