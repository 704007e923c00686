//! Storage backend trait and implementations.
//!
//! This module defines the `StorageBackend` trait, the single interface the
//! archives use to look at the content tree (local filesystem in production,
//! an in-memory map in tests).

mod local;
#[cfg(feature = "mock")]
mod mock;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
use crate::error::Result;
use crate::models::{ChangeEvent, FileInfo, Listing};
use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use std::path::{Path, PathBuf};
use std::pin::Pin;

pub(crate) type FileInfoStream<'a> = Pin<Box<dyn Stream<Item = Result<FileInfo>> + Send + 'a>>;

/// Does a file name satisfy a search query?
///
/// The query is split on whitespace. With `whole_words` a name matches when
/// it is exactly one of the words, otherwise when it contains one of them
/// (case-insensitively).
pub(crate) fn matches_query(name: &str, query: &str, whole_words: bool) -> bool {
    match whole_words {
        true => query.split_whitespace().any(|word| word == name),
        false => {
            let name = name.to_lowercase();
            query.split_whitespace().any(|word| name.contains(&word.to_lowercase()))
        },
    }
}

/// Unified interface over the content tree.
///
/// # Path Handling
/// All paths are relative to the content root and are validated with
/// [`validate_path`](crate::validate_path) (or
/// [`validate_dir_path`](crate::validate_dir_path) for directory arguments,
/// where the empty path means the root). Implementations enforce this.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use curator_storage::{backend::StorageBackend, error::Result};
///
/// async fn descriptor_size(backend: &dyn StorageBackend) -> Result<u64> {
///     let path = Path::new("books/moby-dick/info.json");
///     match backend.exists(path).await? {
///         true => Ok(backend.stat(path).await?.size),
///         false => Ok(0),
///     }
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the configured backend, used for logging only.
    fn name(&self) -> &str;

    /// List the immediate children of a directory.
    ///
    /// A directory that does not exist has no children; this is not an
    /// error.
    async fn list_dir(&self, path: &Path) -> Result<Listing>;

    /// Stream every file (not directory) below an optional prefix.
    fn walk<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a>;

    /// Find files anywhere in the tree whose name matches `query`.
    ///
    /// See [`matches_query`] for the matching rules. Only files are
    /// reported; `dirs` of the returned listing is always empty.
    async fn search(&self, query: &str, whole_words: bool) -> Result<Listing> {
        let files: Vec<FileInfo> = self
            .walk(None)
            .try_filter(|info| futures::future::ready(matches_query(&info.name(), query, whole_words)))
            .try_collect()
            .await?;
        Ok(Listing { dirs: Vec::new(), files }.sorted())
    }

    /// Check if a file or directory exists.
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Get entry metadata without reading contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if nothing
    /// exists at `path`.
    async fn stat(&self, path: &Path) -> Result<FileInfo>;

    /// Read file contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Create or overwrite a file, creating parent directories as needed.
    async fn write(&self, path: &Path, data: &[u8]) -> Result<()>;

    /// Remove a file, or a directory and everything below it.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if nothing
    /// exists at `path`.
    async fn remove(&self, path: &Path) -> Result<()>;

    /// Absolute location on the local filesystem, for collaborators (such as
    /// probe tools) that need a real file. Backends that are not backed by
    /// the local filesystem return `None`.
    fn local_path(&self, _path: &Path) -> Option<PathBuf> {
        None
    }

    /// Take the batch of change events accumulated since the last call.
    async fn changes(&self) -> Result<Vec<ChangeEvent>>;
}

#[cfg(test)]
mod tests {
    use super::matches_query;

    #[test]
    fn test_matches_query() {
        assert!(matches_query("info.json", ".contentinfo info.json", true));
        assert!(!matches_query("info.json.bak", ".contentinfo info.json", true));
        assert!(matches_query("Album-Cover.JPG", "cover", false));
        assert!(!matches_query("track.mp3", "cover art", false));
    }
}
