//! Storage models.
//!
//! Metadata about entries in the content tree, directory listings, and the
//! change events emitted when the tree is modified underneath us.

use std::path::{Path, PathBuf};
use time::OffsetDateTime;

/// Entry metadata returned by storage backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Relative path from storage root
    pub path: PathBuf,
    /// Size in bytes. For directories this is the total size of every file
    /// underneath it.
    pub size: u64,
    /// Last modified timestamp
    pub modified: OffsetDateTime,
    pub is_dir: bool,
}
impl FileInfo {
    pub fn file(path: impl Into<PathBuf>, size: u64, modified: OffsetDateTime) -> Self {
        Self { path: path.into(), size, modified, is_dir: false }
    }

    pub fn dir(path: impl Into<PathBuf>, size: u64, modified: OffsetDateTime) -> Self {
        Self { path: path.into(), size, modified, is_dir: true }
    }

    /// Final component of the path, lossily converted to UTF-8.
    pub fn name(&self) -> String {
        self.path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
    }
}

/// Immediate children of a directory (or search results), split by type and
/// sorted by path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    pub dirs: Vec<FileInfo>,
    pub files: Vec<FileInfo>,
}
impl Listing {
    pub(crate) fn push(&mut self, info: FileInfo) {
        match info.is_dir {
            true => self.dirs.push(info),
            false => self.files.push(info),
        }
    }

    pub(crate) fn sorted(mut self) -> Self {
        self.dirs.sort_by(|a, b| a.path.cmp(&b.path));
        self.files.sort_by(|a, b| a.path.cmp(&b.path));
        self
    }

    /// Names of the files in this listing.
    pub fn file_names(&self) -> impl Iterator<Item = String> + '_ {
        self.files.iter().map(FileInfo::name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

/// A single filesystem change reported by the watch transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Relative path of the changed entry
    pub src: PathBuf,
    pub is_dir: bool,
    pub kind: ChangeKind,
}
impl ChangeEvent {
    pub fn new(src: impl Into<PathBuf>, is_dir: bool, kind: ChangeKind) -> Self {
        Self { src: src.into(), is_dir, kind }
    }

    pub fn created(src: impl Into<PathBuf>) -> Self {
        Self::new(src, false, ChangeKind::Created)
    }

    pub fn modified(src: impl Into<PathBuf>) -> Self {
        Self::new(src, false, ChangeKind::Modified)
    }

    pub fn deleted(src: impl Into<PathBuf>) -> Self {
        Self::new(src, false, ChangeKind::Deleted)
    }

    /// Directory the changed entry lives in (empty for the storage root).
    pub fn parent(&self) -> &Path {
        self.src.parent().unwrap_or_else(|| Path::new(""))
    }

    /// File name of the changed entry.
    pub fn name(&self) -> Option<&str> {
        self.src.file_name().and_then(|n| n.to_str())
    }
}
