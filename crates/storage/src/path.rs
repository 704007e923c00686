//! Path validation.
//!
//! Every path handed to a backend is relative to the content root. These
//! helpers normalize such paths and refuse anything that would step outside
//! of the root.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

fn resolve(path: &Path) -> Result<PathBuf> {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(s) => {
                // Null bytes survive Path::components() on Unix but truncate
                // paths in C-based syscalls.
                if s.as_encoded_bytes().contains(&0) {
                    exn::bail!(ErrorKind::InvalidPath(path.to_path_buf()));
                }
                components.push(s)
            },
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(ErrorKind::InvalidPath(path.to_path_buf())),
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidPath(path.to_path_buf()));
                }
            },
        }
    }
    Ok(components.into_iter().collect())
}

/// Validates and normalizes a path to an entry below the content root.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use curator_storage::validate_path;
/// assert!(validate_path("videos/trailer/clip.mp4").is_ok());
/// assert!(validate_path("a/../info.json").is_ok());
/// assert!(validate_path("../etc/passwd").is_err());
/// assert!(validate_path("a\0b").is_err());
/// assert_eq!(
///     validate_path("wrong/.././books//./info.json/").unwrap(),
///     Path::new("books/info.json")
/// );
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let resolved = resolve(path.as_ref())?;
    match resolved.as_os_str().is_empty() {
        true => exn::bail!(ErrorKind::InvalidPath(path.as_ref().to_path_buf())),
        false => Ok(resolved),
    }
}

/// Like [`validate`], but a path that normalizes to nothing refers to the
/// content root itself and is accepted as an empty path.
pub fn validate_dir(path: impl AsRef<Path>) -> Result<PathBuf> {
    resolve(path.as_ref())
}
