//! Import of content kept in the first-generation layout.
//!
//! Early libraries stored every item under a path derived from the MD5 of
//! its URL: ten levels of three hex digits and a final level of two, such as
//! `0a1/b2c/.../ff`. Importing copies each item into a single directory of
//! the content root, named after its title.

use crate::error::{ErrorKind, Result};
use curator_storage::{BackendHandle, StorageBackend};
use exn::ResultExt;
use futures::{StreamExt, TryStreamExt};
use rslug::slugify;
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use tracing::instrument;

const HEX_LEVELS: usize = 10;

/// Does `dir` follow the hex layout, relative to the root of the old tree?
pub(crate) fn is_hex_path(dir: &Path) -> bool {
    let mut levels = Vec::new();
    for component in dir.components() {
        match component {
            Component::Normal(name) => match name.to_str() {
                Some(name) => levels.push(name),
                None => return false,
            },
            _ => return false,
        }
    }
    let is_hex = |name: &str, len: usize| name.len() == len && name.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
    levels.len() == HEX_LEVELS + 1
        && levels[..HEX_LEVELS].iter().all(|name| is_hex(name, 3))
        && is_hex(levels[HEX_LEVELS], 2)
}

/// Directory name for an item: its title, failing that its URL, failing
/// that something random. Only ASCII letters, digits and dashes survive.
pub(crate) fn safe_title(title: &str, url: &str) -> String {
    [title, url]
        .into_iter()
        .map(|source| slugify!(source))
        .find(|slug| !slug.is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string())
}

/// Copy every first-generation item of `source` into `target`.
///
/// Items whose descriptor is missing or invalid are skipped, as are items
/// whose destination already exists. A failed copy is logged and skipped.
/// Returns the new directories, relative to the root of `target`.
#[instrument(level = "debug", skip_all, fields(source = source.name(), target = target.name()))]
pub async fn import_content(
    source: &dyn StorageBackend,
    target: &BackendHandle,
    meta_filenames: &[String],
) -> Result<Vec<PathBuf>> {
    let dirs = find_content_dirs(source).await;
    tracing::info!(count = dirs.len(), "Found first-generation content");
    let mut imported = Vec::new();
    for dir in dirs {
        let descriptor = match curator_metadata::load(source, &dir, meta_filenames).await {
            Ok(descriptor) => descriptor,
            Err(err) => {
                tracing::debug!(path = %dir.display(), error = ?err, "Skipping item without a valid descriptor");
                continue;
            },
        };
        let dest = PathBuf::from(safe_title(&descriptor.title, &descriptor.url));
        if target.exists(&dest).await.or_raise(|| ErrorKind::Storage)? {
            tracing::debug!(path = %dir.display(), dest = %dest.display(), "Destination exists, skipping item");
            continue;
        }
        match copy_dir(source, &dir, target, &dest).await {
            Ok(files) => {
                tracing::debug!(path = %dir.display(), dest = %dest.display(), files, "Imported item");
                imported.push(dest);
            },
            Err(err) => tracing::warn!(path = %dir.display(), error = ?err, "Could not import item"),
        }
    }
    Ok(imported)
}

// Unreadable parts of the old tree are passed over.
async fn find_content_dirs(source: &dyn StorageBackend) -> BTreeSet<PathBuf> {
    source
        .walk(None)
        .filter_map(|entry| async move {
            match entry {
                Ok(info) => info.path.parent().filter(|dir| is_hex_path(dir)).map(Path::to_path_buf),
                Err(err) => {
                    tracing::warn!(error = ?err, "Could not read part of the source tree");
                    None
                },
            }
        })
        .collect()
        .await
}

async fn copy_dir(source: &dyn StorageBackend, dir: &Path, target: &BackendHandle, dest: &Path) -> Result<usize> {
    let files: Vec<_> = source.walk(Some(dir)).try_collect().await.or_raise(|| ErrorKind::Import)?;
    for info in &files {
        let relative = info.path.strip_prefix(dir).or_raise(|| ErrorKind::Import)?;
        let data = source.read(&info.path).await.or_raise(|| ErrorKind::Import)?;
        target.write(&dest.join(relative), &data).await.or_raise(|| ErrorKind::Import)?;
    }
    Ok(files.len())
}
