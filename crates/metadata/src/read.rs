use crate::error::{ErrorKind, Result};
use crate::generation::Raw;
use crate::models::Descriptor;
use curator_storage::StorageBackend;
use exn::ResultExt;
use serde_json::Value;
use std::path::Path;
use tracing::instrument;

/// Read the raw descriptor of a content directory.
///
/// `filenames` is in order of preference: the first one present in the
/// directory is the one that gets read.
pub async fn read_raw(backend: &dyn StorageBackend, dir: &Path, filenames: &[String]) -> Result<Raw> {
    let mut found = None;
    for name in filenames {
        let candidate = dir.join(name);
        if backend.exists(&candidate).await.or_raise(|| ErrorKind::UnreadableDescriptor(candidate.clone()))? {
            found = Some(candidate);
            break;
        }
    }
    let Some(path) = found else {
        exn::bail!(ErrorKind::MissingDescriptor(dir.to_path_buf()));
    };
    let bytes = backend.read(&path).await.or_raise(|| ErrorKind::UnreadableDescriptor(path.clone()))?;
    match serde_json::from_slice::<Value>(&bytes).or_raise(|| ErrorKind::MalformedDescriptor(path.clone()))? {
        Value::Object(raw) => Ok(raw),
        _ => exn::bail!(ErrorKind::MalformedDescriptor(path)),
    }
}

/// Read and fully process the descriptor of a content directory.
#[instrument(level = "debug", skip(backend, filenames), fields(dir = %dir.display()))]
pub async fn load(backend: &dyn StorageBackend, dir: &Path, filenames: &[String]) -> Result<Descriptor> {
    let raw = read_raw(backend, dir, filenames).await?;
    crate::process(raw)
}
