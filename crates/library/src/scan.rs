use crate::MAX_SCAN_CONCURRENCY;
use crate::error::{ErrorKind, Result};
use crate::locks::DirLocks;
use async_stream::stream;
use curator_index::{FacetsArchive, SyncStats};
use curator_storage::BackendHandle;
use exn::ResultExt;
use futures::stream::FuturesUnordered;
use futures::{Stream, StreamExt, TryStreamExt};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Progress events emitted by [`scan_facets`].
///
/// Events follow a strict ordering:
/// 1. [`Started`](Self::Started) exactly once.
/// 2. [`DiscoveryComplete`](Self::DiscoveryComplete) exactly once, with the
///    number of directories that hold files.
/// 3. [`Scanned`](Self::Scanned) once per directory.
/// 4. [`Complete`](Self::Complete) exactly once.
///
/// A discovery failure terminates the stream early, in which case
/// [`Complete`](Self::Complete) is never emitted.
#[derive(Debug, PartialEq)]
pub enum ScanEvent {
    Started,
    DiscoveryComplete(u64),
    Scanned { dir: PathBuf, stats: SyncStats },
    Complete,
}

/// Rebuild the stored facets of every directory that holds files.
///
/// Directories are rebuilt concurrently, up to `MAX_SCAN_CONCURRENCY` at a
/// time, each under its lock in `locks`. A directory that fails is surfaced
/// as an `Err` item without terminating the stream.
pub fn scan_facets<'a>(
    backend: &'a BackendHandle,
    facets: &'a FacetsArchive,
    locks: &'a DirLocks,
) -> impl Stream<Item = Result<ScanEvent>> + 'a {
    stream!({
        yield Ok(ScanEvent::Started);

        let dirs = match discover(backend).await {
            Ok(dirs) => dirs,
            Err(e) => {
                yield Err(e);
                return;
            },
        };
        yield Ok(ScanEvent::DiscoveryComplete(u64::try_from(dirs.len()).unwrap_or(u64::MAX)));

        let mut pending: Vec<_> = dirs.into_iter().map(|dir| rebuild(facets, locks, dir)).collect();
        let mut processing = FuturesUnordered::new();
        processing.extend(pending.drain(..MAX_SCAN_CONCURRENCY.min(pending.len())));
        while let Some(result) = processing.next().await {
            yield result;
            // FIFO, so directories are started in sorted order.
            if !pending.is_empty() {
                processing.push(pending.remove(0));
            }
        }

        yield Ok(ScanEvent::Complete);
    })
}

async fn discover(backend: &BackendHandle) -> Result<BTreeSet<PathBuf>> {
    backend
        .walk(None)
        .map_ok(|info| info.path.parent().map(Path::to_path_buf).unwrap_or_default())
        .try_collect()
        .await
        .or_raise(|| ErrorKind::Storage)
}

async fn rebuild(facets: &FacetsArchive, locks: &DirLocks, dir: PathBuf) -> Result<ScanEvent> {
    let stats = {
        let _guard = locks.lock(&dir).await;
        facets.rebuild(&dir).await.or_raise(|| ErrorKind::Index)?
    };
    tracing::debug!(path = %dir.display(), upserts = stats.upserts, deletes = stats.deletes, "Facets rebuilt");
    Ok(ScanEvent::Scanned { dir, stats })
}
