//! The curator library: both indexes, the storage they describe, and the
//! loop that keeps them in sync.
//!
//! Collaborators are injected. [`Library::open`] builds the production
//! set from a [`Config`]; [`Library::assemble`] takes them ready-made.

mod backoff;
mod cache;
pub mod error;
mod import;
mod locks;
mod reconcile;
mod scan;
mod schedule;
#[cfg(test)]
mod testing;

pub use crate::backoff::Backoff;
pub use crate::cache::{Cache, NoCache};
pub use crate::import::import_content;
pub use crate::locks::DirLocks;
pub use crate::reconcile::{CACHE_SCOPE, Reconciler};
pub use crate::scan::{ScanEvent, scan_facets};
pub use crate::schedule::{Scheduler, Task, TokioScheduler};

use crate::error::{ErrorKind, Result};
use curator_config::{Config, DatabaseBackend};
use curator_facets::{Facets, FfprobeProbe, NullProbe, Probe, Registry};
use curator_index::{Catalog, ContentArchive, Database, FacetsArchive};
use curator_storage::backend::LocalBackend;
use curator_storage::{BackendHandle, ChangeEvent, ChangeQueue};
use exn::ResultExt;
use futures::Stream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Maximum number of directories rebuilt at once by [`scan_facets`].
pub(crate) const MAX_SCAN_CONCURRENCY: usize = 8;
const BACKEND_NAME: &str = "local";

/// Collaborators a [`Library`] is assembled from.
pub struct Services {
    pub backend: BackendHandle,
    pub probe: Arc<dyn Probe>,
    pub scheduler: Arc<dyn Scheduler>,
    pub cache: Arc<dyn Cache>,
}

pub struct Library {
    backend: BackendHandle,
    content_db: Database,
    facets_db: Database,
    content: ContentArchive,
    facets: FacetsArchive,
    scheduler: Arc<dyn Scheduler>,
    reconciler: Arc<Reconciler>,
    locks: Arc<DirLocks>,
    meta_filenames: Vec<String>,
    changes: Option<ChangeQueue>,
}

impl Library {
    /// Open the content directory and both databases named by `config`.
    ///
    /// A missing `ffprobe` is not fatal: facets are still maintained, only
    /// without probed details.
    pub async fn open(config: &Config, scheduler: Arc<dyn Scheduler>, cache: Arc<dyn Cache>) -> Result<Self> {
        let local = LocalBackend::new(BACKEND_NAME, &config.library.content_dir).or_raise(|| ErrorKind::Storage)?;
        let changes = local.change_queue();
        let content_db = connect(config.database.backend, &config.database.content, Catalog::Content).await?;
        let facets_db = connect(config.database.backend, &config.database.facets, Catalog::Facets).await?;
        let probe: Arc<dyn Probe> = match FfprobeProbe::discover(config.probe.ffprobe.as_deref(), config.probe.timeout()) {
            Ok(probe) => Arc::new(probe),
            Err(err) => {
                tracing::warn!(error = ?err, "ffprobe unavailable, facets will lack media details");
                Arc::new(NullProbe)
            },
        };
        let services = Services { backend: Arc::new(local), probe, scheduler, cache };
        let mut library = Self::assemble(config, content_db, facets_db, services)?;
        library.changes = Some(changes);
        Ok(library)
    }

    pub fn assemble(config: &Config, content_db: Database, facets_db: Database, services: Services) -> Result<Self> {
        let Services { backend, probe, scheduler, cache } = services;
        let meta_filenames = config.library.meta_filenames.clone();
        let content = ContentArchive::new(&content_db, backend.clone(), meta_filenames.clone())
            .or_raise(|| ErrorKind::Setup("content database"))?;
        let facets = FacetsArchive::new(&facets_db, backend.clone(), probe, Arc::new(Registry::default()))
            .or_raise(|| ErrorKind::Setup("facets database"))?;
        let locks = Arc::new(DirLocks::default());
        let reconciler = Arc::new(Reconciler::new(
            backend.clone(),
            content.clone(),
            facets.clone(),
            meta_filenames.clone(),
            Backoff::from_config(&config.refresh),
            scheduler.clone(),
            cache,
            locks.clone(),
        ));
        Ok(Self { backend, content_db, facets_db, content, facets, scheduler, reconciler, locks, meta_filenames, changes: None })
    }

    pub fn backend(&self) -> &BackendHandle {
        &self.backend
    }

    pub fn content(&self) -> &ContentArchive {
        &self.content
    }

    pub fn facets(&self) -> &FacetsArchive {
        &self.facets
    }

    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    /// Locks held while a directory's facets are rewritten.
    pub fn locks(&self) -> &Arc<DirLocks> {
        &self.locks
    }

    /// Where a watch transport pushes change events, when the library was
    /// opened on the local filesystem.
    pub fn change_queue(&self) -> Option<&ChangeQueue> {
        self.changes.as_ref()
    }

    /// Start the reconciliation loop.
    pub fn start(&self) {
        self.reconciler.start();
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.reconciler.subscribe()
    }

    /// Stored facets of a directory.
    ///
    /// On a miss a full rebuild is scheduled, and a partial record built
    /// from file names alone is returned in the meantime if `partial` is
    /// set.
    pub async fn facets_or_schedule(&self, dir: impl AsRef<Path>, partial: bool) -> Result<Option<Facets>> {
        let dir = dir.as_ref();
        if let Some(facets) = self.facets.get_facets(dir).await.or_raise(|| ErrorKind::Index)? {
            return Ok(Some(facets));
        }
        tracing::debug!(path = %dir.display(), "Facets not found, scheduling generation");
        self.schedule_rebuild(dir.to_path_buf());
        match partial {
            true => self.facets.generate(dir, true).await.or_raise(|| ErrorKind::Index),
            false => Ok(None),
        }
    }

    fn schedule_rebuild(&self, dir: PathBuf) {
        let facets = self.facets.clone();
        let locks = self.locks.clone();
        self.scheduler.schedule(
            std::time::Duration::ZERO,
            Box::pin(async move {
                let _guard = locks.lock(&dir).await;
                if let Err(err) = facets.rebuild(&dir).await {
                    tracing::warn!(path = %dir.display(), error = ?err, "Could not generate facets");
                }
            }),
        );
    }

    /// Rebuild the facets of every directory. See [`scan_facets`].
    pub fn scan_facets(&self) -> impl Stream<Item = Result<ScanEvent>> + '_ {
        scan_facets(&self.backend, &self.facets, &self.locks)
    }

    /// Copy the first-generation content kept under `src_dir`, a directory
    /// on the local filesystem, into the library and index it. Returns the
    /// number of items indexed. See [`import_content`].
    pub async fn import_content(&self, src_dir: impl AsRef<Path>) -> Result<usize> {
        let source = LocalBackend::new("import", src_dir.as_ref()).or_raise(|| ErrorKind::Storage)?;
        let imported = import_content(&source, &self.backend, &self.meta_filenames).await?;
        self.content.add_to_archive(&imported).await.or_raise(|| ErrorKind::Index)
    }

    /// Ingest every content directory, keeping existing records.
    pub async fn reload(&self) -> Result<usize> {
        self.content.reload_content().await.or_raise(|| ErrorKind::Index)
    }

    /// Drop every content record and ingest the content directories again.
    pub async fn refill(&self) -> Result<usize> {
        self.content.clear_and_reload().await.or_raise(|| ErrorKind::Index)
    }

    /// Close both databases. Passes already scheduled will fail.
    pub async fn close(&self) {
        self.content_db.close().await;
        self.facets_db.close().await;
    }
}

async fn connect(backend: DatabaseBackend, path: &Path, catalog: Catalog) -> Result<Database> {
    match backend {
        DatabaseBackend::Memory => Database::connect_in_memory(catalog).await,
        DatabaseBackend::Sqlite => {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await.or_raise(|| ErrorKind::Setup("database directory"))?;
            }
            Database::connect(path, catalog).await
        },
    }
    .or_raise(|| ErrorKind::Setup("database"))
}
