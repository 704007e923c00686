//! The reconciliation loop.
//!
//! Every pass drains the batch of change events the storage backend has
//! accumulated and applies them to both indexes, then schedules the next
//! pass. Only one pass is ever in flight: the next one is scheduled by the
//! current one, after it has finished.

use crate::backoff::Backoff;
use crate::cache::Cache;
use crate::error::{ErrorKind, Result};
use crate::locks::DirLocks;
use crate::schedule::Scheduler;
use curator_index::{ContentArchive, FacetsArchive};
use curator_storage::{BackendHandle, ChangeEvent, ChangeKind};
use exn::ResultExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::instrument;

const EVENT_CAPACITY: usize = 256;
pub const CACHE_SCOPE: &str = "content";

pub struct Reconciler {
    backend: BackendHandle,
    content: ContentArchive,
    facets: FacetsArchive,
    meta_filenames: Vec<String>,
    backoff: Backoff,
    scheduler: Arc<dyn Scheduler>,
    cache: Arc<dyn Cache>,
    locks: Arc<DirLocks>,
    events: broadcast::Sender<ChangeEvent>,
}

impl Reconciler {
    pub fn new(
        backend: BackendHandle,
        content: ContentArchive,
        facets: FacetsArchive,
        meta_filenames: Vec<String>,
        backoff: Backoff,
        scheduler: Arc<dyn Scheduler>,
        cache: Arc<dyn Cache>,
        locks: Arc<DirLocks>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { backend, content, facets, meta_filenames, backoff, scheduler, cache, locks, events }
    }

    /// Every change event the loop drains, whether or not it touched an
    /// index. Slow subscribers miss events rather than hold up the loop.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }

    /// Schedule the first pass.
    pub fn start(self: &Arc<Self>) {
        tracing::info!(backend = self.backend.name(), delay = ?self.backoff.base, "Starting reconciliation loop");
        self.schedule_next(self.backoff.base);
    }

    /// Run one pass, then schedule the next with a delay derived from
    /// `delay`, the one this pass was scheduled with.
    ///
    /// A failed pass counts as a quiet one for the backoff and the error is
    /// returned after the next pass has been scheduled.
    #[instrument(skip(self), fields(backend = self.backend.name()))]
    pub async fn tick(self: &Arc<Self>, delay: Duration) -> Result<bool> {
        let result = self.check().await;
        let next = self.backoff.next(delay, matches!(result, Ok(true)));
        tracing::trace!(next = ?next, "Rescheduling reconciliation");
        self.schedule_next(next);
        result
    }

    // Not async: tick() and the task scheduled here would otherwise be
    // one recursive future.
    fn schedule_next(self: &Arc<Self>, delay: Duration) {
        let this = Arc::clone(self);
        self.scheduler.schedule(
            delay,
            Box::pin(async move {
                if let Err(err) = this.tick(delay).await {
                    tracing::error!(error = ?err, "Reconciliation pass failed");
                }
            }),
        );
    }

    /// Apply the pending change events, returning whether there were any.
    ///
    /// Failing to apply a single event is logged and does not stop the
    /// batch; failing to fetch the batch is an error. Each event is applied
    /// under the lock of the directory whose facets it touches.
    pub async fn check(&self) -> Result<bool> {
        let events = self.backend.changes().await.or_raise(|| ErrorKind::Storage)?;
        if events.is_empty() {
            return Ok(false);
        }
        tracing::debug!(count = events.len(), "Applying change events");
        for event in events {
            let dir = if event.is_dir { event.src.as_path() } else { event.parent() };
            let guard = self.locks.lock(dir).await;
            if let Err(err) = self.apply_event(&event).await {
                tracing::warn!(path = %event.src.display(), kind = ?event.kind, error = ?err, "Could not apply change event");
            }
            if is_descriptor(&event, &self.meta_filenames)
                && let Err(err) = self.apply_descriptor(&event).await
            {
                tracing::warn!(path = %event.src.display(), kind = ?event.kind, error = ?err, "Could not update content");
            }
            drop(guard);
            // Only fails when nobody is subscribed.
            _ = self.events.send(event);
        }
        self.cache.invalidate(CACHE_SCOPE);
        Ok(true)
    }

    async fn apply_event(&self, event: &ChangeEvent) -> Result<()> {
        match (event.is_dir, event.kind) {
            (true, ChangeKind::Deleted) => {
                let removed = self.facets.remove_dir(&event.src).await.or_raise(|| ErrorKind::Index)?;
                tracing::debug!(path = %event.src.display(), removed, "Directory removed");
                self.content.forget([&event.src]).await.or_raise(|| ErrorKind::Index)?;
            },
            // Files inside a new directory arrive as events of their own.
            (true, _) => {},
            (false, ChangeKind::Created | ChangeKind::Modified) => {
                self.facets.update_facets(&event.src, false).await.or_raise(|| ErrorKind::Index)?;
            },
            (false, ChangeKind::Deleted) => {
                self.facets.remove_facets(&event.src).await.or_raise(|| ErrorKind::Index)?;
            },
        }
        Ok(())
    }

    async fn apply_descriptor(&self, event: &ChangeEvent) -> Result<()> {
        let dir = event.parent();
        match event.kind {
            ChangeKind::Created | ChangeKind::Modified => {
                tracing::info!(path = %dir.display(), "Content discovered, adding it to the library");
                self.content.add_to_archive([dir]).await.or_raise(|| ErrorKind::Index)?;
            },
            ChangeKind::Deleted => {
                // The files are already gone; only the record is left.
                tracing::info!(path = %dir.display(), "Content removed, removing it from the library");
                self.content.forget([dir]).await.or_raise(|| ErrorKind::Index)?;
            },
        }
        Ok(())
    }
}

/// Is the event about a content descriptor file?
pub(crate) fn is_descriptor(event: &ChangeEvent, meta_filenames: &[String]) -> bool {
    !event.is_dir && event.name().is_some_and(|name| meta_filenames.iter().any(|meta| meta == name))
}
