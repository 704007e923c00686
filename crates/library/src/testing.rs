//! Collaborators and fixtures shared by the tests of this crate.

use crate::{Cache, Library, Scheduler, Services, Task};
use curator_config::Config;
use curator_facets::Fragment;
use curator_facets::probe::MockProbe;
use curator_index::{Catalog, Database};
use curator_storage::backend::MockBackend;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Records what it is asked to schedule and runs nothing until told to.
#[derive(Default)]
pub(crate) struct RecordingScheduler {
    delays: Mutex<Vec<Duration>>,
    tasks: Mutex<Vec<Task>>,
}
impl RecordingScheduler {
    pub(crate) fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }

    /// Run every task scheduled so far, returning how many there were.
    pub(crate) async fn run_pending(&self) -> usize {
        let tasks: Vec<Task> = self.tasks.lock().unwrap().drain(..).collect();
        let count = tasks.len();
        for task in tasks {
            task.await;
        }
        count
    }
}
impl Scheduler for RecordingScheduler {
    fn schedule(&self, delay: Duration, task: Task) {
        self.delays.lock().unwrap().push(delay);
        self.tasks.lock().unwrap().push(task);
    }
}

#[derive(Default)]
pub(crate) struct RecordingCache {
    scopes: Mutex<Vec<String>>,
}
impl RecordingCache {
    pub(crate) fn scopes(&self) -> Vec<String> {
        self.scopes.lock().unwrap().clone()
    }
}
impl Cache for RecordingCache {
    fn invalidate(&self, scope: &str) {
        self.scopes.lock().unwrap().push(scope.to_string());
    }
}

pub(crate) struct Fixture {
    pub library: Library,
    pub backend: Arc<MockBackend>,
    pub scheduler: Arc<RecordingScheduler>,
    pub cache: Arc<RecordingCache>,
}

pub(crate) fn descriptor(title: &str) -> Vec<u8> {
    format!(r#"{{"title": "{title}", "content": {{"generic": {{}}}}}}"#).into_bytes()
}

/// A content directory in the first-generation layout.
pub(crate) const HEX_DIR: &str = "0a1/b2c/3d4/e5f/607/182/93a/4b5/c6d/7e8/f9";

/// A tree of files on the local filesystem, removed when dropped.
pub(crate) fn legacy_tree(files: Vec<(String, Vec<u8>)>) -> tempfile::TempDir {
    let root = tempfile::tempdir().unwrap();
    for (path, data) in files {
        let path = root.path().join(path);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, data).unwrap();
    }
    root
}

pub(crate) fn sunset() -> Fragment {
    Fragment { title: Some("Sunset".to_string()), width: Some(640), height: Some(480), ..Fragment::default() }
}

pub(crate) async fn fixture(files: Vec<(&str, Vec<u8>)>) -> Fixture {
    let backend = Arc::new(MockBackend::with_files(files));
    let scheduler = Arc::new(RecordingScheduler::default());
    let cache = Arc::new(RecordingCache::default());
    let services = Services {
        backend: backend.clone(),
        probe: Arc::new(MockProbe::with_fragments([("d/a.jpg", sunset())])),
        scheduler: scheduler.clone(),
        cache: cache.clone(),
    };
    let library = Library::assemble(
        &Config::default(),
        Database::connect_in_memory(Catalog::Content).await.unwrap(),
        Database::connect_in_memory(Catalog::Facets).await.unwrap(),
        services,
    )
    .unwrap();
    Fixture { library, backend, scheduler, cache }
}
