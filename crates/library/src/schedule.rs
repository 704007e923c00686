//! Deferred task execution.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::runtime::Handle;

/// A unit of deferred work. Tasks report their own failures.
pub type Task = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Runs a task once, some time after a delay.
///
/// Scheduling is fire-and-forget: the caller gets no handle back and the
/// task runs at most once.
pub trait Scheduler: Send + Sync {
    fn schedule(&self, delay: Duration, task: Task);
}

/// Spawns every task onto a Tokio runtime, sleeping for the delay first.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}
impl TokioScheduler {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Use the runtime the caller is running on.
    pub fn current() -> Result<Self> {
        let handle = Handle::try_current().or_raise(|| ErrorKind::Runtime)?;
        Ok(Self::new(handle))
    }
}
impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: Task) {
        self.handle.spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            task.await;
        });
    }
}
