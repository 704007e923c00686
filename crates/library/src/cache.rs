//! Downstream cache invalidation.

/// A cache of rendered results that goes stale when the content tree
/// changes. Scopes are free-form; the reconciliation loop invalidates
/// `"content"` after every pass that saw changes.
pub trait Cache: Send + Sync {
    fn invalidate(&self, scope: &str);
}

/// For deployments without a cache.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;
impl Cache for NoCache {
    fn invalidate(&self, scope: &str) {
        tracing::trace!(scope, "No cache to invalidate");
    }
}
