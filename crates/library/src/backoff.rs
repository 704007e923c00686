use curator_config::RefreshConfig;
use std::time::Duration;

/// Delay policy of the reconciliation loop.
///
/// A pass that saw changes resets the delay to `base`; every quiet pass adds
/// `step`, up to `ceiling`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub step: Duration,
    pub ceiling: Duration,
}
impl Backoff {
    pub fn from_config(config: &RefreshConfig) -> Self {
        Self { base: config.base(), step: config.step(), ceiling: config.ceiling() }
    }

    pub fn next(&self, current: Duration, changes_found: bool) -> Duration {
        match changes_found {
            true => self.base,
            false => current.saturating_add(self.step).min(self.ceiling),
        }
    }
}
impl Default for Backoff {
    fn default() -> Self {
        Self { base: Duration::from_secs(3), step: Duration::from_secs(5), ceiling: Duration::from_secs(60) }
    }
}
