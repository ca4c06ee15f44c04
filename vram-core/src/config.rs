use std::time::Duration;

use crate::reclaimer::IdleReclaimer;
use crate::types::Capacity;

/// Tunables of a coordinator process. Fixed for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// MiB never handed out
    pub reserve_mib: u64,
    /// Used when the capacity probe fails
    pub fallback_capacity_mib: u64,
    pub idle_timeout: Duration,
    pub reclaim_interval: Duration,
    /// Upper bound for one eviction notice round trip
    pub notify_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            reserve_mib: 1024,
            fallback_capacity_mib: 24 * 1024,
            idle_timeout: Duration::from_secs(30 * 60),
            reclaim_interval: Duration::from_secs(60),
            notify_timeout: Duration::from_secs(5),
        }
    }
}

impl CoordinatorConfig {
    pub fn capacity(&self, total_mib: u64) -> Capacity {
        Capacity::new(total_mib, self.reserve_mib)
    }

    pub fn reclaimer(&self) -> IdleReclaimer {
        IdleReclaimer::new(self.idle_timeout, self.reclaim_interval)
    }
}
