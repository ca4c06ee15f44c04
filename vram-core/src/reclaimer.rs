//! Time-based reclamation of idle leases.
//!
//! A sweep first collects idle candidates, then evicts them one at a time.
//! Each eviction re-checks idleness, so a lease touched after the candidate
//! list was taken survives the sweep.

use std::time::Duration;

use serde::Serialize;

use crate::notifier::EvictionNotice;
use crate::registry::Registry;
use crate::types::{EvictedLease, LeaseKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleReclaimer {
    /// Leases unused for longer than this are reclaimed (ms)
    pub idle_timeout_ms: u64,
    /// Time between sweeps
    pub interval: Duration,
}

/// What one sweep evicted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReclaimReport {
    pub evicted: Vec<EvictedLease>,
    pub freed: u64,
    #[serde(skip)]
    pub notices: Vec<EvictionNotice>,
}

impl ReclaimReport {
    pub fn record(&mut self, notice: EvictionNotice) {
        self.freed += notice.freed();
        self.evicted.extend(notice.leases.iter().cloned());
        self.notices.push(notice);
    }

    pub fn is_empty(&self) -> bool {
        self.evicted.is_empty()
    }

    pub fn log(&self) {
        if self.is_empty() {
            tracing::debug!("Idle sweep found nothing to reclaim");
        } else {
            tracing::info!(
                evicted = self.evicted.len(),
                freed_mib = self.freed,
                "Idle leases reclaimed"
            );
        }
    }
}

impl IdleReclaimer {
    pub fn new(idle_timeout: Duration, interval: Duration) -> Self {
        Self {
            idle_timeout_ms: u64::try_from(idle_timeout.as_millis()).unwrap_or(u64::MAX),
            interval,
        }
    }

    /// Leases idle at `now`. Nothing is evicted yet.
    pub fn candidates(&self, registry: &Registry, now: u64) -> Vec<LeaseKey> {
        registry.idle_leases(now, self.idle_timeout_ms)
    }

    /// Evict one candidate if it is still idle at `now`.
    pub fn reclaim(
        &self,
        registry: &mut Registry,
        key: &LeaseKey,
        now: u64,
        report: &mut ReclaimReport,
    ) -> bool {
        match registry.reclaim_if_idle(key, now, self.idle_timeout_ms) {
            Some(notice) => {
                report.record(notice);
                true
            }
            None => {
                tracing::debug!(
                    collaborator = %key.collaborator,
                    resource = %key.resource,
                    "Lease touched since sweep started, kept"
                );
                false
            }
        }
    }

    /// Collect and evict in one go, for callers holding exclusive access.
    pub fn sweep(&self, registry: &mut Registry, now: u64) -> ReclaimReport {
        let mut report = ReclaimReport::default();
        for key in self.candidates(registry, now) {
            self.reclaim(registry, &key, now, &mut report);
        }
        report.log();
        report
    }
}
