use serde::{Deserialize, Serialize};

use super::Priority;

/// A sized commitment against the shared capacity, held by one collaborator.
///
/// Evicted or released leases keep their record with `loaded = false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    /// Resource (model) name, unique per collaborator
    pub resource: String,
    /// Committed amount in MiB
    pub amount: u64,
    /// Last allocation or touch, in monotonic milliseconds
    pub last_used: u64,
    /// Whether the amount currently counts against capacity
    pub loaded: bool,
    /// Insertion order, final tie-breaker for eviction
    pub seq: u64,
}

impl Lease {
    pub fn new(resource: impl Into<String>, amount: u64, seq: u64, now: u64) -> Self {
        Self {
            resource: resource.into(),
            amount,
            last_used: now,
            loaded: true,
            seq,
        }
    }

    /// Moves `last_used` forward. Never moves it back.
    pub fn touch(&mut self, now: u64) {
        self.last_used = self.last_used.max(now);
    }

    pub fn idle_for(&self, now: u64) -> u64 {
        now.saturating_sub(self.last_used)
    }
}

/// A registered service that holds leases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collaborator {
    pub name: String,
    /// Endpoint that receives eviction notices. `None` until the service registers one.
    pub callback: Option<String>,
    pub priority: Priority,
    pub leases: Vec<Lease>,
}

impl Collaborator {
    pub fn new(name: impl Into<String>, callback: Option<String>, priority: Priority) -> Self {
        Self {
            name: name.into(),
            callback,
            priority,
            leases: Vec::new(),
        }
    }

    /// Sum of loaded lease amounts
    pub fn used(&self) -> u64 {
        self.leases
            .iter()
            .filter(|l| l.loaded)
            .fold(0u64, |acc, l| acc.saturating_add(l.amount))
    }

    pub fn lease(&self, resource: &str) -> Option<&Lease> {
        self.leases.iter().find(|l| l.resource == resource)
    }

    pub fn lease_mut(&mut self, resource: &str) -> Option<&mut Lease> {
        self.leases.iter_mut().find(|l| l.resource == resource)
    }
}

/// One lease that was taken away, as reported to callers and collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvictedLease {
    pub collaborator: String,
    pub resource: String,
    pub amount: u64,
}

/// Identifies one lease across the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeaseKey {
    pub collaborator: String,
    pub resource: String,
}
