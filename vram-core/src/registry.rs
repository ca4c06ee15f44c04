//! The shared-capacity ledger.
//!
//! `Registry` owns every collaborator and lease. Each mutating call decides
//! against the ledger, commits, then saves a snapshot through the configured
//! [`RegistryStore`]. A rejected call changes nothing. Eviction notices are
//! returned to the caller instead of being sent from here, so delivery can
//! happen outside whatever lock guards the registry.

use serde::Serialize;

use crate::admission::{AdmissionController, AdmissionVerdict, LedgerView};
use crate::error::CoordinatorError;
use crate::eviction::{Candidate, EvictionPolicy};
use crate::infrastructure::{CollaboratorRecord, RegistryStore};
use crate::notifier::EvictionNotice;
use crate::types::*;

/// Lease name used by `request_allocation` when the caller names none.
pub const DEFAULT_RESERVATION: &str = "reservation";

/// Result of an accepted registration or allocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Admission {
    /// MiB committed to the caller by this call
    pub granted: u64,
    /// MiB taken from other collaborators to make room
    pub freed: u64,
    pub notices: Vec<EvictionNotice>,
}

impl Admission {
    pub fn evicted(&self) -> Vec<EvictedLease> {
        self.notices
            .iter()
            .flat_map(|n| n.leases.iter().cloned())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaseStatus {
    pub resource: String,
    pub amount: u64,
    pub loaded: bool,
    pub idle_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollaboratorStatus {
    pub name: String,
    pub callback: Option<String>,
    pub priority: Priority,
    pub used: u64,
    pub leases: Vec<LeaseStatus>,
}

/// Point-in-time view of the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapacityStatus {
    pub total: u64,
    pub reserve: u64,
    pub used: u64,
    pub available: u64,
    pub collaborators: Vec<CollaboratorStatus>,
}

pub struct Registry {
    /// Registration order
    collaborators: Vec<Collaborator>,
    capacity: Capacity,
    store: Box<dyn RegistryStore + Send + Sync>,
    next_seq: u64,
}

impl Registry {
    /// An empty registry. Nothing is loaded from `store`.
    pub fn new(capacity: Capacity, store: Box<dyn RegistryStore + Send + Sync>) -> Self {
        Self {
            collaborators: Vec::new(),
            capacity,
            store,
            next_seq: 0,
        }
    }

    /// Rebuild the registry from the last snapshot in `store`.
    ///
    /// Restored leases start with `last_used = now`. If the snapshot commits
    /// more than `capacity` allows, the excess is evicted and the notices are
    /// returned for delivery.
    pub fn open(
        capacity: Capacity,
        store: Box<dyn RegistryStore + Send + Sync>,
        now: u64,
    ) -> (Self, Vec<EvictionNotice>) {
        let mut registry = Self::new(capacity, store);

        match registry.store.load() {
            Ok(records) => {
                for record in records {
                    registry.restore(record, now);
                }
                tracing::info!(
                    backend = %registry.store.describe(),
                    collaborators = registry.collaborators.len(),
                    used_mib = registry.used(),
                    "Registry restored"
                );
            }
            Err(e) => {
                let err = CoordinatorError::PersistenceFailed(e);
                tracing::warn!(
                    backend = %registry.store.describe(),
                    error = %err,
                    "Could not load registry snapshot, starting empty"
                );
            }
        }

        let notices = registry.enforce_limit(EvictionReason::Capacity);
        if !notices.is_empty() {
            registry.persist();
        }
        (registry, notices)
    }

    fn restore(&mut self, record: CollaboratorRecord, now: u64) {
        if self.find(&record.name).is_some() {
            tracing::warn!(collaborator = %record.name, "Duplicate collaborator in snapshot ignored");
            return;
        }
        let mut collaborator = Collaborator::new(record.name, record.callback, record.priority);
        for lease in record.leases {
            if collaborator.lease(&lease.resource).is_some() {
                continue;
            }
            let seq = self.next_seq();
            let mut restored = Lease::new(lease.resource, lease.amount, seq, now);
            restored.loaded = lease.loaded;
            collaborator.leases.push(restored);
        }
        self.collaborators.push(collaborator);
    }

    // ─── Commands ───────────────────────────────────────────────────────────

    /// Register `name` with exactly `leases`, replacing any previous set.
    ///
    /// The caller's previous leases do not count against the new request and
    /// are never chosen as victims.
    pub fn register(
        &mut self,
        name: &str,
        callback: &str,
        leases: Vec<ResourceSpec>,
        priority: Option<Priority>,
        now: u64,
    ) -> Result<Admission, CoordinatorError> {
        let Some((leases, requested)) = merge_duplicates(leases) else {
            return Err(self.oversized(name));
        };
        let own = self.find(name).map(|i| self.collaborators[i].used()).unwrap_or(0);

        let view = LedgerView {
            limit: self.capacity.limit(),
            used: self.used().saturating_sub(own),
        };
        let (victims, freed) = self.admit(view, name, requested)?;
        let notices = self.apply_evictions(&victims, EvictionReason::Pressure);

        let idx = self.upsert(name, priority);
        let prior = std::mem::take(&mut self.collaborators[idx].leases);
        let mut replaced = Vec::with_capacity(leases.len());
        for spec in leases {
            let seq = match prior.iter().find(|l| l.resource == spec.resource) {
                Some(old) => old.seq,
                None => self.next_seq(),
            };
            replaced.push(Lease::new(spec.resource, spec.amount, seq, now));
        }

        let collaborator = &mut self.collaborators[idx];
        collaborator.leases = replaced;
        collaborator.callback = Some(callback.to_string());

        tracing::info!(
            collaborator = %name,
            priority = %collaborator.priority,
            committed_mib = requested,
            freed_mib = freed,
            "Collaborator registered"
        );

        self.persist();
        Ok(Admission {
            granted: requested,
            freed,
            notices,
        })
    }

    /// Reserve `amount` MiB of headroom for `name`.
    ///
    /// The amount is committed to `resource` (or [`DEFAULT_RESERVATION`]):
    /// a loaded lease grows, an unloaded or missing one is (re)loaded with
    /// exactly `amount`. Unknown collaborators are created without a callback.
    pub fn request_allocation(
        &mut self,
        name: &str,
        amount: u64,
        resource: Option<&str>,
        priority: Option<Priority>,
        now: u64,
    ) -> Result<Admission, CoordinatorError> {
        let view = LedgerView {
            limit: self.capacity.limit(),
            used: self.used(),
        };
        let (victims, freed) = self.admit(view, name, amount)?;
        let notices = self.apply_evictions(&victims, EvictionReason::Pressure);

        let idx = self.upsert(name, priority);
        let resource = resource.unwrap_or(DEFAULT_RESERVATION);

        if self.collaborators[idx].lease(resource).is_none() {
            let seq = self.next_seq();
            self.collaborators[idx]
                .leases
                .push(Lease::new(resource, amount, seq, now));
        } else if let Some(lease) = self.collaborators[idx].lease_mut(resource) {
            if lease.loaded {
                lease.amount += amount;
            } else {
                lease.amount = amount;
                lease.loaded = true;
            }
            lease.touch(now);
        }

        tracing::info!(
            collaborator = %name,
            resource = %resource,
            granted_mib = amount,
            freed_mib = freed,
            "Allocation granted"
        );

        self.persist();
        Ok(Admission {
            granted: amount,
            freed,
            notices,
        })
    }

    /// Mark a lease as still in use.
    pub fn touch(&mut self, name: &str, resource: &str, now: u64) -> Result<(), CoordinatorError> {
        let idx = self
            .find(name)
            .ok_or_else(|| CoordinatorError::CollaboratorNotFound(name.to_string()))?;
        let lease = self.collaborators[idx]
            .lease_mut(resource)
            .ok_or_else(|| CoordinatorError::LeaseNotFound {
                collaborator: name.to_string(),
                resource: resource.to_string(),
            })?;
        lease.touch(now);
        Ok(())
    }

    /// Unload every lease of `name` without notifying it. Returns the MiB freed;
    /// releasing an already released collaborator frees 0.
    pub fn release_explicit(&mut self, name: &str) -> Result<u64, CoordinatorError> {
        let idx = self
            .find(name)
            .ok_or_else(|| CoordinatorError::CollaboratorNotFound(name.to_string()))?;

        let mut freed = 0;
        for lease in self.collaborators[idx].leases.iter_mut().filter(|l| l.loaded) {
            lease.loaded = false;
            freed += lease.amount;
        }

        if freed > 0 {
            tracing::info!(collaborator = %name, freed_mib = freed, "Collaborator released");
            self.persist();
        }
        Ok(freed)
    }

    /// Unload one lease without notifying its owner.
    pub fn release_resource(&mut self, name: &str, resource: &str) -> Result<u64, CoordinatorError> {
        let idx = self
            .find(name)
            .ok_or_else(|| CoordinatorError::CollaboratorNotFound(name.to_string()))?;
        let lease = self.collaborators[idx]
            .lease_mut(resource)
            .ok_or_else(|| CoordinatorError::LeaseNotFound {
                collaborator: name.to_string(),
                resource: resource.to_string(),
            })?;

        if !lease.loaded {
            return Ok(0);
        }
        lease.loaded = false;
        let freed = lease.amount;

        tracing::info!(collaborator = %name, resource = %resource, freed_mib = freed, "Lease released");
        self.persist();
        Ok(freed)
    }

    /// Apply a freshly probed total. Shrinking below the committed amount
    /// evicts in policy order until the ledger fits again.
    pub fn set_total_capacity(&mut self, total: u64) -> Vec<EvictionNotice> {
        if total == self.capacity.total {
            return Vec::new();
        }
        tracing::info!(
            previous_mib = self.capacity.total,
            total_mib = total,
            "Total capacity changed"
        );
        self.capacity.total = total;

        let notices = self.enforce_limit(EvictionReason::Capacity);
        if !notices.is_empty() {
            self.persist();
        }
        notices
    }

    /// Loaded leases idle for longer than `idle_timeout` ms at `now`.
    pub fn idle_leases(&self, now: u64, idle_timeout: u64) -> Vec<LeaseKey> {
        self.collaborators
            .iter()
            .flat_map(|c| {
                c.leases
                    .iter()
                    .filter(move |l| l.loaded && l.idle_for(now) > idle_timeout)
                    .map(move |l| LeaseKey {
                        collaborator: c.name.clone(),
                        resource: l.resource.clone(),
                    })
            })
            .collect()
    }

    /// Evict `key` if, right now, it is still loaded and still idle.
    pub fn reclaim_if_idle(
        &mut self,
        key: &LeaseKey,
        now: u64,
        idle_timeout: u64,
    ) -> Option<EvictionNotice> {
        let idx = self.find(&key.collaborator)?;
        let collaborator = &mut self.collaborators[idx];
        let callback = collaborator.callback.clone();
        let lease = collaborator.lease_mut(&key.resource)?;
        if !lease.loaded || lease.idle_for(now) <= idle_timeout {
            return None;
        }
        lease.loaded = false;

        let notice = EvictionNotice {
            collaborator: key.collaborator.clone(),
            callback,
            reason: EvictionReason::Idle,
            leases: vec![EvictedLease {
                collaborator: key.collaborator.clone(),
                resource: key.resource.clone(),
                amount: lease.amount,
            }],
        };
        self.persist();
        Some(notice)
    }

    // ─── Queries ────────────────────────────────────────────────────────────

    pub fn snapshot(&self, now: u64) -> CapacityStatus {
        let used = self.used();
        CapacityStatus {
            total: self.capacity.total,
            reserve: self.capacity.reserve,
            used,
            available: self.capacity.limit().saturating_sub(used),
            collaborators: self
                .collaborators
                .iter()
                .map(|c| CollaboratorStatus {
                    name: c.name.clone(),
                    callback: c.callback.clone(),
                    priority: c.priority,
                    used: c.used(),
                    leases: c
                        .leases
                        .iter()
                        .map(|l| LeaseStatus {
                            resource: l.resource.clone(),
                            amount: l.amount,
                            loaded: l.loaded,
                            idle_ms: l.idle_for(now),
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    pub fn capacity(&self) -> Capacity {
        self.capacity
    }

    /// Sum of every loaded lease
    pub fn used(&self) -> u64 {
        self.collaborators
            .iter()
            .fold(0u64, |acc, c| acc.saturating_add(c.used()))
    }

    pub fn collaborator(&self, name: &str) -> Option<&Collaborator> {
        self.find(name).map(|i| &self.collaborators[i])
    }

    pub fn collaborators(&self) -> &[Collaborator] {
        &self.collaborators
    }

    pub fn loaded_lease_count(&self) -> usize {
        self.collaborators
            .iter()
            .map(|c| c.leases.iter().filter(|l| l.loaded).count())
            .sum()
    }

    pub fn records(&self) -> Vec<CollaboratorRecord> {
        self.collaborators.iter().map(CollaboratorRecord::from).collect()
    }

    pub fn store_description(&self) -> String {
        self.store.describe()
    }

    // ─── Internals ──────────────────────────────────────────────────────────

    fn find(&self, name: &str) -> Option<usize> {
        self.collaborators.iter().position(|c| c.name == name)
    }

    fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn upsert(&mut self, name: &str, priority: Option<Priority>) -> usize {
        match self.find(name) {
            Some(idx) => {
                if let Some(priority) = priority {
                    self.collaborators[idx].priority = priority;
                }
                idx
            }
            None => {
                self.collaborators.push(Collaborator::new(
                    name,
                    None,
                    priority.unwrap_or_default(),
                ));
                self.collaborators.len() - 1
            }
        }
    }

    fn candidates(&self) -> Vec<Candidate> {
        self.collaborators
            .iter()
            .flat_map(|c| {
                c.leases.iter().filter(|l| l.loaded).map(move |l| Candidate {
                    collaborator: c.name.clone(),
                    resource: l.resource.clone(),
                    amount: l.amount,
                    priority: c.priority,
                    last_used: l.last_used,
                    seq: l.seq,
                })
            })
            .collect()
    }

    fn admit(
        &self,
        view: LedgerView,
        requester: &str,
        requested: u64,
    ) -> Result<(Vec<Candidate>, u64), CoordinatorError> {
        match AdmissionController::decide(view, requester, requested, &self.candidates()) {
            AdmissionVerdict::Admit { victims, freed } => Ok((victims, freed)),
            AdmissionVerdict::Reject {
                requested,
                available,
                deficit,
                obtainable,
            } => {
                tracing::info!(
                    collaborator = %requester,
                    requested_mib = requested,
                    available_mib = available,
                    deficit_mib = deficit,
                    obtainable_mib = obtainable,
                    "Admission rejected"
                );
                Err(CoordinatorError::CapacityExceeded {
                    requested,
                    available,
                    obtainable,
                })
            }
        }
    }

    /// Rejection for a request whose amounts do not fit in a `u64`.
    fn oversized(&self, requester: &str) -> CoordinatorError {
        let available = self.capacity.limit().saturating_sub(self.used());
        let obtainable =
            EvictionPolicy::total(&EvictionPolicy::rank(&self.candidates(), Some(requester)));
        tracing::info!(
            collaborator = %requester,
            available_mib = available,
            obtainable_mib = obtainable,
            "Admission rejected, requested amount overflows"
        );
        CoordinatorError::CapacityExceeded {
            requested: u64::MAX,
            available,
            obtainable,
        }
    }

    /// Unload `victims` and group them into one notice per collaborator,
    /// in first-victim order.
    fn apply_evictions(&mut self, victims: &[Candidate], reason: EvictionReason) -> Vec<EvictionNotice> {
        let mut notices: Vec<EvictionNotice> = Vec::new();
        for victim in victims {
            let Some(idx) = self.find(&victim.collaborator) else {
                continue;
            };
            let collaborator = &mut self.collaborators[idx];
            let callback = collaborator.callback.clone();
            let Some(lease) = collaborator.lease_mut(&victim.resource) else {
                continue;
            };
            lease.loaded = false;

            tracing::info!(
                collaborator = %victim.collaborator,
                resource = %victim.resource,
                amount_mib = victim.amount,
                reason = %reason,
                "Lease evicted"
            );

            let evicted = victim.to_evicted();
            match notices.iter_mut().find(|n| n.collaborator == victim.collaborator) {
                Some(notice) => notice.leases.push(evicted),
                None => notices.push(EvictionNotice {
                    collaborator: victim.collaborator.clone(),
                    callback,
                    reason,
                    leases: vec![evicted],
                }),
            }
        }
        notices
    }

    fn enforce_limit(&mut self, reason: EvictionReason) -> Vec<EvictionNotice> {
        let used = self.used();
        let limit = self.capacity.limit();
        if used <= limit {
            return Vec::new();
        }
        let victims = EvictionPolicy::select_victims(&self.candidates(), None, used - limit);
        tracing::warn!(
            used_mib = used,
            limit_mib = limit,
            victims = victims.len(),
            "Committed memory exceeds capacity, evicting"
        );
        self.apply_evictions(&victims, reason)
    }

    fn persist(&mut self) {
        let records = self.records();
        if let Err(e) = self.store.save(&records) {
            let err = CoordinatorError::PersistenceFailed(e);
            tracing::warn!(
                backend = %self.store.describe(),
                error = %err,
                "Registry snapshot not saved"
            );
        }
    }
}

/// Collapse repeated resource names into one spec with the summed amount,
/// keeping first-occurrence order, and return the merged set with its total.
///
/// `None` when any sum overflows.
fn merge_duplicates(specs: Vec<ResourceSpec>) -> Option<(Vec<ResourceSpec>, u64)> {
    let mut merged: Vec<ResourceSpec> = Vec::with_capacity(specs.len());
    let mut total = 0u64;
    for spec in specs {
        total = total.checked_add(spec.amount)?;
        match merged.iter_mut().find(|m| m.resource == spec.resource) {
            Some(existing) => existing.amount = existing.amount.checked_add(spec.amount)?,
            None => merged.push(spec),
        }
    }
    Some((merged, total))
}
