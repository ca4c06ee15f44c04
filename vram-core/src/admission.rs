use crate::eviction::{Candidate, EvictionPolicy};

/// The part of the ledger an admission decision depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerView {
    /// Capacity minus reserve
    pub limit: u64,
    /// Loaded amount that still counts against `limit` for this decision
    pub used: u64,
}

impl LedgerView {
    pub fn available(&self) -> u64 {
        self.limit.saturating_sub(self.used)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionVerdict {
    /// Admit after evicting `victims` (possibly none), in order.
    Admit { victims: Vec<Candidate>, freed: u64 },
    /// Cannot fit even if every eligible lease were evicted.
    Reject {
        requested: u64,
        available: u64,
        deficit: u64,
        obtainable: u64,
    },
}

pub struct AdmissionController;

impl AdmissionController {
    /// Decide whether `requested` MiB fit for `requester`.
    ///
    /// Victims are only drawn from other collaborators and the selection
    /// stops as soon as the deficit is covered.
    pub fn decide(
        view: LedgerView,
        requester: &str,
        requested: u64,
        candidates: &[Candidate],
    ) -> AdmissionVerdict {
        let available = view.available();
        if available >= requested {
            return AdmissionVerdict::Admit {
                victims: Vec::new(),
                freed: 0,
            };
        }

        let deficit = requested - available;
        let victims = EvictionPolicy::select_victims(candidates, Some(requester), deficit);
        let freed = EvictionPolicy::total(&victims);

        if freed < deficit {
            return AdmissionVerdict::Reject {
                requested,
                available,
                deficit,
                obtainable: freed,
            };
        }

        AdmissionVerdict::Admit { victims, freed }
    }
}
