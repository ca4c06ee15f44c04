use crate::types::{EvictedLease, Priority};

/// A loaded lease as the policy sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub collaborator: String,
    pub resource: String,
    pub amount: u64,
    /// Tier of the owning collaborator
    pub priority: Priority,
    pub last_used: u64,
    pub seq: u64,
}

impl Candidate {
    pub fn to_evicted(&self) -> EvictedLease {
        EvictedLease {
            collaborator: self.collaborator.clone(),
            resource: self.resource.clone(),
            amount: self.amount,
        }
    }
}

/// A pure engine ordering leases for eviction.
///
/// Order: priority tier ascending, then `last_used` ascending, then insertion
/// sequence. Nothing here mutates state.
pub struct EvictionPolicy;

impl EvictionPolicy {
    /// Every eligible candidate in eviction order.
    /// Leases of `exclude` and zero-sized leases are never eligible.
    pub fn rank(candidates: &[Candidate], exclude: Option<&str>) -> Vec<Candidate> {
        let mut ranked: Vec<Candidate> = candidates
            .iter()
            .filter(|c| c.amount > 0)
            .filter(|c| exclude != Some(c.collaborator.as_str()))
            .cloned()
            .collect();

        // Stable sort keeps equal keys in input order
        ranked.sort_by_key(|c| (c.priority, c.last_used, c.seq));
        ranked
    }

    /// The shortest prefix of [`rank`](Self::rank) freeing at least `min_amount`.
    ///
    /// If the eligible leases cannot cover `min_amount` the whole ranking is
    /// returned; callers compare [`total`](Self::total) against what they need.
    pub fn select_victims(
        candidates: &[Candidate],
        exclude: Option<&str>,
        min_amount: u64,
    ) -> Vec<Candidate> {
        let mut freed = 0u64;
        let mut victims = Vec::new();
        for candidate in Self::rank(candidates, exclude) {
            if freed >= min_amount {
                break;
            }
            freed = freed.saturating_add(candidate.amount);
            victims.push(candidate);
        }
        victims
    }

    pub fn total(victims: &[Candidate]) -> u64 {
        victims
            .iter()
            .fold(0u64, |acc, v| acc.saturating_add(v.amount))
    }
}
