use serde::{Deserialize, Serialize};

/// Static priority tier of a collaborator.
/// Lower tiers are sacrificed first when capacity has to be freed.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Evicted before anything else
    Low,
    /// Default tier when a collaborator does not state one
    #[default]
    Medium,
    /// Evicted only when no lower tier can cover the deficit
    High,
}

impl Priority {
    /// Strict parse, case-insensitive. Returns `None` for unknown tiers.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            _ => None,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
        }
    }
}

/// Why a lease was taken away from its collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionReason {
    /// Another collaborator needed the memory
    Pressure,
    /// The lease sat unused past the idle timeout
    Idle,
    /// Total capacity shrank below what was committed
    Capacity,
}

impl std::fmt::Display for EvictionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvictionReason::Pressure => write!(f, "pressure"),
            EvictionReason::Idle => write!(f, "idle"),
            EvictionReason::Capacity => write!(f, "capacity"),
        }
    }
}

/// A requested commitment: `amount` MiB for the named resource (usually a model).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSpec {
    pub resource: String,
    pub amount: u64,
}

impl ResourceSpec {
    pub fn new(resource: impl Into<String>, amount: u64) -> Self {
        Self {
            resource: resource.into(),
            amount,
        }
    }
}

/// Total capacity and the slice of it that is never handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capacity {
    /// Total addressable memory in MiB
    pub total: u64,
    /// Headroom kept free at all times
    pub reserve: u64,
}

impl Capacity {
    pub fn new(total: u64, reserve: u64) -> Self {
        Self { total, reserve }
    }

    /// The most that may ever be committed to loaded leases.
    pub fn limit(&self) -> u64 {
        self.total.saturating_sub(self.reserve)
    }
}
