use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::types::{Collaborator, Priority};

/// Persisted form of a lease. Timestamps are not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseRecord {
    pub resource: String,
    pub amount: u64,
    #[serde(default = "default_loaded")]
    pub loaded: bool,
}

fn default_loaded() -> bool {
    true
}

/// Persisted form of a collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollaboratorRecord {
    pub name: String,
    #[serde(default)]
    pub callback: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub leases: Vec<LeaseRecord>,
}

impl From<&Collaborator> for CollaboratorRecord {
    fn from(c: &Collaborator) -> Self {
        Self {
            name: c.name.clone(),
            callback: c.callback.clone(),
            priority: c.priority,
            leases: c
                .leases
                .iter()
                .map(|l| LeaseRecord {
                    resource: l.resource.clone(),
                    amount: l.amount,
                    loaded: l.loaded,
                })
                .collect(),
        }
    }
}

/// Defines the contract for registry storage backends.
///
/// `save` always receives the full registry in registration order.
pub trait RegistryStore {
    /// Load the last saved snapshot. An empty store yields an empty list.
    fn load(&self) -> Result<Vec<CollaboratorRecord>, StoreError>;

    /// Replace the stored snapshot.
    fn save(&mut self, records: &[CollaboratorRecord]) -> Result<(), StoreError>;

    /// Human readable backend name for logs
    fn describe(&self) -> String;
}
