//! # vram-core
//!
//! Bookkeeping for GPU memory shared by several model-serving processes.
//! Tracks what each collaborator has loaded, admits new allocations under a
//! hard capacity by evicting lower-priority and staler leases, reclaims idle
//! leases, and persists the ledger across restarts.

pub mod admission;
pub mod clock;
pub mod config;
pub mod error;
pub mod eviction;
pub mod infrastructure;
#[path = "infrastructure_in_memory.rs"]
pub mod infrastructure_in_memory;
#[path = "infrastructure_json.rs"]
pub mod infrastructure_json;
#[cfg(feature = "sqlite")]
#[path = "infrastructure_sqlite.rs"]
pub mod infrastructure_sqlite;
pub mod notifier;
pub mod probe;
pub mod reclaimer;
pub mod registry;
pub mod types;

#[cfg(test)]
mod admission_test;
#[cfg(test)]
mod eviction_test;
#[cfg(test)]
#[path = "infrastructure_test.rs"]
mod infrastructure_test;
#[cfg(test)]
mod notifier_test;
#[cfg(test)]
mod probe_test;
