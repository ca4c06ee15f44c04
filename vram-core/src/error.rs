//! Error taxonomy of the coordinator.
//!
//! `CapacityExceeded` and the not-found variants are returned to callers and
//! always leave the ledger untouched. Notification and persistence failures
//! happen after a commit and are only ever logged.

use thiserror::Error;

/// Errors surfaced by registry operations.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// The request cannot fit even after evicting every eligible lease.
    #[error(
        "capacity exceeded: requested {requested} MiB, {available} MiB available, at most {obtainable} MiB can be freed"
    )]
    CapacityExceeded {
        requested: u64,
        available: u64,
        obtainable: u64,
    },

    #[error("collaborator '{0}' not found")]
    CollaboratorNotFound(String),

    #[error("lease '{resource}' not found for collaborator '{collaborator}'")]
    LeaseNotFound {
        collaborator: String,
        resource: String,
    },

    /// A collaborator did not acknowledge an eviction notice.
    #[error("notification failed: {0}")]
    NotificationFailed(#[from] NotifyError),

    /// The registry snapshot could not be written.
    #[error("persistence failed: {0}")]
    PersistenceFailed(#[from] StoreError),
}

impl CoordinatorError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CoordinatorError::CollaboratorNotFound(_) | CoordinatorError::LeaseNotFound { .. }
        )
    }
}

/// Errors from a registry storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed snapshot: {0}")]
    Serde(#[from] serde_json::Error),

    #[cfg(feature = "sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("store lock poisoned")]
    Poisoned,

    /// A lease amount the backend cannot represent, e.g. above `i64::MAX` in SQLite.
    #[error("lease '{resource}' amount {amount} is out of range for this store")]
    AmountOutOfRange { resource: String, amount: i128 },
}

/// Errors from delivering an eviction notice.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("collaborator '{0}' has no callback address")]
    NoCallback(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("callback answered HTTP {status}")]
    Rejected { status: u16 },

    #[error("callback declined release: {0}")]
    Declined(String),
}

/// Errors from querying the host for its GPU capacity.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("probe command unavailable: {0}")]
    Unavailable(String),

    #[error("probe command failed: {0}")]
    Failed(String),

    #[error("unparseable probe output: {0:?}")]
    Parse(String),

    #[error("no GPUs reported")]
    Empty,
}
