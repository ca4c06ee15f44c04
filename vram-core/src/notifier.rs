//! Best-effort eviction notices.
//!
//! The registry commits an eviction before any notice is sent. A notice that
//! cannot be delivered is logged and dropped: no retry, no rollback.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoordinatorError, NotifyError};
use crate::types::{EvictedLease, EvictionReason};

/// Everything evicted from one collaborator by one committed operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvictionNotice {
    pub collaborator: String,
    pub callback: Option<String>,
    pub reason: EvictionReason,
    pub leases: Vec<EvictedLease>,
}

impl EvictionNotice {
    pub fn freed(&self) -> u64 {
        self.leases.iter().map(|l| l.amount).sum()
    }

    pub fn resources(&self) -> Vec<&str> {
        self.leases.iter().map(|l| l.resource.as_str()).collect()
    }
}

/// Delivers eviction notices to collaborators.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: &EvictionNotice) -> Result<(), NotifyError>;
}

/// Body of the release call sent to a collaborator.
#[derive(Debug, Serialize)]
struct ReleaseRequest<'a> {
    collaborator: &'a str,
    resources: Vec<&'a str>,
    reason: EvictionReason,
}

/// Optional acknowledgement body, e.g. `{"status": "success", "message": "..."}`.
#[derive(Debug, Default, Deserialize)]
struct ReleaseAck {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// POSTs eviction notices to each collaborator's callback address.
pub struct HttpNotifier {
    agent: ureq::Agent,
}

impl HttpNotifier {
    /// Every call is bounded by `timeout` end to end.
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout(timeout)
            .build();
        Self { agent }
    }
}

impl Notifier for HttpNotifier {
    fn notify(&self, notice: &EvictionNotice) -> Result<(), NotifyError> {
        let url = notice
            .callback
            .as_deref()
            .ok_or_else(|| NotifyError::NoCallback(notice.collaborator.clone()))?;

        let body = ReleaseRequest {
            collaborator: &notice.collaborator,
            resources: notice.resources(),
            reason: notice.reason,
        };

        match self.agent.post(url).send_json(&body) {
            Ok(response) => {
                // An empty or non-JSON body still counts as an acknowledgement
                let ack: ReleaseAck = response.into_json().unwrap_or_default();
                match ack.status.as_deref() {
                    None | Some("success") | Some("ok") => Ok(()),
                    Some(other) => Err(NotifyError::Declined(
                        ack.message.unwrap_or_else(|| other.to_string()),
                    )),
                }
            }
            Err(ureq::Error::Status(status, _)) => Err(NotifyError::Rejected { status }),
            Err(ureq::Error::Transport(t)) => Err(NotifyError::Transport(t.to_string())),
        }
    }
}

/// Send every notice once. Returns how many were acknowledged.
///
/// Collaborators without a callback are skipped.
pub fn dispatch(notifier: &dyn Notifier, notices: &[EvictionNotice]) -> usize {
    let mut delivered = 0;
    for notice in notices {
        if notice.callback.is_none() {
            tracing::debug!(
                collaborator = %notice.collaborator,
                "No callback registered, eviction notice skipped"
            );
            continue;
        }

        match notifier.notify(notice) {
            Ok(()) => {
                delivered += 1;
                tracing::info!(
                    collaborator = %notice.collaborator,
                    resources = ?notice.resources(),
                    reason = %notice.reason,
                    "Eviction notice delivered"
                );
            }
            Err(e) => {
                let err = CoordinatorError::NotificationFailed(e);
                tracing::warn!(
                    collaborator = %notice.collaborator,
                    resources = ?notice.resources(),
                    error = %err,
                    "Eviction committed but collaborator was not reached"
                );
            }
        }
    }
    delivered
}
