use serde::{Deserialize, Serialize};

use vram_core::types::{EvictedLease, Priority, ResourceSpec};

// ─── Validation Constants ───────────────────────────────────────────────────

const VALID_PRIORITIES: &[&str] = &["low", "medium", "high"];

const VALID_CALLBACK_SCHEMES: &[&str] = &["http://", "https://"];

// ─── Validation Helpers ─────────────────────────────────────────────────────

/// Unset priority stays unset; the registry keeps or defaults it.
pub fn validate_priority(priority: Option<&str>) -> Result<Option<Priority>, String> {
    match priority {
        None => Ok(None),
        Some(p) => Priority::from_name(p).map(Some).ok_or_else(|| {
            format!(
                "Invalid priority '{}'. Must be one of: {}",
                p,
                VALID_PRIORITIES.join(", ")
            )
        }),
    }
}

pub fn validate_callback(callback: &str) -> Result<(), String> {
    if VALID_CALLBACK_SCHEMES
        .iter()
        .any(|scheme| callback.to_lowercase().starts_with(scheme))
    {
        Ok(())
    } else {
        Err(format!(
            "Invalid callback '{}'. Must start with one of: {}",
            callback,
            VALID_CALLBACK_SCHEMES.join(", ")
        ))
    }
}

// ─── Request Types ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub callback: String,
    #[serde(default)]
    pub leases: Vec<ResourceSpec>,
    pub priority: Option<String>,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<Option<Priority>, String> {
        if self.name.is_empty() {
            return Err("name is required".to_string());
        }
        validate_callback(&self.callback)?;
        let mut total = 0u64;
        for (i, lease) in self.leases.iter().enumerate() {
            if lease.resource.is_empty() {
                return Err(format!("leases[{}]: resource is required", i));
            }
            total = total
                .checked_add(lease.amount)
                .ok_or_else(|| format!("leases[{}]: total amount overflows", i))?;
        }
        validate_priority(self.priority.as_deref())
    }
}

#[derive(Deserialize)]
pub struct AllocateRequest {
    pub name: String,
    pub amount: u64,
    pub resource: Option<String>,
    pub priority: Option<String>,
}

impl AllocateRequest {
    pub fn validate(&self) -> Result<Option<Priority>, String> {
        if self.name.is_empty() {
            return Err("name is required".to_string());
        }
        if self.amount == 0 {
            return Err("amount must be greater than 0".to_string());
        }
        if matches!(self.resource.as_deref(), Some("")) {
            return Err("resource must not be empty".to_string());
        }
        validate_priority(self.priority.as_deref())
    }
}

#[derive(Deserialize)]
pub struct TouchRequest {
    pub name: String,
    pub resource: String,
}

// ─── Response Types ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

#[derive(Serialize)]
pub struct AdmissionResponse {
    pub name: String,
    pub granted: u64,
    pub freed: u64,
    pub evicted: Vec<EvictedLease>,
    pub used: u64,
    pub available: u64,
}

#[derive(Serialize)]
pub struct ReleaseResponse {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    pub freed: u64,
}

#[derive(Serialize)]
pub struct TouchResponse {
    pub name: String,
    pub resource: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub loaded_leases: usize,
    pub used: u64,
    pub total: u64,
    pub version: String,
}
