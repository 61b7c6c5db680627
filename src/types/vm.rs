use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Tier, VmStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmRecord {
    pub id: String,
    pub tier: Tier,
    pub round_id: String,
    pub ip: String,
    pub status: VmStatus,
    pub restart_attempts: u32,
    pub created_at: DateTime<Utc>,
}

impl VmRecord {
    pub fn new(id: String, tier: Tier, round_id: impl Into<String>, ip: String) -> Self {
        Self {
            id,
            tier,
            round_id: round_id.into(),
            ip,
            status: VmStatus::Provisioning,
            restart_attempts: 0,
            created_at: Utc::now(),
        }
    }

    /// Globally unique identifier for a fresh target: tier, owning round and
    /// a short random suffix.
    pub fn generate_id(tier: Tier, round_id: &str) -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        format!("{}-{}-{}", tier.as_str(), round_id, &suffix[..8])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub vm_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a probe pass. Probe failures are ordinary data consumed by the
/// recovery machinery, never errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    pub healthy: bool,
    pub reason: Option<String>,
}

impl Health {
    pub fn healthy() -> Self {
        Self {
            healthy: true,
            reason: None,
        }
    }

    pub fn unhealthy(reason: impl Into<String>) -> Self {
        Self {
            healthy: false,
            reason: Some(reason.into()),
        }
    }
}
