pub mod tier;
pub mod vm;

pub use tier::{ServiceSpec, Tier, TierSpec};
pub use vm::{Health, Snapshot, VmRecord};

use serde::{Deserialize, Serialize};

/// Snapshot name reserved for the known-good state captured right after
/// provisioning; the default restore target.
pub const BASELINE_SNAPSHOT: &str = "baseline";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VmStatus {
    Provisioning, // pipeline still running, not yet registered
    Running,      // healthy, monitored
    Degraded,     // failed a probe, recovery attempts remaining
    Unavailable,  // recovery attempts exhausted, operator action required
}

impl VmStatus {
    pub fn as_str(&self) -> &str {
        match self {
            VmStatus::Provisioning => "provisioning",
            VmStatus::Running => "running",
            VmStatus::Degraded => "degraded",
            VmStatus::Unavailable => "unavailable",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, VmStatus::Unavailable)
    }
}
