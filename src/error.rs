use thiserror::Error;

#[derive(Debug, Error)]
pub enum FleetError {
    #[error("provisioning {vm_id} failed: {reason}")]
    Provision { vm_id: String, reason: String },

    #[error("restoring snapshot '{snapshot}' on {vm_id} failed: {reason}")]
    Restore {
        vm_id: String,
        snapshot: String,
        reason: String,
    },

    #[error("snapshot '{name}' on {vm_id} failed: {reason}")]
    Snapshot {
        vm_id: String,
        name: String,
        reason: String,
    },

    #[error("no vm registered with id '{0}'")]
    VmNotFound(String),

    #[error("no vms registered for round '{0}'")]
    RoundNotFound(String),

    #[error("address block for {tier} is exhausted")]
    AddressPoolExhausted { tier: String },
}

impl FleetError {
    pub fn provision(vm_id: impl Into<String>, reason: impl Into<String>) -> Self {
        FleetError::Provision {
            vm_id: vm_id.into(),
            reason: reason.into(),
        }
    }

    pub fn restore(
        vm_id: impl Into<String>,
        snapshot: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        FleetError::Restore {
            vm_id: vm_id.into(),
            snapshot: snapshot.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FleetError>;
