use std::sync::Arc;

use chrono::Utc;

use crate::config::Config;
use crate::engine::monitor::probe_vm;
use crate::error::{FleetError, Result};
use crate::providers::{Hypervisor, NetworkProbe};
use crate::types::{Snapshot, VmRecord};

pub struct SnapshotManager {
    hypervisor: Arc<dyn Hypervisor>,
    probe: Arc<dyn NetworkProbe>,
    config: Config,
}

impl SnapshotManager {
    pub fn new(
        hypervisor: Arc<dyn Hypervisor>,
        probe: Arc<dyn NetworkProbe>,
        config: Config,
    ) -> Self {
        Self {
            hypervisor,
            probe,
            config,
        }
    }

    /// Disk-only snapshot of the VM's current state.
    pub async fn create(&self, vm_id: &str, name: &str) -> Result<Snapshot> {
        self.hypervisor
            .snapshot_create(vm_id, name)
            .await
            .map_err(|e| FleetError::Snapshot {
                vm_id: vm_id.to_string(),
                name: name.to_string(),
                reason: format!("{e:#}"),
            })?;

        log::info!("snapshot '{name}' created for {vm_id}");
        Ok(Snapshot {
            vm_id: vm_id.to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
        })
    }

    /// Stop the VM (forced if the guest ignores the graceful request),
    /// revert to the named snapshot, boot it back up and re-verify every
    /// configured service. The registry is untouched; the caller owns the
    /// record transition.
    pub async fn restore(&self, vm: &VmRecord, name: &str) -> Result<()> {
        match tokio::time::timeout(self.config.restore_timeout, self.restore_inner(vm, name)).await
        {
            Ok(result) => result,
            Err(_) => Err(FleetError::restore(
                &vm.id,
                name,
                format!("timed out after {:?}", self.config.restore_timeout),
            )),
        }
    }

    async fn restore_inner(&self, vm: &VmRecord, name: &str) -> Result<()> {
        let err = |reason: String| FleetError::restore(&vm.id, name, reason);

        if let Err(e) = self.hypervisor.graceful_stop(&vm.id).await {
            log::warn!("graceful stop of {} failed ({e:#}), forcing poweroff", vm.id);
            self.hypervisor
                .force_stop(&vm.id)
                .await
                .map_err(|e| err(format!("forced stop: {e:#}")))?;
        }

        self.hypervisor
            .snapshot_revert(&vm.id, name)
            .await
            .map_err(|e| err(format!("revert: {e:#}")))?;

        self.hypervisor
            .start(&vm.id)
            .await
            .map_err(|e| err(format!("restart: {e:#}")))?;
        tokio::time::sleep(self.config.boot_grace).await;

        let services = vm.tier.spec().services;
        let health = probe_vm(
            self.probe.as_ref(),
            &vm.ip,
            &services,
            self.config.probe_timeout,
        )
        .await;
        if !health.healthy {
            return Err(err(format!(
                "verification after revert failed: {}",
                health.reason.unwrap_or_default()
            )));
        }

        log::info!("{} restored to snapshot '{name}'", vm.id);
        Ok(())
    }
}
