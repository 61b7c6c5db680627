use std::sync::Arc;

use crate::allocator::IpAllocator;
use crate::config::Config;
use crate::engine::monitor::probe_vm;
use crate::engine::snapshot::SnapshotManager;
use crate::error::{FleetError, Result};
use crate::providers::{Hypervisor, NetworkProbe};
use crate::types::{Tier, VmRecord, VmStatus, BASELINE_SNAPSHOT};

/// Builds running, verified targets: clone, configure, address, boot,
/// verify, baseline-snapshot, strictly in that order.
pub struct Provisioner {
    hypervisor: Arc<dyn Hypervisor>,
    allocator: Arc<IpAllocator>,
    probe: Arc<dyn NetworkProbe>,
    snapshots: Arc<SnapshotManager>,
    config: Config,
}

impl Provisioner {
    pub fn new(
        hypervisor: Arc<dyn Hypervisor>,
        allocator: Arc<IpAllocator>,
        probe: Arc<dyn NetworkProbe>,
        snapshots: Arc<SnapshotManager>,
        config: Config,
    ) -> Self {
        Self {
            hypervisor,
            allocator,
            probe,
            snapshots,
            config,
        }
    }

    /// Any step failing aborts the rest, rolls the partial instance back and
    /// surfaces the original error; nothing is ever left half-registered.
    pub async fn provision(&self, tier: Tier, round_id: &str) -> Result<VmRecord> {
        let vm_id = VmRecord::generate_id(tier, round_id);
        log::info!("provisioning {vm_id} for round {round_id}");

        match self.run_pipeline(&vm_id, tier, round_id).await {
            Ok(vm) => Ok(vm),
            Err(e) => {
                self.rollback(&vm_id).await;
                Err(e)
            }
        }
    }

    async fn run_pipeline(&self, vm_id: &str, tier: Tier, round_id: &str) -> Result<VmRecord> {
        let spec = tier.spec();
        let err = |reason: String| FleetError::provision(vm_id, reason);

        self.hypervisor
            .clone_vm(&spec.base_image, vm_id)
            .await
            .map_err(|e| err(format!("clone from {}: {e:#}", spec.base_image)))?;

        for command in &spec.setup_commands {
            self.hypervisor
                .run_command(vm_id, command)
                .await
                .map_err(|e| err(format!("setup command '{command}': {e:#}")))?;
        }

        let ip = self.allocator.allocate(tier)?;
        self.hypervisor
            .reserve_address(vm_id, &ip)
            .await
            .map_err(|e| err(format!("address reservation for {ip}: {e:#}")))?;

        self.hypervisor
            .start(vm_id)
            .await
            .map_err(|e| err(format!("start: {e:#}")))?;
        tokio::time::sleep(self.config.boot_grace).await;

        if let Ok(reported) = self.hypervisor.assigned_address(vm_id).await {
            if reported != ip {
                log::warn!("{vm_id} reports address {reported}, expected {ip}");
            }
        }

        let health = probe_vm(
            self.probe.as_ref(),
            &ip,
            &spec.services,
            self.config.probe_timeout,
        )
        .await;
        if !health.healthy {
            return Err(err(format!(
                "service verification failed: {}",
                health.reason.unwrap_or_default()
            )));
        }

        self.snapshots
            .create(vm_id, BASELINE_SNAPSHOT)
            .await
            .map_err(|e| err(format!("baseline snapshot: {e}")))?;

        let mut vm = VmRecord::new(vm_id.to_string(), tier, round_id, ip);
        vm.status = VmStatus::Running;
        Ok(vm)
    }

    /// Best-effort teardown of a partially created instance. Failures here
    /// are logged only; the pipeline error is what the caller sees.
    async fn rollback(&self, vm_id: &str) {
        log::warn!("rolling back partially provisioned {vm_id}");
        if let Err(e) = self.hypervisor.force_stop(vm_id).await {
            log::warn!("rollback stop of {vm_id} failed: {e:#}");
        }
        if let Err(e) = self.hypervisor.destroy(vm_id).await {
            log::warn!("rollback destroy of {vm_id} failed: {e:#}");
        }
    }
}
