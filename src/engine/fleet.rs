use std::sync::Arc;

use futures::future::join_all;

use crate::allocator::IpAllocator;
use crate::config::Config;
use crate::engine::monitor::{probe_vm, HealthMonitor};
use crate::engine::provisioner::Provisioner;
use crate::engine::recovery::FailureHandler;
use crate::engine::snapshot::SnapshotManager;
use crate::error::{FleetError, Result};
use crate::lifecycle::{RecoveryEvent, RecoveryStateMachine};
use crate::providers::{AlertSink, Hypervisor, NetworkProbe};
use crate::registry::FleetRegistry;
use crate::types::{Health, Snapshot, Tier, VmRecord, BASELINE_SNAPSHOT};

/// Management surface of the fleet core. Owns the registry and wires the
/// provisioning pipeline, snapshot manager and per-VM health monitoring
/// together; the surrounding application only ever talks to this.
pub struct FleetManager {
    registry: FleetRegistry,
    provisioner: Provisioner,
    snapshots: Arc<SnapshotManager>,
    monitor: HealthMonitor,
    hypervisor: Arc<dyn Hypervisor>,
    probe: Arc<dyn NetworkProbe>,
    config: Config,
}

impl FleetManager {
    pub fn new(
        hypervisor: Arc<dyn Hypervisor>,
        probe: Arc<dyn NetworkProbe>,
        alerts: Arc<dyn AlertSink>,
        config: Config,
    ) -> Self {
        let registry = FleetRegistry::new();
        let allocator = Arc::new(IpAllocator::new(config.subnet.clone()));
        let snapshots = Arc::new(SnapshotManager::new(
            Arc::clone(&hypervisor),
            Arc::clone(&probe),
            config.clone(),
        ));
        let handler = Arc::new(FailureHandler::new(
            registry.clone(),
            Arc::clone(&snapshots),
            alerts,
            config.max_restart_attempts,
        ));
        let monitor = HealthMonitor::new(
            registry.clone(),
            Arc::clone(&probe),
            handler,
            &config,
        );
        let provisioner = Provisioner::new(
            Arc::clone(&hypervisor),
            allocator,
            Arc::clone(&probe),
            Arc::clone(&snapshots),
            config.clone(),
        );

        Self {
            registry,
            provisioner,
            snapshots,
            monitor,
            hypervisor,
            probe,
            config,
        }
    }

    /// Run the full pipeline and, on success, register the record and start
    /// its monitor loop.
    pub async fn provision(&self, tier: Tier, round_id: &str) -> Result<VmRecord> {
        let vm = self.provisioner.provision(tier, round_id).await?;
        self.registry.insert(vm.clone());
        self.registry
            .attach_monitor(&vm.id, self.monitor.spawn(vm.id.clone()));
        log::info!("{} running for round {round_id} at {}", vm.id, vm.ip);
        Ok(vm)
    }

    pub async fn create_snapshot(&self, vm_id: &str, name: &str) -> Result<Snapshot> {
        self.require(vm_id)?;
        self.snapshots.create(vm_id, name).await
    }

    /// Operator-driven restore; defaults to the baseline snapshot. A
    /// successful restore resets the record to running with zero attempts.
    pub async fn restore_snapshot(&self, vm_id: &str, name: Option<&str>) -> Result<()> {
        let vm = self.require(vm_id)?;
        let name = name.unwrap_or(BASELINE_SNAPSHOT);
        self.snapshots.restore(&vm, name).await?;
        self.registry.update(vm_id, |vm| {
            RecoveryStateMachine::transition(
                vm,
                RecoveryEvent::RestoreSucceeded,
                self.config.max_restart_attempts,
            );
        });
        Ok(())
    }

    /// Probe the target right now, independent of the monitor cadence.
    pub async fn get_health(&self, vm_id: &str) -> Result<Health> {
        let vm = self.require(vm_id)?;
        let services = vm.tier.spec().services;
        Ok(probe_vm(
            self.probe.as_ref(),
            &vm.ip,
            &services,
            self.config.probe_timeout,
        )
        .await)
    }

    pub fn get_vm(&self, vm_id: &str) -> Result<VmRecord> {
        self.require(vm_id)
    }

    pub fn list_by_round(&self, round_id: &str) -> Vec<VmRecord> {
        self.registry.list_by_round(round_id)
    }

    /// Cancel the monitor first, then drop the record, then best-effort
    /// hypervisor teardown (stop + delete storage).
    pub async fn delete_vm(&self, vm_id: &str) -> Result<()> {
        self.require(vm_id)?;
        self.registry.detach_monitor(vm_id);
        self.registry.remove(vm_id);

        if let Err(e) = self.hypervisor.force_stop(vm_id).await {
            log::warn!("stop of {vm_id} during teardown failed: {e:#}");
        }
        if let Err(e) = self.hypervisor.destroy(vm_id).await {
            log::warn!("destroy of {vm_id} during teardown failed: {e:#}");
        }
        log::info!("{vm_id} torn down");
        Ok(())
    }

    /// Tear down every VM of a round concurrently. Returns how many were
    /// removed.
    pub async fn delete_round(&self, round_id: &str) -> Result<usize> {
        let vms = self.registry.list_by_round(round_id);
        if vms.is_empty() {
            return Err(FleetError::RoundNotFound(round_id.to_string()));
        }

        let teardowns = vms.iter().map(|vm| self.delete_vm(&vm.id));
        let results = join_all(teardowns).await;
        Ok(results.into_iter().filter(|r| r.is_ok()).count())
    }

    fn require(&self, vm_id: &str) -> Result<VmRecord> {
        self.registry
            .get(vm_id)
            .ok_or_else(|| FleetError::VmNotFound(vm_id.to_string()))
    }
}
