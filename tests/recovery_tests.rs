//! Scenario tests for the recovery path: bounded restore retries, terminal
//! escalation with a single alert, restore timeouts, and the read-only
//! treatment of targets that already escalated.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use rangekeeper::engine::fleet::FleetManager;
use rangekeeper::engine::recovery::FailureHandler;
use rangekeeper::engine::snapshot::SnapshotManager;
use rangekeeper::providers::{AlertSink, Hypervisor, NetworkProbe};
use rangekeeper::registry::FleetRegistry;
use rangekeeper::types::{Tier, VmRecord, VmStatus};
use rangekeeper::{Config, FleetError};

struct MockHypervisor {
    calls: Mutex<Vec<String>>,
    fail_ops: Mutex<HashSet<String>>,
    stall_ops: Mutex<HashSet<String>>,
}

impl MockHypervisor {
    fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_ops: Mutex::new(HashSet::new()),
            stall_ops: Mutex::new(HashSet::new()),
        }
    }

    fn fail_on(&self, op: &str) {
        self.fail_ops.lock().unwrap().insert(op.to_string());
    }

    fn clear_failures(&self) {
        self.fail_ops.lock().unwrap().clear();
    }

    fn stall_on(&self, op: &str) {
        self.stall_ops.lock().unwrap().insert(op.to_string());
    }

    fn count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    async fn record(&self, op: &str, detail: &str) -> Result<()> {
        self.calls.lock().unwrap().push(format!("{op}:{detail}"));
        if self.stall_ops.lock().unwrap().contains(op) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.fail_ops.lock().unwrap().contains(op) {
            bail!("{op} rigged to fail");
        }
        Ok(())
    }
}

#[async_trait]
impl Hypervisor for MockHypervisor {
    async fn clone_vm(&self, base_image: &str, new_id: &str) -> Result<()> {
        self.record("clone", &format!("{base_image}->{new_id}")).await
    }

    async fn start(&self, id: &str) -> Result<()> {
        self.record("start", id).await
    }

    async fn graceful_stop(&self, id: &str) -> Result<()> {
        self.record("graceful_stop", id).await
    }

    async fn force_stop(&self, id: &str) -> Result<()> {
        self.record("force_stop", id).await
    }

    async fn snapshot_create(&self, id: &str, name: &str) -> Result<()> {
        self.record("snapshot_create", &format!("{id}:{name}")).await
    }

    async fn snapshot_revert(&self, id: &str, name: &str) -> Result<()> {
        self.record("snapshot_revert", &format!("{id}:{name}")).await
    }

    async fn reserve_address(&self, id: &str, ip: &str) -> Result<()> {
        self.record("reserve", &format!("{id}:{ip}")).await
    }

    async fn assigned_address(&self, id: &str) -> Result<String> {
        self.record("assigned_address", id).await?;
        bail!("guest has not reported an address")
    }

    async fn destroy(&self, id: &str) -> Result<()> {
        self.record("destroy", id).await
    }

    async fn run_command(&self, id: &str, command: &str) -> Result<String> {
        self.record("exec", &format!("{id}:{command}")).await?;
        Ok(String::new())
    }
}

struct MockProbe {
    unreachable: Mutex<bool>,
}

impl MockProbe {
    fn new() -> Self {
        Self {
            unreachable: Mutex::new(false),
        }
    }

    fn set_unreachable(&self, value: bool) {
        *self.unreachable.lock().unwrap() = value;
    }
}

#[async_trait]
impl NetworkProbe for MockProbe {
    async fn reachable(&self, _addr: &str, _timeout: Duration) -> bool {
        !*self.unreachable.lock().unwrap()
    }

    async fn port_open(&self, _addr: &str, _port: u16, _timeout: Duration) -> bool {
        true
    }
}

struct RecordingAlertSink {
    alerts: Mutex<Vec<(String, String)>>,
}

impl RecordingAlertSink {
    fn new() -> Self {
        Self {
            alerts: Mutex::new(Vec::new()),
        }
    }

    fn count(&self) -> usize {
        self.alerts.lock().unwrap().len()
    }
}

#[async_trait]
impl AlertSink for RecordingAlertSink {
    async fn notify(&self, vm_id: &str, message: &str) {
        self.alerts
            .lock()
            .unwrap()
            .push((vm_id.to_string(), message.to_string()));
    }
}

/// Alert sink that never completes; escalation must not wait for it.
struct StallingAlertSink;

#[async_trait]
impl AlertSink for StallingAlertSink {
    async fn notify(&self, _vm_id: &str, _message: &str) {
        tokio::time::sleep(Duration::from_secs(3600)).await;
    }
}

fn test_config(max_restart_attempts: u32) -> Config {
    Config {
        monitor_interval: Duration::from_millis(50),
        probe_timeout: Duration::from_millis(100),
        boot_grace: Duration::ZERO,
        restore_timeout: Duration::from_secs(5),
        max_restart_attempts,
        ..Config::default()
    }
}

struct Harness {
    registry: FleetRegistry,
    handler: FailureHandler,
    hypervisor: Arc<MockHypervisor>,
    alerts: Arc<RecordingAlertSink>,
    vm_id: String,
}

/// Registry with one running tier1 record plus a handler wired to mocks,
/// bypassing the provisioning pipeline.
fn build_harness(max_restart_attempts: u32) -> Harness {
    let hypervisor = Arc::new(MockHypervisor::new());
    let probe = Arc::new(MockProbe::new());
    let alerts = Arc::new(RecordingAlertSink::new());
    let config = test_config(max_restart_attempts);

    let registry = FleetRegistry::new();
    let id = VmRecord::generate_id(Tier::Tier1, "round-1");
    let mut vm = VmRecord::new(id.clone(), Tier::Tier1, "round-1", "10.40.0.11".to_string());
    vm.status = VmStatus::Running;
    registry.insert(vm);

    let snapshots = Arc::new(SnapshotManager::new(
        hypervisor.clone(),
        probe,
        config.clone(),
    ));
    let handler = FailureHandler::new(
        registry.clone(),
        snapshots,
        alerts.clone(),
        config.max_restart_attempts,
    );

    Harness {
        registry,
        handler,
        hypervisor,
        alerts,
        vm_id: id,
    }
}

#[tokio::test]
async fn test_failed_restores_escalate_after_the_bound() {
    let h = build_harness(2);
    h.hypervisor.fail_on("snapshot_revert");

    h.handler.on_unhealthy(&h.vm_id, "unreachable").await;
    let vm = h.registry.get(&h.vm_id).unwrap();
    assert_eq!(vm.restart_attempts, 1);
    assert_eq!(vm.status, VmStatus::Degraded);

    h.handler.on_unhealthy(&h.vm_id, "unreachable").await;
    let vm = h.registry.get(&h.vm_id).unwrap();
    assert_eq!(vm.restart_attempts, 2);
    assert_eq!(vm.status, VmStatus::Degraded);

    h.handler.on_unhealthy(&h.vm_id, "unreachable").await;
    let vm = h.registry.get(&h.vm_id).unwrap();
    assert_eq!(vm.restart_attempts, 3);
    assert_eq!(vm.status, VmStatus::Unavailable);

    // restores were attempted only while under the bound
    assert_eq!(h.hypervisor.count("snapshot_revert:"), 2);

    // exactly one alert, emitted on the escalating invocation
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.alerts.count(), 1);
}

#[tokio::test]
async fn test_terminal_vm_is_reported_but_never_recovered() {
    let h = build_harness(2);
    h.hypervisor.fail_on("snapshot_revert");

    for _ in 0..3 {
        h.handler.on_unhealthy(&h.vm_id, "unreachable").await;
    }
    assert_eq!(
        h.registry.get(&h.vm_id).unwrap().status,
        VmStatus::Unavailable
    );

    // further unhealthy ticks change nothing and never re-alert
    h.handler.on_unhealthy(&h.vm_id, "unreachable").await;
    h.handler.on_unhealthy(&h.vm_id, "unreachable").await;

    let vm = h.registry.get(&h.vm_id).unwrap();
    assert_eq!(vm.restart_attempts, 3);
    assert_eq!(h.hypervisor.count("snapshot_revert:"), 2);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.alerts.count(), 1);
}

#[tokio::test]
async fn test_successful_restore_resets_the_counter() {
    let h = build_harness(3);

    h.handler.on_unhealthy(&h.vm_id, "services down: http").await;

    let vm = h.registry.get(&h.vm_id).unwrap();
    assert_eq!(vm.status, VmStatus::Running);
    assert_eq!(vm.restart_attempts, 0);

    // full restore sequence ran against the baseline snapshot
    assert_eq!(h.hypervisor.count("graceful_stop:"), 1);
    assert!(h
        .hypervisor
        .calls
        .lock()
        .unwrap()
        .iter()
        .any(|c| c.starts_with("snapshot_revert:") && c.ends_with(":baseline")));
    assert_eq!(h.hypervisor.count("start:"), 1);
    assert_eq!(h.alerts.count(), 0);
}

#[tokio::test]
async fn test_recovery_after_an_intermittent_failure() {
    let h = build_harness(3);
    h.hypervisor.fail_on("snapshot_revert");

    h.handler.on_unhealthy(&h.vm_id, "unreachable").await;
    let vm = h.registry.get(&h.vm_id).unwrap();
    assert_eq!(vm.status, VmStatus::Degraded);
    assert_eq!(vm.restart_attempts, 1);

    h.hypervisor.clear_failures();
    h.handler.on_unhealthy(&h.vm_id, "unreachable").await;

    let vm = h.registry.get(&h.vm_id).unwrap();
    assert_eq!(vm.status, VmStatus::Running);
    assert_eq!(vm.restart_attempts, 0);
}

#[tokio::test]
async fn test_stuck_restore_times_out_and_stays_degraded() {
    let h = build_harness(3);
    h.hypervisor.stall_on("snapshot_revert");

    // tighten the deadline so the test is quick
    let config = Config {
        restore_timeout: Duration::from_millis(100),
        ..test_config(3)
    };
    let snapshots = SnapshotManager::new(h.hypervisor.clone(), Arc::new(MockProbe::new()), config);

    let vm = h.registry.get(&h.vm_id).unwrap();
    let err = snapshots.restore(&vm, "baseline").await.unwrap_err();
    match err {
        FleetError::Restore { reason, .. } => assert!(reason.contains("timed out")),
        other => panic!("expected Restore error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_escalation_does_not_wait_for_alert_delivery() {
    let hypervisor = Arc::new(MockHypervisor::new());
    let probe = Arc::new(MockProbe::new());
    let config = test_config(0);

    let registry = FleetRegistry::new();
    let id = VmRecord::generate_id(Tier::Tier1, "round-1");
    let mut vm = VmRecord::new(id.clone(), Tier::Tier1, "round-1", "10.40.0.11".to_string());
    vm.status = VmStatus::Running;
    registry.insert(vm);

    let snapshots = Arc::new(SnapshotManager::new(hypervisor, probe, config));
    let handler = FailureHandler::new(registry.clone(), snapshots, Arc::new(StallingAlertSink), 0);

    // with a zero bound the first unhealthy tick escalates; the stalled
    // sink must not hold the handler up
    tokio::time::timeout(
        Duration::from_millis(500),
        handler.on_unhealthy(&id, "unreachable"),
    )
    .await
    .expect("handler blocked on alert delivery");

    assert_eq!(registry.get(&id).unwrap().status, VmStatus::Unavailable);
}

#[tokio::test]
async fn test_monitor_loop_drives_escalation_end_to_end() {
    let hypervisor = Arc::new(MockHypervisor::new());
    let probe = Arc::new(MockProbe::new());
    let alerts = Arc::new(RecordingAlertSink::new());
    let fleet = FleetManager::new(
        hypervisor.clone(),
        probe.clone(),
        alerts.clone(),
        test_config(2),
    );

    let vm = fleet.provision(Tier::Tier1, "round-1").await.unwrap();

    // every restore will fail from here on, and the target goes dark
    hypervisor.fail_on("snapshot_revert");
    probe.set_unreachable(true);

    tokio::time::sleep(Duration::from_millis(700)).await;

    let vm = fleet.get_vm(&vm.id).unwrap();
    assert_eq!(vm.status, VmStatus::Unavailable);
    assert_eq!(vm.restart_attempts, 3);
    assert_eq!(alerts.count(), 1);
}
