use std::sync::Arc;

use crate::engine::snapshot::SnapshotManager;
use crate::lifecycle::{RecoveryAction, RecoveryEvent, RecoveryStateMachine};
use crate::providers::AlertSink;
use crate::registry::FleetRegistry;
use crate::types::BASELINE_SNAPSHOT;

/// Interprets unhealthy probe results: bounded snapshot-based recovery,
/// then terminal escalation with a single operator alert.
pub struct FailureHandler {
    registry: FleetRegistry,
    snapshots: Arc<SnapshotManager>,
    alerts: Arc<dyn AlertSink>,
    max_attempts: u32,
}

impl FailureHandler {
    pub fn new(
        registry: FleetRegistry,
        snapshots: Arc<SnapshotManager>,
        alerts: Arc<dyn AlertSink>,
        max_attempts: u32,
    ) -> Self {
        Self {
            registry,
            snapshots,
            alerts,
            max_attempts,
        }
    }

    /// Invoked exactly once per unhealthy tick for a VM. Restore errors are
    /// absorbed here: the record stays degraded and the next unhealthy tick
    /// counts toward the same bound.
    pub async fn on_unhealthy(&self, vm_id: &str, reason: &str) {
        let mut action = RecoveryAction::None;
        let updated = self.registry.update(vm_id, |vm| {
            action = RecoveryStateMachine::transition(vm, RecoveryEvent::UnhealthyTick, self.max_attempts);
        });
        let Some(vm) = updated else {
            return;
        };

        match action {
            RecoveryAction::None => {}

            RecoveryAction::Escalate => {
                log::error!(
                    "{vm_id} unavailable after {} unhealthy checks: {reason}",
                    vm.restart_attempts
                );
                let alerts = Arc::clone(&self.alerts);
                let id = vm_id.to_string();
                let message =
                    format!("recovery attempts exhausted, target unavailable ({reason})");
                // Fire-and-forget: alert delivery never blocks the loop.
                tokio::spawn(async move {
                    alerts.notify(&id, &message).await;
                });
            }

            RecoveryAction::AttemptRestore { attempt } => {
                log::warn!(
                    "{vm_id} unhealthy ({reason}); restore attempt {attempt}/{}",
                    self.max_attempts
                );
                let outcome = match self.snapshots.restore(&vm, BASELINE_SNAPSHOT).await {
                    Ok(()) => RecoveryEvent::RestoreSucceeded,
                    Err(e) => {
                        log::warn!("restore attempt {attempt} for {vm_id} failed: {e}");
                        RecoveryEvent::RestoreFailed
                    }
                };
                self.registry.update(vm_id, |vm| {
                    RecoveryStateMachine::transition(vm, outcome, self.max_attempts);
                });
            }
        }
    }
}
