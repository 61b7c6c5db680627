use crate::types::{VmRecord, VmStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryEvent {
    UnhealthyTick,
    RestoreSucceeded,
    RestoreFailed,
}

/// What the caller must carry out after feeding an event through the state
/// machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Attempt a baseline restore; `attempt` counts toward the bound.
    AttemptRestore { attempt: u32 },
    /// The bound is exhausted: the target is now terminal, alert once.
    Escalate,
    None,
}

/// Pure transition logic for the running/degraded/unavailable recovery
/// machine. Drives no timers and calls no services, so every path is
/// testable without a scheduler.
pub struct RecoveryStateMachine;

impl RecoveryStateMachine {
    pub fn transition(vm: &mut VmRecord, event: RecoveryEvent, max_attempts: u32) -> RecoveryAction {
        match (vm.status, event) {
            // Terminal: keep reporting, never recover automatically. Only a
            // successful restore issued by an operator leaves this state.
            (VmStatus::Unavailable, RecoveryEvent::UnhealthyTick)
            | (VmStatus::Unavailable, RecoveryEvent::RestoreFailed) => RecoveryAction::None,

            (VmStatus::Running | VmStatus::Degraded, RecoveryEvent::UnhealthyTick) => {
                vm.restart_attempts += 1;
                if vm.restart_attempts > max_attempts {
                    vm.status = VmStatus::Unavailable;
                    RecoveryAction::Escalate
                } else {
                    vm.status = VmStatus::Degraded;
                    RecoveryAction::AttemptRestore {
                        attempt: vm.restart_attempts,
                    }
                }
            }

            // Attempts only reset on a restore that actually succeeded.
            (_, RecoveryEvent::RestoreSucceeded) => {
                vm.status = VmStatus::Running;
                vm.restart_attempts = 0;
                RecoveryAction::None
            }

            (_, RecoveryEvent::RestoreFailed) => {
                vm.status = VmStatus::Degraded;
                RecoveryAction::None
            }

            (VmStatus::Provisioning, RecoveryEvent::UnhealthyTick) => RecoveryAction::None,
        }
    }
}
