use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::config::Config;
use crate::engine::recovery::FailureHandler;
use crate::providers::NetworkProbe;
use crate::registry::FleetRegistry;
use crate::types::{Health, ServiceSpec};

/// One probe pass: reachability first, then every configured service port.
/// The reason names the failing service(s).
pub async fn probe_vm(
    probe: &dyn NetworkProbe,
    ip: &str,
    services: &[ServiceSpec],
    timeout: Duration,
) -> Health {
    if !probe.reachable(ip, timeout).await {
        return Health::unhealthy("unreachable");
    }

    let mut failed = Vec::new();
    for service in services {
        if !probe.port_open(ip, service.port, timeout).await {
            failed.push(service.name.clone());
        }
    }

    if failed.is_empty() {
        Health::healthy()
    } else {
        Health::unhealthy(format!("services down: {}", failed.join(", ")))
    }
}

/// Spawns and owns the per-VM probe loops. Loops are fixed-delay: a tick's
/// probes and failure handling finish before the next delay is armed, so a
/// VM's ticks never overlap.
pub struct HealthMonitor {
    registry: FleetRegistry,
    probe: Arc<dyn NetworkProbe>,
    handler: Arc<FailureHandler>,
    interval: Duration,
    probe_timeout: Duration,
}

impl HealthMonitor {
    pub fn new(
        registry: FleetRegistry,
        probe: Arc<dyn NetworkProbe>,
        handler: Arc<FailureHandler>,
        config: &Config,
    ) -> Self {
        Self {
            registry,
            probe,
            handler,
            interval: config.monitor_interval,
            probe_timeout: config.probe_timeout,
        }
    }

    /// Start the probe loop for one VM. The loop exits on its own once the
    /// record disappears from the registry; the returned handle lets the
    /// registry cancel it earlier.
    pub fn spawn(&self, vm_id: String) -> JoinHandle<()> {
        let registry = self.registry.clone();
        let probe = Arc::clone(&self.probe);
        let handler = Arc::clone(&self.handler);
        let interval = self.interval;
        let timeout = self.probe_timeout;

        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;

                let Some(vm) = registry.get(&vm_id) else {
                    break;
                };

                let services = vm.tier.spec().services;
                let health = probe_vm(probe.as_ref(), &vm.ip, &services, timeout).await;
                if health.healthy {
                    continue;
                }

                let reason = health.reason.unwrap_or_else(|| "unhealthy".to_string());
                // At most one handler invocation per tick, awaited so the
                // next tick cannot fire before recovery finishes.
                handler.on_unhealthy(&vm_id, &reason).await;
            }
        })
    }
}
