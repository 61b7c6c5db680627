use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// First three octets of the shared target subnet, e.g. "10.40.0".
    pub subnet: String,
    pub monitor_interval: Duration,
    pub probe_timeout: Duration,
    pub boot_grace: Duration,
    pub restore_timeout: Duration,
    pub max_restart_attempts: u32,
    pub alert_webhook_url: Option<String>,
    pub vboxmanage_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            subnet: "10.40.0".to_string(),
            monitor_interval: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(2),
            boot_grace: Duration::from_secs(20),
            restore_timeout: Duration::from_secs(120),
            max_restart_attempts: 3,
            alert_webhook_url: None,
            vboxmanage_path: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Config::default();
        Self {
            subnet: std::env::var("RANGE_SUBNET").unwrap_or(defaults.subnet),
            monitor_interval: env_secs("RANGE_MONITOR_INTERVAL_SECS", defaults.monitor_interval),
            probe_timeout: env_secs("RANGE_PROBE_TIMEOUT_SECS", defaults.probe_timeout),
            boot_grace: env_secs("RANGE_BOOT_GRACE_SECS", defaults.boot_grace),
            restore_timeout: env_secs("RANGE_RESTORE_TIMEOUT_SECS", defaults.restore_timeout),
            max_restart_attempts: std::env::var("RANGE_MAX_RESTART_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_restart_attempts),
            alert_webhook_url: std::env::var("RANGE_ALERT_WEBHOOK").ok(),
            vboxmanage_path: std::env::var("RANGE_VBOXMANAGE").ok(),
        }
    }
}

fn env_secs(name: &str, fallback: Duration) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(fallback)
}
