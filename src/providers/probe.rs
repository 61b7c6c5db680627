use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::process::Command;

/// Network reachability checks. Outcomes are booleans, not errors: an
/// unreachable host or closed port is an ordinary result.
#[async_trait]
pub trait NetworkProbe: Send + Sync {
    async fn reachable(&self, addr: &str, timeout: Duration) -> bool;
    async fn port_open(&self, addr: &str, port: u16, timeout: Duration) -> bool;
}

/// Probes with the host network stack: a single ICMP ping for reachability
/// and a plain TCP connect per service port.
pub struct SystemProbe;

#[async_trait]
impl NetworkProbe for SystemProbe {
    async fn reachable(&self, addr: &str, timeout: Duration) -> bool {
        let wait_secs = timeout.as_secs().max(1).to_string();
        let ping = Command::new("ping")
            .args(["-c", "1", "-W", &wait_secs, addr])
            .output();

        match tokio::time::timeout(timeout + Duration::from_secs(1), ping).await {
            Ok(Ok(output)) => output.status.success(),
            _ => false,
        }
    }

    async fn port_open(&self, addr: &str, port: u16, timeout: Duration) -> bool {
        matches!(
            tokio::time::timeout(timeout, TcpStream::connect((addr, port))).await,
            Ok(Ok(_))
        )
    }
}
