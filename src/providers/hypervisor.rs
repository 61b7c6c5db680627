use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use tokio::process::Command;

/// Control surface of the virtualization backend. Production wires this to
/// the VBoxManage CLI; tests substitute a mock.
#[async_trait]
pub trait Hypervisor: Send + Sync {
    async fn clone_vm(&self, base_image: &str, new_id: &str) -> Result<()>;
    async fn start(&self, id: &str) -> Result<()>;
    /// Resolves once the guest has actually powered off.
    async fn graceful_stop(&self, id: &str) -> Result<()>;
    async fn force_stop(&self, id: &str) -> Result<()>;
    async fn snapshot_create(&self, id: &str, name: &str) -> Result<()>;
    async fn snapshot_revert(&self, id: &str, name: &str) -> Result<()>;
    /// Register a static address reservation for the guest.
    async fn reserve_address(&self, id: &str, ip: &str) -> Result<()>;
    /// Address the guest actually reports on its first interface.
    async fn assigned_address(&self, id: &str) -> Result<String>;
    /// Unregister the guest and delete its storage.
    async fn destroy(&self, id: &str) -> Result<()>;
    /// Execute a shell command inside the guest, returning stdout.
    async fn run_command(&self, id: &str, command: &str) -> Result<String>;
}

pub struct VBoxHypervisor {
    binary: String,
    network: String,
    guest_user: String,
    guest_password: String,
}

const STOP_POLL_INTERVAL: Duration = Duration::from_millis(500);
const STOP_DEADLINE: Duration = Duration::from_secs(15);

impl VBoxHypervisor {
    pub fn new(binary: Option<String>) -> Self {
        Self {
            binary: binary.unwrap_or_else(|| "VBoxManage".to_string()),
            network: "rangenet".to_string(),
            guest_user: "range".to_string(),
            guest_password: "range".to_string(),
        }
    }

    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network = network.into();
        self
    }

    pub fn with_guest_credentials(
        mut self,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.guest_user = user.into();
        self.guest_password = password.into();
        self
    }

    async fn vbox(&self, args: &[&str]) -> Result<String> {
        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .await
            .with_context(|| format!("failed to spawn {}", self.binary))?;

        if !output.status.success() {
            bail!(
                "{} {} failed: {}",
                self.binary,
                args.first().unwrap_or(&""),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn vm_state(&self, id: &str) -> Result<String> {
        let info = self.vbox(&["showvminfo", id, "--machinereadable"]).await?;
        info.lines()
            .find_map(|line| line.strip_prefix("VMState="))
            .map(|v| v.trim_matches('"').to_string())
            .ok_or_else(|| anyhow!("no VMState in showvminfo output for {id}"))
    }
}

#[async_trait]
impl Hypervisor for VBoxHypervisor {
    async fn clone_vm(&self, base_image: &str, new_id: &str) -> Result<()> {
        self.vbox(&[
            "clonevm", base_image, "--name", new_id, "--register", "--options", "link",
        ])
        .await?;
        Ok(())
    }

    async fn start(&self, id: &str) -> Result<()> {
        self.vbox(&["startvm", id, "--type", "headless"]).await?;
        Ok(())
    }

    async fn graceful_stop(&self, id: &str) -> Result<()> {
        self.vbox(&["controlvm", id, "acpipowerbutton"]).await?;

        let deadline = tokio::time::Instant::now() + STOP_DEADLINE;
        loop {
            if self.vm_state(id).await? == "poweroff" {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                bail!("{id} did not power off within {STOP_DEADLINE:?}");
            }
            tokio::time::sleep(STOP_POLL_INTERVAL).await;
        }
    }

    async fn force_stop(&self, id: &str) -> Result<()> {
        self.vbox(&["controlvm", id, "poweroff"]).await?;
        Ok(())
    }

    async fn snapshot_create(&self, id: &str, name: &str) -> Result<()> {
        self.vbox(&["snapshot", id, "take", name]).await?;
        Ok(())
    }

    async fn snapshot_revert(&self, id: &str, name: &str) -> Result<()> {
        self.vbox(&["snapshot", id, "restore", name]).await?;
        Ok(())
    }

    async fn reserve_address(&self, id: &str, ip: &str) -> Result<()> {
        self.vbox(&[
            "dhcpserver",
            "modify",
            "--network",
            &self.network,
            "--vm",
            id,
            "--nic",
            "1",
            "--fixed-address",
            ip,
        ])
        .await?;
        Ok(())
    }

    async fn assigned_address(&self, id: &str) -> Result<String> {
        let output = self
            .vbox(&[
                "guestproperty",
                "get",
                id,
                "/VirtualBox/GuestInfo/Net/0/V4/IP",
            ])
            .await?;
        output
            .trim()
            .strip_prefix("Value: ")
            .map(|v| v.to_string())
            .ok_or_else(|| anyhow!("guest {id} has not reported an address"))
    }

    async fn destroy(&self, id: &str) -> Result<()> {
        self.vbox(&["unregistervm", id, "--delete"]).await?;
        Ok(())
    }

    async fn run_command(&self, id: &str, command: &str) -> Result<String> {
        self.vbox(&[
            "guestcontrol",
            id,
            "run",
            "--username",
            &self.guest_user,
            "--password",
            &self.guest_password,
            "--exe",
            "/bin/sh",
            "--",
            "sh",
            "-c",
            command,
        ])
        .await
    }
}
