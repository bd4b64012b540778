//! VirtualBox adapter: implements `VmDriver` over the `VBoxManage` CLI.

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::application::ports::{CommandRunner, VmDriver};
use crate::domain::agent::VmSpec;
use crate::infra::command_runner::ensure_success;

const VBOX: &str = "VBoxManage";
const HOST_ONLY_ADAPTER: &str = "vboxnet0";
const STORAGE_CONTROLLER: &str = "SATA";

/// Infrastructure adapter that routes VM calls through a `CommandRunner`.
pub struct VBoxManageDriver<R: CommandRunner> {
    runner: R,
}

impl<R: CommandRunner> VBoxManageDriver<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    async fn vbox(&self, args: &[&str]) -> Result<std::process::Output> {
        let output = self
            .runner
            .run(VBOX, args)
            .await
            .with_context(|| format!("{VBOX} {}", args.first().copied().unwrap_or_default()))?;
        Ok(ensure_success(VBOX, output)?)
    }

    /// Machine-readable VM info, or `None` when the VM is unknown. A host
    /// without VirtualBox installed has no VMs.
    async fn info(&self, name: &str) -> Result<Option<String>> {
        let output = match self
            .runner
            .run(VBOX, &["showvminfo", name, "--machinereadable"])
            .await
        {
            Ok(output) => output,
            Err(e) if is_missing_binary(&e) => {
                debug!("{VBOX} not installed");
                return Ok(None);
            }
            Err(e) => return Err(e.context("VBoxManage showvminfo")),
        };
        Ok(output
            .status
            .success()
            .then(|| String::from_utf8_lossy(&output.stdout).into_owned()))
    }
}

fn is_missing_binary(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<std::io::Error>())
        .any(|io| io.kind() == std::io::ErrorKind::NotFound)
}

/// Whether `showvminfo --machinereadable` output reports a running VM.
#[must_use]
pub fn is_running_state(info: &str) -> bool {
    info.lines()
        .any(|line| line.trim() == r#"VMState="running""#)
}

impl<R: CommandRunner> VmDriver for VBoxManageDriver<R> {
    async fn is_installed(&self, name: &str) -> Result<bool> {
        Ok(self.info(name).await?.is_some())
    }

    async fn is_running(&self, name: &str) -> Result<bool> {
        Ok(self.info(name).await?.is_some_and(|info| is_running_state(&info)))
    }

    async fn init(&self, spec: &VmSpec) -> Result<()> {
        let name = spec.name.as_str();
        self.vbox(&["createvm", "--name", name, "--ostype", "Linux26_64", "--register"])
            .await?;
        self.vbox(&[
            "modifyvm",
            name,
            "--memory",
            "2048",
            "--cpus",
            "2",
            "--nic1",
            "nat",
            "--nic2",
            "hostonly",
            "--hostonlyadapter2",
            HOST_ONLY_ADAPTER,
            "--boot1",
            "dvd",
        ])
        .await?;
        self.vbox(&["storagectl", name, "--name", STORAGE_CONTROLLER, "--add", "sata"])
            .await?;
        self.vbox(&[
            "storageattach",
            name,
            "--storagectl",
            STORAGE_CONTROLLER,
            "--port",
            "0",
            "--device",
            "0",
            "--type",
            "dvddrive",
            "--medium",
            &spec.boot_disk,
        ])
        .await?;
        self.vbox(&[
            "storageattach",
            name,
            "--storagectl",
            STORAGE_CONTROLLER,
            "--port",
            "1",
            "--device",
            "0",
            "--type",
            "hdd",
            "--medium",
            &spec.data_disk,
        ])
        .await?;
        self.vbox(&["guestproperty", "set", name, "/devrig/ip", &spec.ip])
            .await?;
        info!(vm = name, ip = %spec.ip, "vm created");
        Ok(())
    }

    async fn start(&self, name: &str) -> Result<()> {
        self.vbox(&["startvm", name, "--type", "headless"]).await?;
        Ok(())
    }

    async fn stop(&self, name: &str) -> Result<()> {
        self.vbox(&["controlvm", name, "acpipowerbutton"]).await?;
        Ok(())
    }
}
