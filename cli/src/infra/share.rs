//! User-space NFS adapter: implements `ShareDriver` with `unfsd`.
//!
//! The server runs on the host and exports `share.root` to the VM. Its pid
//! is tracked in `share.pid_file`; the mount is performed inside the VM over
//! `ssh`.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::application::ports::{CommandRunner, ShareDriver};
use crate::domain::config::{ShareConfig, VmConfig};
use crate::infra::command_runner::ensure_success;

/// Infrastructure adapter for the shared filesystem.
pub struct UnfsdShare<R: CommandRunner> {
    runner: R,
    share: ShareConfig,
    vm: VmConfig,
}

impl<R: CommandRunner> UnfsdShare<R> {
    pub fn new(runner: R, share: ShareConfig, vm: VmConfig) -> Self {
        Self { runner, share, vm }
    }

    fn recorded_pid(&self) -> Result<Option<u32>> {
        let path = Path::new(&self.share.pid_file);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        Ok(content.trim().parse().ok())
    }

    async fn is_alive(&self, pid: u32) -> Result<bool> {
        let pid = pid.to_string();
        let output = self.runner.run("kill", &["-0", &pid]).await.context("kill -0")?;
        Ok(output.status.success())
    }

    fn write_exports(&self) -> Result<()> {
        let path = Path::new(&self.share.exports_file);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("cannot create {}", parent.display()))?;
        }
        std::fs::write(path, exports_line(&self.share.root, &self.vm.ip))
            .with_context(|| format!("cannot write {}", path.display()))
    }
}

/// Exports file content granting the VM access to `root`.
#[must_use]
pub fn exports_line(root: &str, vm_ip: &str) -> String {
    format!("\"{root}\" {vm_ip}(rw,no_root_squash,insecure)\n")
}

/// Host address as seen from a host-only network VM (`x.y.z.1`).
#[must_use]
pub fn host_ip_for(vm_ip: &str) -> String {
    match vm_ip.rsplit_once('.') {
        Some((prefix, _)) => format!("{prefix}.1"),
        None => vm_ip.to_string(),
    }
}

impl<R: CommandRunner> ShareDriver for UnfsdShare<R> {
    async fn start(&self) -> Result<()> {
        if let Some(pid) = self.recorded_pid()?
            && self.is_alive(pid).await?
        {
            debug!(pid, "unfsd already running");
            return Ok(());
        }
        self.write_exports()?;
        if let Some(parent) = Path::new(&self.share.pid_file).parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("cannot create {}", parent.display()))?;
        }
        let port = self.share.port.to_string();
        let output = self
            .runner
            .run(
                &self.share.binary,
                &[
                    "-e",
                    &self.share.exports_file,
                    "-i",
                    &self.share.pid_file,
                    "-n",
                    &port,
                    "-m",
                    &port,
                    "-p",
                    "-t",
                ],
            )
            .await
            .with_context(|| format!("starting {}", self.share.binary))?;
        ensure_success(&self.share.binary, output)?;
        info!(port = self.share.port, root = %self.share.root, "shared filesystem started");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let Some(pid) = self.recorded_pid()? else {
            debug!("unfsd not running");
            return Ok(());
        };
        if self.is_alive(pid).await? {
            let pid_arg = pid.to_string();
            let output = self.runner.run("kill", &[&pid_arg]).await.context("kill unfsd")?;
            ensure_success("kill", output)?;
            info!(pid, "shared filesystem stopped");
        }
        std::fs::remove_file(&self.share.pid_file)
            .with_context(|| format!("cannot remove {}", self.share.pid_file))?;
        Ok(())
    }

    async fn mount(&self, vm: &str) -> Result<()> {
        let target = format!("{}@{}", self.vm.ssh_user, self.vm.ip);
        let source = format!("{}:{}", host_ip_for(&self.vm.ip), self.share.root);
        let options = format!(
            "port={port},mountport={port},nolock,tcp",
            port = self.share.port
        );
        let mkdir = format!("sudo mkdir -p {}", self.share.mount_point);
        let mount = format!(
            "{mkdir} && sudo mount -t nfs -o {options} '{source}' {}",
            self.share.mount_point
        );
        let output = self
            .runner
            .run(
                "ssh",
                &[
                    "-o",
                    "StrictHostKeyChecking=no",
                    "-o",
                    "UserKnownHostsFile=/dev/null",
                    &target,
                    &mount,
                ],
            )
            .await
            .context("ssh mount")?;
        ensure_success("ssh", output)?;
        info!(vm, mount_point = %self.share.mount_point, "shared filesystem mounted");
        Ok(())
    }
}
