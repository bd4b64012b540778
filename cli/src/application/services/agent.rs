//! Application service: agent lifecycle (VM, shared filesystem, balancer).
//!
//! Imports only from `crate::domain` and `crate::application::ports`.
//! Bring-up runs share → VM → balancer; teardown runs the reverse.

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::application::ports::{BalancerDriver, LifecycleSink, NetworkProbe, ShareDriver, VmDriver};
use crate::domain::agent::{AgentEvent, VM_READY_ATTEMPTS, VM_READY_PORT, VmSpec, VmStatus};
use crate::domain::config::AgentConfig;
use crate::domain::error::AgentError;

/// Sequences the supporting infrastructure systems run on.
pub struct AgentLifecycle<'a, V, S, B, N> {
    config: &'a AgentConfig,
    vm: &'a V,
    share: &'a S,
    balancer: &'a B,
    probe: &'a N,
}

impl<'a, V, S, B, N> AgentLifecycle<'a, V, S, B, N>
where
    V: VmDriver,
    S: ShareDriver,
    B: BalancerDriver,
    N: NetworkProbe,
{
    pub fn new(config: &'a AgentConfig, vm: &'a V, share: &'a S, balancer: &'a B, probe: &'a N) -> Self {
        Self {
            config,
            vm,
            share,
            balancer,
            probe,
        }
    }

    /// Bring the agent up. Any failing step aborts the remaining ones.
    ///
    /// # Errors
    ///
    /// Returns the first failing step's error, including
    /// [`AgentError::VmDidNotStart`] when the VM never becomes reachable.
    pub async fn start(&self, sink: &impl LifecycleSink) -> Result<()> {
        if self.config.requires_vm {
            self.share.start().await.context("starting shared filesystem")?;
            self.install_vm(true, true, sink).await?;
        }
        self.balancer.start().await.context("starting balancer")?;
        info!("agent started");
        Ok(())
    }

    /// Tear the agent down: balancer, then VM, then shared filesystem.
    ///
    /// Every step runs whatever `requires_vm` says, so resources left over
    /// from a run with a different setting are still released.
    ///
    /// Fails fast unless `best_effort_teardown` is set, in which case every
    /// step runs and the failures are aggregated.
    ///
    /// # Errors
    ///
    /// Returns the first teardown failure, or [`AgentError::Teardown`]
    /// listing every failure in best-effort mode.
    pub async fn stop(&self) -> Result<()> {
        if !self.config.best_effort_teardown {
            self.balancer.stop().await.context("stopping balancer")?;
            self.stop_vm(None).await?;
            self.share.stop().await.context("stopping shared filesystem")?;
            info!("agent stopped");
            return Ok(());
        }

        let mut failures = Vec::new();
        if let Err(e) = self.balancer.stop().await {
            failures.push(format!("balancer: {e:#}"));
        }
        if let Err(e) = self.stop_vm(None).await {
            failures.push(format!("vm: {e:#}"));
        }
        if let Err(e) = self.share.stop().await {
            failures.push(format!("share: {e:#}"));
        }
        if failures.is_empty() {
            info!("agent stopped");
            return Ok(());
        }
        for failure in &failures {
            warn!(%failure, "teardown step failed");
        }
        Err(AgentError::Teardown(failures.join("\n")).into())
    }

    /// Ensure the VM exists and, when `start` is set, that it is running and
    /// reachable. Mounts the share afterwards when `mount` is set.
    ///
    /// # Errors
    ///
    /// Returns a driver error, or [`AgentError::VmDidNotStart`] when the
    /// readiness poll is exhausted.
    pub async fn install_vm(&self, start: bool, mount: bool, sink: &impl LifecycleSink) -> Result<()> {
        let spec = VmSpec::from(&self.config.vm);

        if !self.vm.is_installed(&spec.name).await? {
            info!(vm = %spec.name, ip = %spec.ip, "creating vm");
            self.vm.init(&spec).await.context("creating virtual machine")?;
        }

        if !start || self.vm.is_running(&spec.name).await? {
            return Ok(());
        }

        self.vm.start(&spec.name).await.context("starting virtual machine")?;
        sink.notify(AgentEvent::vm(VmStatus::Wait));
        let delay = Duration::from_millis(self.config.vm.wait_delay_ms);
        if !wait_service(self.probe, &spec.ip, VM_READY_PORT, VM_READY_ATTEMPTS, delay).await {
            return Err(AgentError::VmDidNotStart {
                vm: spec.name,
                ip: spec.ip,
                port: VM_READY_PORT,
                attempts: VM_READY_ATTEMPTS,
            }
            .into());
        }
        sink.notify(AgentEvent::vm(VmStatus::Initialized));

        if mount {
            self.share.mount(&spec.name).await.context("mounting shared filesystem")?;
        }
        Ok(())
    }

    /// Stop the VM if it is running.
    ///
    /// With `None` the driver is queried. An explicit value skips the stop
    /// unless `trust_explicit_running_state` is set, in which case the value
    /// is used as the running state.
    ///
    /// # Errors
    ///
    /// Returns a driver error.
    pub async fn stop_vm(&self, running: Option<bool>) -> Result<()> {
        let name = &self.config.vm.name;
        let running = match running {
            None => self.vm.is_running(name).await?,
            Some(value) if self.config.vm.trust_explicit_running_state => value,
            Some(_) => false,
        };
        if running {
            info!(vm = %name, "stopping vm");
            self.vm.stop(name).await.context("stopping virtual machine")?;
        } else {
            debug!(vm = %name, "vm not running, skipping stop");
        }
        Ok(())
    }
}

/// Poll `host:port` until it accepts connections, at most `attempts` times.
///
/// Probe errors count as failed attempts.
pub async fn wait_service(
    probe: &impl NetworkProbe,
    host: &str,
    port: u16,
    attempts: u32,
    delay: Duration,
) -> bool {
    for attempt in 1..=attempts {
        match probe.check_tcp_connectivity(host, port).await {
            Ok(true) => {
                debug!(host, port, attempt, "service reachable");
                return true;
            }
            Ok(false) => debug!(host, port, attempt, "service not reachable yet"),
            Err(e) => debug!(host, port, attempt, error = %e, "probe failed"),
        }
        if attempt < attempts && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
    false
}
