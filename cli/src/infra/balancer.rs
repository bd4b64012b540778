//! Load balancer adapter: implements `BalancerDriver` as a proxy container.

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::application::ports::{BalancerDriver, CommandRunner};
use crate::domain::config::BalancerConfig;
use crate::infra::command_runner::ensure_success;
use crate::infra::docker::NETWORK;

/// Name of the balancer container.
pub const BALANCER_CONTAINER: &str = "devrig-balancer";

/// Runs the balancer as a docker container on the shared network.
pub struct DockerBalancer<R: CommandRunner> {
    runner: R,
    config: BalancerConfig,
}

impl<R: CommandRunner> DockerBalancer<R> {
    pub fn new(runner: R, config: BalancerConfig) -> Self {
        Self { runner, config }
    }

    async fn docker(&self, args: &[&str]) -> Result<std::process::Output> {
        let output = self
            .runner
            .run("docker", args)
            .await
            .with_context(|| format!("docker {}", args.first().copied().unwrap_or_default()))?;
        Ok(ensure_success("docker", output)?)
    }

    /// `true`/`false` for an existing container, `None` when absent.
    async fn container_running(&self) -> Result<Option<bool>> {
        let output = self
            .runner
            .run(
                "docker",
                &["inspect", "-f", "{{.State.Running}}", BALANCER_CONTAINER],
            )
            .await
            .context("docker inspect")?;
        if !output.status.success() {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&output.stdout).trim() == "true"))
    }

    async fn ensure_network(&self) -> Result<()> {
        let output = self
            .runner
            .run("docker", &["network", "inspect", NETWORK])
            .await
            .context("docker network inspect")?;
        if !output.status.success() {
            self.docker(&["network", "create", NETWORK]).await?;
            info!(network = NETWORK, "docker network created");
        }
        Ok(())
    }
}

impl<R: CommandRunner> BalancerDriver for DockerBalancer<R> {
    async fn start(&self) -> Result<()> {
        self.ensure_network().await?;
        match self.container_running().await? {
            Some(true) => {
                debug!("balancer already running");
                return Ok(());
            }
            Some(false) => {
                self.docker(&["start", BALANCER_CONTAINER]).await?;
            }
            None => {
                let publish = format!("{}:{}:80", self.config.ip, self.config.port);
                self.docker(&[
                    "run",
                    "-d",
                    "--name",
                    BALANCER_CONTAINER,
                    "--network",
                    NETWORK,
                    "-p",
                    &publish,
                    "-v",
                    "/var/run/docker.sock:/var/run/docker.sock:ro",
                    &self.config.image,
                    "--providers.docker=true",
                    "--providers.docker.exposedbydefault=false",
                    "--entrypoints.web.address=:80",
                ])
                .await?;
            }
        }
        info!(host = %self.config.host, port = self.config.port, "balancer started");
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        if self.container_running().await? == Some(true) {
            self.docker(&["stop", BALANCER_CONTAINER]).await?;
            info!("balancer stopped");
        }
        Ok(())
    }
}
