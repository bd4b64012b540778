//! Application context: unified state passed to every command handler.
//!
//! `AppContext` is constructed once in `Cli::run()` and owns the output
//! context, the loaded configuration and the production adapters.

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::application::ports::ConfigStore;
use crate::application::services::agent::AgentLifecycle;
use crate::domain::config::DevrigConfig;
use crate::infra::balancer::DockerBalancer;
use crate::infra::command_runner::{DEFAULT_CMD_TIMEOUT, TokioCommandRunner};
use crate::infra::config::YamlConfigStore;
use crate::infra::docker::DockerCli;
use crate::infra::git::GitCli;
use crate::infra::network::TokioNetworkProbe;
use crate::infra::opener::SystemOpener;
use crate::infra::share::UnfsdShare;
use crate::infra::vm::VBoxManageDriver;
use crate::output::{OutputContext, TerminalReporter};

/// Output rendering flags.
pub struct OutputFlags {
    /// Disable ANSI color output.
    pub no_color: bool,
    /// Suppress non-error output.
    pub quiet: bool,
}

/// Unified application context passed to every command handler.
pub struct AppContext {
    /// Terminal output context (colors, quiet mode).
    pub output: OutputContext,
    pub config: DevrigConfig,
    /// Directory the command was invoked from.
    pub cwd: PathBuf,
    pub vm: VBoxManageDriver<TokioCommandRunner>,
    pub share: UnfsdShare<TokioCommandRunner>,
    pub balancer: DockerBalancer<TokioCommandRunner>,
    pub probe: TokioNetworkProbe,
    pub git: GitCli<TokioCommandRunner>,
    pub opener: SystemOpener<TokioCommandRunner>,
}

impl AppContext {
    /// Construct an `AppContext` from top-level CLI flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded or the working
    /// directory cannot be determined.
    pub fn new(flags: &OutputFlags) -> Result<Self> {
        let config = YamlConfigStore.load()?;
        let cwd = std::env::current_dir().context("cannot determine working directory")?;
        let runner = || TokioCommandRunner::new(DEFAULT_CMD_TIMEOUT);

        Ok(Self {
            output: OutputContext::new(flags.no_color, flags.quiet),
            vm: VBoxManageDriver::new(runner()),
            share: UnfsdShare::new(runner(), config.agent.share.clone(), config.agent.vm.clone()),
            balancer: DockerBalancer::new(runner(), config.agent.balancer.clone()),
            probe: TokioNetworkProbe,
            git: GitCli::new(runner()),
            opener: SystemOpener::new(runner()),
            config,
            cwd,
        })
    }

    /// Reporter rendering service progress on the terminal.
    #[must_use]
    pub fn terminal_reporter(&self) -> TerminalReporter<'_> {
        TerminalReporter::new(&self.output)
    }

    /// Agent lifecycle wired to the production drivers.
    #[must_use]
    pub fn agent(
        &self,
    ) -> AgentLifecycle<
        '_,
        VBoxManageDriver<TokioCommandRunner>,
        UnfsdShare<TokioCommandRunner>,
        DockerBalancer<TokioCommandRunner>,
        TokioNetworkProbe,
    > {
        AgentLifecycle::new(&self.config.agent, &self.vm, &self.share, &self.balancer, &self.probe)
    }

    /// Docker adapter resolving relative mounts against `project_dir`.
    #[must_use]
    pub fn docker(&self, project_dir: impl Into<PathBuf>) -> DockerCli<TokioCommandRunner> {
        DockerCli::new(TokioCommandRunner::new(DEFAULT_CMD_TIMEOUT), project_dir)
    }
}
