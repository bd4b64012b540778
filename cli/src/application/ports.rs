//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain`: never from `crate::infra`,
//! `crate::commands`, or `crate::output`.

use std::path::Path;
use std::process::Output;

use anyhow::Result;

use crate::domain::{AgentEvent, Container, DevrigConfig, Manifest, ScaleOptions, ScaleTarget, System, VmSpec};

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts process execution so infrastructure can be swapped or mocked.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a program and capture its output.
    ///
    /// Implementations should delegate to `run_with_timeout` using the
    /// instance's configured default timeout.
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output>;
    /// Run a program with a custom timeout override.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exceeds `timeout`.
    /// On timeout, the child process must be killed (not left orphaned).
    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: std::time::Duration,
    ) -> Result<Output>;
    /// Run a program in `dir` and capture its output.
    async fn run_in(&self, dir: &Path, program: &str, args: &[&str]) -> Result<Output>;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait: no async needed.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
    /// Emit an error message without aborting.
    fn fail(&self, message: &str);
}

/// Receives agent lifecycle status events.
pub trait LifecycleSink {
    fn notify(&self, event: AgentEvent);
}

// ── Configuration and Manifest Ports ──────────────────────────────────────────

/// Abstracts loading of the user configuration.
pub trait ConfigStore {
    /// Load the configuration, falling back to defaults when none exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    fn load(&self) -> Result<DevrigConfig>;
    /// Location of the configuration file.
    fn path(&self) -> Result<std::path::PathBuf>;
}

/// Abstracts discovery and parsing of the project manifest.
pub trait ManifestLoader {
    /// Load the manifest governing `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if no manifest is found or it is invalid.
    fn load(&self, dir: &Path, config: &DevrigConfig) -> Result<Manifest>;
}

// ── Container Ports ───────────────────────────────────────────────────────────

/// Read-only view of the container runtime.
#[allow(async_fn_in_trait)]
pub trait ContainerRuntime {
    /// List every container known to the runtime, running or not.
    async fn list_containers(&self) -> Result<Vec<Container>>;
}

/// Drives a system's instances towards a target count.
#[allow(async_fn_in_trait)]
pub trait InstanceEnforcer {
    /// Create or remove instances of `system` to reach `target`.
    ///
    /// Returns the number of instances changed by this call.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime rejects a create, stop or remove.
    async fn enforce(&self, system: &System, target: ScaleTarget, opts: &ScaleOptions) -> Result<u32>;
}

/// Opens a URL in a viewer.
#[allow(async_fn_in_trait)]
pub trait UrlOpener {
    /// Open `url`, with the named application when `app` is given.
    async fn open(&self, url: &str, app: Option<&str>) -> Result<()>;
}

// ── Agent Infrastructure Ports ────────────────────────────────────────────────

/// Virtual machine driver.
#[allow(async_fn_in_trait)]
pub trait VmDriver {
    async fn is_installed(&self, name: &str) -> Result<bool>;
    async fn is_running(&self, name: &str) -> Result<bool>;
    /// Create the VM definition.
    async fn init(&self, spec: &VmSpec) -> Result<()>;
    async fn start(&self, name: &str) -> Result<()>;
    async fn stop(&self, name: &str) -> Result<()>;
}

/// Shared filesystem service exported to the VM.
#[allow(async_fn_in_trait)]
pub trait ShareDriver {
    /// Ensure the file server is running on the host.
    async fn start(&self) -> Result<()>;
    async fn stop(&self) -> Result<()>;
    /// Mount the share inside the VM.
    async fn mount(&self, vm: &str) -> Result<()>;
}

/// Load balancer in front of balanceable systems.
#[allow(async_fn_in_trait)]
pub trait BalancerDriver {
    async fn start(&self) -> Result<()>;
    async fn stop(&self) -> Result<()>;
}

// ── Network Probe Port ────────────────────────────────────────────────────────

/// Abstracts network connectivity checks so application services can be tested
/// without real network access.
#[allow(async_fn_in_trait)]
pub trait NetworkProbe {
    /// Check TCP connectivity to the given host and port.
    async fn check_tcp_connectivity(&self, host: &str, port: u16) -> Result<bool>;
}

// ── Project Fetch Ports ───────────────────────────────────────────────────────

/// Git operations used when fetching a project before `start`.
#[allow(async_fn_in_trait)]
pub trait GitClient {
    /// Output of `git --version`.
    async fn version(&self) -> Result<String>;
    /// Output of `git ls-remote <url>`.
    async fn ls_remote(&self, url: &str) -> Result<Output>;
    /// Clone `url` into `dest`, restricted to `branch` when given.
    async fn clone_repo(&self, url: &str, branch: Option<&str>, dest: &str) -> Result<Output>;
    /// Check out `git_ref` inside `dest`.
    async fn checkout(&self, dest: &str, git_ref: &str) -> Result<Output>;
}

/// Local filesystem queries.
pub trait LocalFs {
    fn exists(&self, path: &Path) -> bool;
}
