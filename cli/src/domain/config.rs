//! Domain types for devrig configuration.
//!
//! Pure data only: no I/O, no async, no filesystem access. Loaded by
//! `infra::config::YamlConfigStore` and passed explicitly to the template
//! resolver, manifest loader and agent lifecycle.

use serde::{Deserialize, Serialize};

/// Top-level configuration stored in `~/.devrig/config.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct DevrigConfig {
    /// Supporting infrastructure settings.
    pub agent: AgentConfig,
}

/// Agent (VM, shared filesystem, balancer) settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    /// Whether systems run inside a provisioned virtual machine.
    pub requires_vm: bool,
    /// Attempt every teardown step even when an earlier one fails.
    pub best_effort_teardown: bool,
    pub vm: VmConfig,
    pub balancer: BalancerConfig,
    pub share: ShareConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            requires_vm: cfg!(target_os = "macos"),
            best_effort_teardown: false,
            vm: VmConfig::default(),
            balancer: BalancerConfig::default(),
            share: ShareConfig::default(),
        }
    }
}

/// Virtual machine settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VmConfig {
    pub name: String,
    /// Static host-only IP assigned to the VM.
    pub ip: String,
    pub boot_disk: String,
    pub data_disk: String,
    /// User used for `ssh` commands inside the VM.
    pub ssh_user: String,
    /// Delay between readiness probes, in milliseconds.
    pub wait_delay_ms: u64,
    /// When a caller passes an explicit running state to `stop_vm`, use it
    /// instead of skipping the stop.
    pub trust_explicit_running_state: bool,
}

impl Default for VmConfig {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            name: "devrig-vm".to_string(),
            ip: "192.168.51.4".to_string(),
            boot_disk: format!("{data_dir}/vm/devrig.iso"),
            data_disk: format!("{data_dir}/vm/devrig-agent.vmdk"),
            ssh_user: "core".to_string(),
            wait_delay_ms: 2_000,
            trust_explicit_running_state: false,
        }
    }
}

/// Load balancer settings. `host`, `port` and `ip` are also exposed to system
/// option templates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BalancerConfig {
    /// Default domain under which balanced systems are published.
    pub host: String,
    pub port: u16,
    pub ip: String,
    /// Proxy image run as the balancer container.
    pub image: String,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            host: "dev.devrig.io".to_string(),
            port: 80,
            ip: "127.0.0.1".to_string(),
            image: "traefik:v3.1".to_string(),
        }
    }
}

/// Shared filesystem (user-space NFS) settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ShareConfig {
    pub binary: String,
    pub port: u16,
    pub exports_file: String,
    pub pid_file: String,
    /// Directory exported to the VM.
    pub root: String,
    /// Mount point inside the VM.
    pub mount_point: String,
}

impl Default for ShareConfig {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            binary: "unfsd".to_string(),
            port: 2049,
            exports_file: format!("{data_dir}/share/exports"),
            pid_file: format!("{data_dir}/share/unfsd.pid"),
            root: dirs::home_dir()
                .map_or_else(|| "/".to_string(), |h| h.to_string_lossy().into_owned()),
            mount_point: "/home/core/share".to_string(),
        }
    }
}

fn default_data_dir() -> String {
    dirs::home_dir().map_or_else(
        || ".devrig".to_string(),
        |h| h.join(".devrig").to_string_lossy().into_owned(),
    )
}
