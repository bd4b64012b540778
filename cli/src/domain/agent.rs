//! Agent infrastructure types: VM creation spec and lifecycle events.

use std::fmt;

use crate::domain::config::VmConfig;

/// Port probed to decide whether the VM has booted.
pub const VM_READY_PORT: u16 = 22;

/// Maximum number of readiness probes before the VM is declared dead.
pub const VM_READY_ATTEMPTS: u32 = 10;

/// Parameters for creating the VM definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmSpec {
    pub name: String,
    pub ip: String,
    pub boot_disk: String,
    pub data_disk: String,
}

impl From<&VmConfig> for VmSpec {
    fn from(cfg: &VmConfig) -> Self {
        Self {
            name: cfg.name.clone(),
            ip: cfg.ip.clone(),
            boot_disk: cfg.boot_disk.clone(),
            data_disk: cfg.data_disk.clone(),
        }
    }
}

/// Progress of the VM boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmStatus {
    Wait,
    Initialized,
}

impl fmt::Display for VmStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Wait => "wait",
            Self::Initialized => "initialized",
        })
    }
}

/// A status event emitted while the agent brings infrastructure up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentEvent {
    /// Component the event refers to, e.g. `"vm"`.
    pub context: &'static str,
    pub status: VmStatus,
}

impl AgentEvent {
    #[must_use]
    pub fn vm(status: VmStatus) -> Self {
        Self {
            context: "vm",
            status,
        }
    }
}
