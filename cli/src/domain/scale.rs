//! Scale targets: how many instances each system should run after an action.
//!
//! Pure rules only. Enforcement happens through the `InstanceEnforcer` port.

use std::collections::HashMap;
use std::fmt;

use crate::domain::error::SYSTEMS_FAILED_CODE;
use crate::domain::system::System;

/// Direction of a scale pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleAction {
    Start,
    Stop,
}

impl ScaleAction {
    /// Tag recorded when a system did not change state.
    #[must_use]
    pub fn failure_tag(self) -> &'static str {
        match self {
            Self::Start => "already",
            Self::Stop => "not_running",
        }
    }
}

impl fmt::Display for ScaleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Start => "start",
            Self::Stop => "stop",
        })
    }
}

/// Desired instance count for one system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleTarget {
    /// Let the enforcer apply the system's own default.
    Default,
    Exact(u32),
}

impl ScaleTarget {
    /// Concrete count once the system's default policy is applied.
    #[must_use]
    pub fn resolve(self, system: &System) -> u32 {
        match self {
            Self::Exact(n) => n,
            Self::Default if system.disabled() => 0,
            Self::Default => system.scalable_default(),
        }
    }
}

impl fmt::Display for ScaleTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("default"),
            Self::Exact(n) => write!(f, "{n}"),
        }
    }
}

/// How `--open` was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenRequest {
    /// Open with the platform default viewer.
    Default,
    /// Open with the named application.
    With(String),
}

/// Options shared by every scale action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaleOptions {
    /// Explicit per-system instance counts.
    pub instances: HashMap<String, u32>,
    /// A system name was given on the command line.
    pub filtered: bool,
    pub open: Option<OpenRequest>,
    /// Recreate instances even when the count already matches.
    pub reprovision: bool,
    /// Remove containers when scaling down instead of only stopping them.
    pub remove: bool,
}

impl Default for ScaleOptions {
    fn default() -> Self {
        Self {
            instances: HashMap::new(),
            filtered: false,
            open: None,
            reprovision: false,
            remove: true,
        }
    }
}

/// Compute the target for `system` under `action`.
///
/// Stop always targets zero. Start uses the explicit count when one was
/// given; otherwise an enabled system scaled to zero by default is still
/// brought up to one instance unless a system filter was given.
#[must_use]
pub fn target_for(action: ScaleAction, system: &System, opts: &ScaleOptions) -> ScaleTarget {
    match action {
        ScaleAction::Stop => ScaleTarget::Exact(0),
        ScaleAction::Start => {
            if let Some(n) = opts.instances.get(system.name()) {
                ScaleTarget::Exact(*n)
            } else if !opts.filtered && system.scalable_default() == 0 && !system.disabled() {
                ScaleTarget::Exact(1)
            } else {
                ScaleTarget::Default
            }
        }
    }
}

/// A system that did not change state during a scale pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftFailure {
    pub system: String,
    pub tag: &'static str,
}

/// Result of one controller invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScaleReport {
    pub failures: Vec<SoftFailure>,
    /// Set when a hard failure rolled the batch back; holds the carried code.
    pub aborted: Option<i32>,
}

impl ScaleReport {
    /// Process exit code for this report.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self.aborted {
            Some(code) => code,
            None if self.failures.is_empty() => 0,
            None => SYSTEMS_FAILED_CODE,
        }
    }
}
