//! Tests for the agent lifecycle service.
//!
//! A single recording fake stands in for the VM, shared filesystem, balancer
//! and network probe so the journal shows the exact cross-driver ordering.

#![allow(clippy::expect_used)]

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use devrig_cli::application::ports::{BalancerDriver, NetworkProbe, ShareDriver, VmDriver};
use devrig_cli::application::services::agent::{AgentLifecycle, wait_service};
use devrig_cli::domain::agent::{AgentEvent, VM_READY_ATTEMPTS, VmSpec, VmStatus};
use devrig_cli::domain::config::{AgentConfig, VmConfig};
use devrig_cli::domain::error::AgentError;

use crate::helpers::RecordingSink;

#[derive(Default)]
struct FakeAgent {
    journal: Mutex<Vec<&'static str>>,
    installed: bool,
    running: bool,
    /// Probe number (1-based) at which the VM answers; `None` never answers.
    reachable_at: Option<u32>,
    probe_errors: bool,
    probes: Mutex<u32>,
    failing: HashSet<&'static str>,
}

impl FakeAgent {
    fn booting() -> Self {
        Self {
            reachable_at: Some(1),
            ..Self::default()
        }
    }

    fn failing(mut self, step: &'static str) -> Self {
        self.failing.insert(step);
        self
    }

    fn record(&self, step: &'static str) -> Result<()> {
        self.journal.lock().expect("lock").push(step);
        if self.failing.contains(step) {
            anyhow::bail!("{step} failed");
        }
        Ok(())
    }

    fn journal(&self) -> Vec<&'static str> {
        self.journal.lock().expect("lock").clone()
    }

    fn probes(&self) -> u32 {
        *self.probes.lock().expect("lock")
    }
}

impl VmDriver for FakeAgent {
    async fn is_installed(&self, _name: &str) -> Result<bool> {
        self.record("vm.is_installed")?;
        Ok(self.installed)
    }
    async fn is_running(&self, _name: &str) -> Result<bool> {
        self.record("vm.is_running")?;
        Ok(self.running)
    }
    async fn init(&self, _spec: &VmSpec) -> Result<()> {
        self.record("vm.init")
    }
    async fn start(&self, _name: &str) -> Result<()> {
        self.record("vm.start")
    }
    async fn stop(&self, _name: &str) -> Result<()> {
        self.record("vm.stop")
    }
}

impl ShareDriver for FakeAgent {
    async fn start(&self) -> Result<()> {
        self.record("share.start")
    }
    async fn stop(&self) -> Result<()> {
        self.record("share.stop")
    }
    async fn mount(&self, _vm: &str) -> Result<()> {
        self.record("share.mount")
    }
}

impl BalancerDriver for FakeAgent {
    async fn start(&self) -> Result<()> {
        self.record("balancer.start")
    }
    async fn stop(&self) -> Result<()> {
        self.record("balancer.stop")
    }
}

impl NetworkProbe for FakeAgent {
    async fn check_tcp_connectivity(&self, _host: &str, _port: u16) -> Result<bool> {
        let mut probes = self.probes.lock().expect("lock");
        *probes += 1;
        if self.probe_errors {
            anyhow::bail!("connection refused");
        }
        Ok(self.reachable_at.is_some_and(|n| *probes >= n))
    }
}

fn config(requires_vm: bool, best_effort: bool, trust_explicit: bool) -> AgentConfig {
    AgentConfig {
        requires_vm,
        best_effort_teardown: best_effort,
        vm: VmConfig {
            wait_delay_ms: 0,
            trust_explicit_running_state: trust_explicit,
            ..VmConfig::default()
        },
        ..AgentConfig::default()
    }
}

fn lifecycle<'a>(cfg: &'a AgentConfig, fake: &'a FakeAgent) -> AgentLifecycle<'a, FakeAgent, FakeAgent, FakeAgent, FakeAgent> {
    AgentLifecycle::new(cfg, fake, fake, fake, fake)
}

// ── start ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn start_brings_up_share_then_vm_then_balancer() {
    let cfg = config(true, false, false);
    let fake = FakeAgent {
        reachable_at: Some(3),
        ..FakeAgent::default()
    };
    let sink = RecordingSink::default();

    lifecycle(&cfg, &fake).start(&sink).await.expect("start");

    assert_eq!(
        fake.journal(),
        [
            "share.start",
            "vm.is_installed",
            "vm.init",
            "vm.is_running",
            "vm.start",
            "share.mount",
            "balancer.start",
        ]
    );
    assert_eq!(fake.probes(), 3);
    assert_eq!(
        *sink.events.lock().expect("lock"),
        [AgentEvent::vm(VmStatus::Wait), AgentEvent::vm(VmStatus::Initialized)]
    );
}

#[tokio::test]
async fn start_without_vm_only_starts_balancer() {
    let cfg = config(false, false, false);
    let fake = FakeAgent::booting();
    let sink = RecordingSink::default();

    lifecycle(&cfg, &fake).start(&sink).await.expect("start");
    assert_eq!(fake.journal(), ["balancer.start"]);
    assert!(sink.events.lock().expect("lock").is_empty());
}

#[tokio::test]
async fn start_skips_boot_when_vm_already_running() {
    let cfg = config(true, false, false);
    let fake = FakeAgent {
        installed: true,
        running: true,
        ..FakeAgent::default()
    };
    let sink = RecordingSink::default();

    lifecycle(&cfg, &fake).start(&sink).await.expect("start");
    assert_eq!(
        fake.journal(),
        ["share.start", "vm.is_installed", "vm.is_running", "balancer.start"]
    );
    assert_eq!(fake.probes(), 0);
    assert!(sink.events.lock().expect("lock").is_empty());
}

#[tokio::test]
async fn unreachable_vm_aborts_before_balancer() {
    let cfg = config(true, false, false);
    let fake = FakeAgent {
        installed: true,
        reachable_at: None,
        ..FakeAgent::default()
    };
    let sink = RecordingSink::default();

    let err = lifecycle(&cfg, &fake).start(&sink).await.expect_err("vm never answers");

    assert!(
        matches!(
            err.downcast_ref::<AgentError>(),
            Some(AgentError::VmDidNotStart { port: 22, attempts, .. }) if *attempts == VM_READY_ATTEMPTS
        ),
        "got: {err:#}"
    );
    assert_eq!(fake.probes(), VM_READY_ATTEMPTS);
    assert!(!fake.journal().contains(&"balancer.start"));
    assert!(!fake.journal().contains(&"share.mount"));
    assert_eq!(*sink.events.lock().expect("lock"), [AgentEvent::vm(VmStatus::Wait)]);
}

#[tokio::test]
async fn probe_errors_count_as_failed_attempts() {
    let cfg = config(true, false, false);
    let fake = FakeAgent {
        installed: true,
        probe_errors: true,
        ..FakeAgent::default()
    };

    let err = lifecycle(&cfg, &fake)
        .start(&RecordingSink::default())
        .await
        .expect_err("probe keeps failing");
    assert!(err.downcast_ref::<AgentError>().is_some(), "got: {err:#}");
    assert_eq!(fake.probes(), VM_READY_ATTEMPTS);
}

#[tokio::test]
async fn failing_share_start_aborts_remaining_steps() {
    let cfg = config(true, false, false);
    let fake = FakeAgent::booting().failing("share.start");

    let err = lifecycle(&cfg, &fake)
        .start(&RecordingSink::default())
        .await
        .expect_err("share fails");
    assert!(format!("{err:#}").contains("shared filesystem"), "got: {err:#}");
    assert_eq!(fake.journal(), ["share.start"]);
}

#[tokio::test]
async fn install_vm_without_start_only_creates() {
    let cfg = config(true, false, false);
    let fake = FakeAgent::booting();

    lifecycle(&cfg, &fake)
        .install_vm(false, false, &RecordingSink::default())
        .await
        .expect("install");
    assert_eq!(fake.journal(), ["vm.is_installed", "vm.init"]);
}

#[tokio::test]
async fn install_vm_without_mount_skips_share() {
    let cfg = config(true, false, false);
    let fake = FakeAgent {
        installed: true,
        ..FakeAgent::booting()
    };

    lifecycle(&cfg, &fake)
        .install_vm(true, false, &RecordingSink::default())
        .await
        .expect("install");
    assert_eq!(fake.journal(), ["vm.is_installed", "vm.is_running", "vm.start"]);
}

// ── stop ──────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn stop_tears_down_in_reverse_order() {
    let cfg = config(true, false, false);
    let fake = FakeAgent {
        running: true,
        ..FakeAgent::default()
    };

    lifecycle(&cfg, &fake).stop().await.expect("stop");
    assert_eq!(
        fake.journal(),
        ["balancer.stop", "vm.is_running", "vm.stop", "share.stop"]
    );
}

#[tokio::test]
async fn stop_skips_vm_that_is_not_running() {
    let cfg = config(true, false, false);
    let fake = FakeAgent::default();

    lifecycle(&cfg, &fake).stop().await.expect("stop");
    assert_eq!(fake.journal(), ["balancer.stop", "vm.is_running", "share.stop"]);
}

#[tokio::test]
async fn stop_without_vm_still_runs_every_teardown_step() {
    let cfg = config(false, false, false);
    let fake = FakeAgent {
        running: true,
        ..FakeAgent::default()
    };

    lifecycle(&cfg, &fake).stop().await.expect("stop");
    assert_eq!(
        fake.journal(),
        ["balancer.stop", "vm.is_running", "vm.stop", "share.stop"]
    );
}

#[tokio::test]
async fn stop_fails_fast_by_default() {
    let cfg = config(true, false, false);
    let fake = FakeAgent {
        running: true,
        ..FakeAgent::default()
    }
    .failing("balancer.stop");

    lifecycle(&cfg, &fake).stop().await.expect_err("balancer fails");
    assert_eq!(fake.journal(), ["balancer.stop"]);
}

#[tokio::test]
async fn best_effort_stop_runs_every_step_and_aggregates() {
    let cfg = config(true, true, false);
    let fake = FakeAgent {
        running: true,
        ..FakeAgent::default()
    }
    .failing("balancer.stop")
    .failing("share.stop");

    let err = lifecycle(&cfg, &fake).stop().await.expect_err("two steps fail");

    assert_eq!(
        fake.journal(),
        ["balancer.stop", "vm.is_running", "vm.stop", "share.stop"]
    );
    let Some(AgentError::Teardown(summary)) = err.downcast_ref::<AgentError>() else {
        panic!("expected teardown error, got: {err:#}");
    };
    assert!(summary.contains("balancer: balancer.stop failed"));
    assert!(summary.contains("share: share.stop failed"));
    assert!(!summary.contains("vm:"));
}

// ── stop_vm ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn stop_vm_queries_driver_without_explicit_state() {
    let cfg = config(true, false, false);
    let fake = FakeAgent {
        running: true,
        ..FakeAgent::default()
    };

    lifecycle(&cfg, &fake).stop_vm(None).await.expect("stop_vm");
    assert_eq!(fake.journal(), ["vm.is_running", "vm.stop"]);
}

#[tokio::test]
async fn explicit_running_state_is_ignored_unless_trusted() {
    let cfg = config(true, false, false);
    let fake = FakeAgent {
        running: true,
        ..FakeAgent::default()
    };

    lifecycle(&cfg, &fake).stop_vm(Some(true)).await.expect("stop_vm");
    assert!(fake.journal().is_empty());
}

#[tokio::test]
async fn trusted_explicit_running_state_drives_the_stop() {
    let cfg = config(true, false, true);
    let fake = FakeAgent::default();

    lifecycle(&cfg, &fake).stop_vm(Some(true)).await.expect("stop_vm");
    assert_eq!(fake.journal(), ["vm.stop"]);

    let idle = FakeAgent {
        running: true,
        ..FakeAgent::default()
    };
    lifecycle(&cfg, &idle).stop_vm(Some(false)).await.expect("stop_vm");
    assert!(idle.journal().is_empty());
}

// ── wait_service ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn wait_service_returns_on_first_success() {
    let fake = FakeAgent {
        reachable_at: Some(2),
        ..FakeAgent::default()
    };
    assert!(wait_service(&fake, "10.0.0.2", 22, 5, Duration::from_millis(1)).await);
    assert_eq!(fake.probes(), 2);
}

#[tokio::test]
async fn wait_service_gives_up_after_attempts() {
    let fake = FakeAgent::default();
    assert!(!wait_service(&fake, "10.0.0.2", 22, 4, Duration::ZERO).await);
    assert_eq!(fake.probes(), 4);
}

#[tokio::test]
async fn wait_service_with_zero_attempts_never_probes() {
    let fake = FakeAgent::booting();
    assert!(!wait_service(&fake, "10.0.0.2", 22, 0, Duration::ZERO).await);
    assert_eq!(fake.probes(), 0);
}
