//! Tests for the docker adapter against a scripted `CommandRunner`.

#![allow(clippy::expect_used)]

use std::path::Path;
use std::process::Output;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use devrig_cli::application::ports::{CommandRunner, ContainerRuntime, InstanceEnforcer};
use devrig_cli::domain::error::{CommandFailed, carried_code};
use devrig_cli::domain::{ScaleOptions, ScaleTarget, System};
use devrig_cli::infra::docker::DockerCli;
use serde_json::json;

use crate::helpers::{def, err_output, manifest, ok_output};

type CallLog = Arc<Mutex<Vec<Vec<String>>>>;

/// Answers `docker ps` with a fixed listing and records every other call.
struct ScriptedRunner {
    ps: String,
    /// Docker subcommand that fails, with its exit code.
    fail: Option<(&'static str, i32)>,
    calls: CallLog,
}

impl ScriptedRunner {
    fn new(ps: String) -> (Self, CallLog) {
        let calls = CallLog::default();
        let runner = Self {
            ps,
            fail: None,
            calls: Arc::clone(&calls),
        };
        (runner, calls)
    }
}

impl CommandRunner for ScriptedRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output> {
        self.run_with_timeout(program, args, Duration::from_secs(1)).await
    }

    async fn run_with_timeout(&self, program: &str, args: &[&str], _timeout: Duration) -> Result<Output> {
        assert_eq!(program, "docker");
        let mut call = vec![program.to_string()];
        call.extend(args.iter().map(|a| (*a).to_string()));
        self.calls.lock().expect("lock").push(call);

        match args.first().copied() {
            Some(cmd) if self.fail.is_some_and(|(f, _)| f == cmd) => {
                let code = self.fail.map_or(1, |(_, code)| code);
                Ok(err_output(code, b"Error response from daemon: conflict"))
            }
            Some("ps") => Ok(ok_output(self.ps.as_bytes())),
            _ => Ok(ok_output(b"")),
        }
    }

    async fn run_in(&self, _dir: &Path, program: &str, args: &[&str]) -> Result<Output> {
        self.run(program, args).await
    }
}

fn web() -> System {
    let m = manifest(vec![def(
        "web",
        json!({
            "command": "npm start",
            "workdir": "/app",
            "envs": {"PORT": 3000, "NODE_ENV": "development"},
            "mount_folders": {"/app": "src"},
            "http": {"domains": ["shop.dev.devrig.io"]},
        }),
    )]);
    m.system("web").expect("web").clone()
}

fn ps_line(id: &str, name: &str, kind: &str, state: &str) -> String {
    json!({
        "ID": id,
        "Names": name,
        "Labels": format!("devrig.type={kind},devrig.system=web"),
        "State": state,
    })
    .to_string()
}

/// Listing for `web`, newest first, plus noise from another project.
fn listing(system: &System, instances: &[(&str, &str)]) -> String {
    let ns = system.namespace();
    let mut lines: Vec<String> = instances
        .iter()
        .map(|(id, state)| ps_line(id, &format!("{ns}.{id}"), "daemon", state))
        .collect();
    lines.push(ps_line("sh1", &format!("{ns}.sh1"), "shell", "running"));
    lines.push(ps_line("zz9", "dev.devrig.0000000000000000-sys.web.zz9", "daemon", "running"));
    lines.join("\n")
}

fn non_ps(calls: &CallLog) -> Vec<Vec<String>> {
    calls
        .lock()
        .expect("lock")
        .iter()
        .filter(|c| c[1] != "ps")
        .cloned()
        .collect()
}

#[tokio::test]
async fn lists_containers_from_ps() {
    let system = web();
    let (runner, calls) = ScriptedRunner::new(listing(&system, &[("c2", "running"), ("c1", "exited")]));
    let docker = DockerCli::new(runner, "/projects/shop");

    let containers = docker.list_containers().await.expect("list");
    assert_eq!(containers.len(), 4);
    assert_eq!(system.filter(&containers).len(), 3);
    assert_eq!(
        calls.lock().expect("lock")[0],
        ["docker", "ps", "-a", "--format", "{{json .}}"]
    );
}

#[tokio::test]
async fn growing_restarts_stopped_instances_before_creating() {
    let system = web();
    let (runner, calls) = ScriptedRunner::new(listing(&system, &[("c2", "running"), ("c1", "exited")]));
    let docker = DockerCli::new(runner, "/projects/shop");

    let changed = docker
        .enforce(&system, ScaleTarget::Exact(3), &ScaleOptions::default())
        .await
        .expect("enforce");

    assert_eq!(changed, 2);
    let calls = non_ps(&calls);
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], ["docker", "start", "c1"]);

    let run = calls[1].join(" ");
    assert!(run.starts_with("docker run -d --name "), "got: {run}");
    assert!(run.contains(&format!("--name {}.", system.namespace())));
    assert!(run.contains("--network devrig"));
    assert!(run.contains("--label devrig.type=daemon"));
    assert!(run.contains("--label devrig.system=web"));
    assert!(run.contains("-e PORT=3000"));
    assert!(run.contains("-e NODE_ENV=development"));
    assert!(run.contains("-v /projects/shop/src:/app"));
    assert!(run.contains("-w /app"));
    assert!(run.contains("--label traefik.enable=true"));
    assert!(run.contains("Host(`shop.dev.devrig.io`)"));
    assert!(run.ends_with("busybox:latest /bin/sh -c npm start"), "got: {run}");
}

#[tokio::test]
async fn default_target_uses_scalable_default() {
    let system = web();
    let (runner, calls) = ScriptedRunner::new(listing(&system, &[]));
    let docker = DockerCli::new(runner, "/projects/shop");

    let changed = docker
        .enforce(&system, ScaleTarget::Default, &ScaleOptions::default())
        .await
        .expect("enforce");
    assert_eq!(changed, 1);
    assert_eq!(non_ps(&calls).len(), 1);
}

#[tokio::test]
async fn shrinking_removes_newest_instances() {
    let system = web();
    let (runner, calls) = ScriptedRunner::new(listing(
        &system,
        &[("c3", "running"), ("c2", "running"), ("c1", "running")],
    ));
    let docker = DockerCli::new(runner, "/projects/shop");

    let changed = docker
        .enforce(&system, ScaleTarget::Exact(1), &ScaleOptions::default())
        .await
        .expect("enforce");

    assert_eq!(changed, 2);
    assert_eq!(
        non_ps(&calls),
        [["docker", "rm", "-f", "c3"], ["docker", "rm", "-f", "c2"]]
    );
}

#[tokio::test]
async fn shrinking_without_remove_only_stops() {
    let system = web();
    let (runner, calls) = ScriptedRunner::new(listing(&system, &[("c2", "running"), ("c1", "exited")]));
    let docker = DockerCli::new(runner, "/projects/shop");
    let opts = ScaleOptions {
        remove: false,
        ..ScaleOptions::default()
    };

    let changed = docker
        .enforce(&system, ScaleTarget::Exact(0), &opts)
        .await
        .expect("enforce");
    assert_eq!(changed, 1);
    assert_eq!(non_ps(&calls), [["docker", "stop", "c2"]]);
}

#[tokio::test]
async fn matching_count_changes_nothing() {
    let system = web();
    let (runner, calls) = ScriptedRunner::new(listing(&system, &[("c1", "running")]));
    let docker = DockerCli::new(runner, "/projects/shop");

    let changed = docker
        .enforce(&system, ScaleTarget::Exact(1), &ScaleOptions::default())
        .await
        .expect("enforce");
    assert_eq!(changed, 0);
    assert!(non_ps(&calls).is_empty());
}

#[tokio::test]
async fn reprovision_replaces_every_instance() {
    let system = web();
    let (runner, calls) = ScriptedRunner::new(listing(&system, &[("c2", "running"), ("c1", "exited")]));
    let docker = DockerCli::new(runner, "/projects/shop");
    let opts = ScaleOptions {
        reprovision: true,
        ..ScaleOptions::default()
    };

    let changed = docker
        .enforce(&system, ScaleTarget::Exact(1), &opts)
        .await
        .expect("enforce");

    assert_eq!(changed, 1);
    let calls = non_ps(&calls);
    assert_eq!(calls[0], ["docker", "rm", "-f", "c2"]);
    assert_eq!(calls[1], ["docker", "rm", "-f", "c1"]);
    assert_eq!(calls[2][1], "run");
    assert_eq!(calls.len(), 3);
}

#[tokio::test]
async fn failing_docker_call_carries_its_exit_code() {
    let system = web();
    let (mut runner, calls) = ScriptedRunner::new(listing(&system, &[]));
    runner.fail = Some(("run", 125));
    let docker = DockerCli::new(runner, "/projects/shop");

    let err = docker
        .enforce(&system, ScaleTarget::Exact(2), &ScaleOptions::default())
        .await
        .expect_err("run fails");

    assert_eq!(carried_code(&err), Some(125));
    let failed = err.downcast_ref::<CommandFailed>().expect("command failure");
    assert!(failed.stderr.contains("conflict"));
    // The first failure stops the pass.
    assert_eq!(non_ps(&calls).len(), 1);
}
