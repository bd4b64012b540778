//! Docker CLI adapter: implements `ContainerRuntime` and `InstanceEnforcer`.
//!
//! `DockerCli<R>` routes every docker call through a `CommandRunner` so that
//! tests can inject a scripted runner without a docker daemon.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::application::ports::{CommandRunner, ContainerRuntime, InstanceEnforcer};
use crate::domain::scale::{ScaleOptions, ScaleTarget};
use crate::domain::system::{Container, System, TYPE_LABEL};
use crate::infra::command_runner::ensure_success;

/// Docker network shared by system instances and the balancer.
pub const NETWORK: &str = "devrig";

/// Label recording the owning system of an instance.
pub const SYSTEM_LABEL: &str = "devrig.system";

const DAEMON: &str = "daemon";

/// One line of `docker ps --format '{{json .}}'`.
#[derive(Debug, Deserialize)]
struct PsLine {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Names", default)]
    names: String,
    #[serde(rename = "Labels", default)]
    labels: String,
    #[serde(rename = "State", default)]
    state: String,
}

impl From<PsLine> for Container {
    fn from(line: PsLine) -> Self {
        let kind = line.labels.split(',').find_map(|pair| {
            pair.split_once('=')
                .filter(|(k, _)| *k == TYPE_LABEL)
                .map(|(_, v)| v.to_string())
        });
        Self {
            id: line.id,
            names: line
                .names
                .split(',')
                .filter(|n| !n.is_empty())
                .map(str::to_string)
                .collect(),
            kind,
            running: line.state == "running",
        }
    }
}

/// Parse `docker ps -a --format '{{json .}}'` output.
///
/// # Errors
///
/// Returns an error if a non-empty line is not a valid container record.
pub fn parse_ps(output: &str) -> Result<Vec<Container>> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|line| {
            serde_json::from_str::<PsLine>(line)
                .map(Container::from)
                .with_context(|| format!("parsing docker ps line: {line}"))
        })
        .collect()
}

/// Infrastructure adapter that drives containers through the docker CLI.
pub struct DockerCli<R: CommandRunner> {
    runner: R,
    /// Directory relative mount sources are resolved against.
    project_dir: PathBuf,
    sequence: AtomicU32,
}

impl<R: CommandRunner> DockerCli<R> {
    pub fn new(runner: R, project_dir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            project_dir: project_dir.into(),
            sequence: AtomicU32::new(0),
        }
    }

    async fn docker(&self, args: &[&str]) -> Result<std::process::Output> {
        let output = self
            .runner
            .run("docker", args)
            .await
            .with_context(|| format!("docker {}", args.first().copied().unwrap_or_default()))?;
        Ok(ensure_success("docker", output)?)
    }

    /// Unique instance name under the system's namespace.
    fn instance_name(&self, system: &System) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.subsec_nanos());
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!("{}.{:08x}{:02x}", system.namespace(), nanos, seq & 0xff)
    }

    fn run_args(&self, system: &System, name: &str) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "run".into(),
            "-d".into(),
            "--name".into(),
            name.into(),
            "--network".into(),
            NETWORK.into(),
            "--label".into(),
            format!("{TYPE_LABEL}={DAEMON}"),
            "--label".into(),
            format!("{SYSTEM_LABEL}={}", system.name()),
        ];

        if let Some(Value::Object(envs)) = system.option("envs") {
            for (key, value) in envs {
                let value = value.as_str().map_or_else(|| value.to_string(), str::to_string);
                args.extend(["-e".into(), format!("{key}={value}")]);
            }
        }
        if let Some(Value::Object(mounts)) = system.mount_folders() {
            for (target, source) in mounts {
                if let Some(source) = source.as_str() {
                    let source = resolve_source(&self.project_dir, source);
                    args.extend(["-v".into(), format!("{}:{target}", source.display())]);
                }
            }
        }
        if let Some(workdir) = system.option("workdir").and_then(Value::as_str) {
            args.extend(["-w".into(), workdir.into()]);
        }
        let domains = system.http_domains();
        if !domains.is_empty() {
            let router = system.namespace().replace('.', "-");
            let rule = domains
                .iter()
                .map(|d| format!("Host(`{d}`)"))
                .collect::<Vec<_>>()
                .join(" || ");
            args.extend([
                "--label".into(),
                "traefik.enable=true".into(),
                "--label".into(),
                format!("traefik.http.routers.{router}.rule={rule}"),
            ]);
        }

        args.extend([
            system.image().to_string(),
            "/bin/sh".into(),
            "-c".into(),
            system.command().into(),
        ]);
        args
    }
}

fn resolve_source(project_dir: &Path, source: &str) -> PathBuf {
    let path = Path::new(source);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_dir.join(path)
    }
}

impl<R: CommandRunner> ContainerRuntime for DockerCli<R> {
    async fn list_containers(&self) -> Result<Vec<Container>> {
        let output = self.docker(&["ps", "-a", "--format", "{{json .}}"]).await?;
        parse_ps(&String::from_utf8_lossy(&output.stdout))
    }
}

impl<R: CommandRunner> InstanceEnforcer for DockerCli<R> {
    async fn enforce(&self, system: &System, target: ScaleTarget, opts: &ScaleOptions) -> Result<u32> {
        let wanted = target.resolve(system);
        let containers = self.list_containers().await?;
        let daemons: Vec<&Container> = system
            .filter(&containers)
            .into_iter()
            .filter(|c| c.is_daemon())
            .collect();

        let mut changed = 0;
        if opts.reprovision && wanted > 0 {
            for container in &daemons {
                self.docker(&["rm", "-f", container.id.as_str()]).await?;
            }
            for _ in 0..wanted {
                self.create(system).await?;
                changed += 1;
            }
            info!(system = system.name(), wanted, "reprovisioned instances");
            return Ok(changed);
        }

        // docker lists newest containers first.
        let running: Vec<&Container> = daemons.iter().copied().filter(|c| c.running).collect();
        let stopped: Vec<&Container> = daemons.iter().copied().filter(|c| !c.running).collect();
        let current = u32::try_from(running.len()).unwrap_or(u32::MAX);
        debug!(system = system.name(), current, wanted, "enforcing instance count");

        if current < wanted {
            let mut missing = wanted - current;
            for container in stopped.iter().rev() {
                if missing == 0 {
                    break;
                }
                self.docker(&["start", container.id.as_str()]).await?;
                missing -= 1;
                changed += 1;
            }
            for _ in 0..missing {
                self.create(system).await?;
                changed += 1;
            }
        } else if current > wanted {
            let excess = usize::try_from(current - wanted).unwrap_or(usize::MAX);
            for container in running.iter().take(excess) {
                if opts.remove {
                    self.docker(&["rm", "-f", container.id.as_str()]).await?;
                } else {
                    self.docker(&["stop", container.id.as_str()]).await?;
                }
                changed += 1;
            }
        }
        Ok(changed)
    }
}

impl<R: CommandRunner> DockerCli<R> {
    async fn create(&self, system: &System) -> Result<()> {
        let name = self.instance_name(system);
        let args = self.run_args(system, &name);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.docker(&args).await?;
        info!(system = system.name(), instance = %name, "instance created");
        Ok(())
    }
}
