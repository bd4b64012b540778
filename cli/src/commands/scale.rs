//! `devrig start|stop|restart|reload`: scale the systems of a manifest.

use anyhow::Result;
use clap::{ArgAction, Args};
use tracing::info;

use crate::app::AppContext;
use crate::application::ports::ManifestLoader;
use crate::application::services::project::fetch_project;
use crate::application::services::scale::ScaleController;
use crate::domain::project::{StartArguments, parse_start_arguments};
use crate::domain::scale::{OpenRequest, ScaleOptions};
use crate::domain::{Manifest, ScaleReport, System};
use crate::infra::fs::HostFs;
use crate::infra::manifest::YamlManifestLoader;

/// Arguments for the start command.
#[derive(Args, Debug, Default)]
pub struct StartArgs {
    /// System to start (with its dependencies), or a git repository to fetch
    pub system: Option<String>,

    /// Open the default system's URL, optionally with the named application
    #[arg(short, long, value_name = "APP", num_args = 0..=1)]
    pub open: Option<Option<String>>,

    /// Recreate instances even if they are already running
    #[arg(short = 'R', long)]
    pub reprovision: bool,

    /// Git repository to fetch before starting
    #[arg(long, conflicts_with = "system")]
    pub git_repo: Option<String>,

    /// Branch, tag or commit to fetch when starting a repository
    #[arg(long)]
    pub git_ref: Option<String>,

    /// Where to clone the repository
    #[arg(long)]
    pub dest_path: Option<String>,
}

/// Arguments for the stop command.
#[derive(Args, Debug)]
pub struct StopArgs {
    /// System to stop
    pub system: Option<String>,

    /// Remove containers instead of only stopping them
    #[arg(short, long, default_value_t = true, action = ArgAction::Set, value_name = "BOOL")]
    pub remove: bool,
}

/// Arguments for the restart command.
#[derive(Args, Debug, Default)]
pub struct RestartArgs {
    /// System to restart
    pub system: Option<String>,

    /// Open the default system's URL, optionally with the named application
    #[arg(short, long, value_name = "APP", num_args = 0..=1)]
    pub open: Option<Option<String>>,

    /// Recreate instances instead of restarting them as they are
    #[arg(short = 'R', long)]
    pub reprovision: bool,
}

/// Arguments for the reload command.
#[derive(Args, Debug)]
pub struct ReloadArgs {
    /// System to reload
    pub system: Option<String>,

    /// Recreate instances instead of restarting them as they are
    #[arg(short = 'R', long, default_value_t = true, action = ArgAction::Set, value_name = "BOOL")]
    pub reprovision: bool,
}

impl From<ReloadArgs> for RestartArgs {
    fn from(args: ReloadArgs) -> Self {
        Self {
            system: args.system,
            open: None,
            reprovision: args.reprovision,
        }
    }
}

fn open_request(open: Option<Option<String>>) -> Option<OpenRequest> {
    open.map(|app| app.map_or(OpenRequest::Default, OpenRequest::With))
}

fn load_manifest(app: &AppContext, dir: &std::path::Path) -> Result<Manifest> {
    YamlManifestLoader.load(dir, &app.config)
}

/// Run `devrig start`.
///
/// # Errors
///
/// Returns an error if the project cannot be fetched, the agent cannot be
/// started, the manifest is invalid, or the rollback of a failed start fails.
pub async fn start(args: StartArgs, app: &AppContext) -> Result<i32> {
    let reporter = app.terminal_reporter();
    let request = parse_start_arguments(&StartArguments {
        system: args.system.as_deref(),
        git_repo: args.git_repo.as_deref(),
        git_ref: args.git_ref.as_deref(),
        dest_path: args.dest_path.as_deref(),
    });

    let (dir, system) = match &request {
        Some(request) => {
            fetch_project(&app.git, &HostFs, &reporter, request).await?;
            (app.cwd.join(&request.destination), None)
        }
        None => (app.cwd.clone(), args.system.as_deref()),
    };

    app.agent().start(&reporter).await?;

    let manifest = load_manifest(app, &dir)?;
    let systems = manifest.systems_with_dependencies(system)?;
    let opts = ScaleOptions {
        filtered: system.is_some(),
        open: open_request(args.open),
        reprovision: args.reprovision,
        ..ScaleOptions::default()
    };

    let docker = app.docker(manifest.dir());
    let controller = ScaleController::new(
        &docker,
        &docker,
        &app.opener,
        &reporter,
        app.config.agent.balancer.port,
    );
    let report = controller.start(&manifest, &systems, &opts).await?;
    Ok(finish(app, "start", &report))
}

/// Run `devrig stop`.
///
/// # Errors
///
/// Returns an error if the manifest is invalid or a system cannot be stopped.
pub async fn stop(args: StopArgs, app: &AppContext) -> Result<i32> {
    let reporter = app.terminal_reporter();
    let manifest = load_manifest(app, &app.cwd)?;
    let systems = manifest.systems_named(args.system.as_deref())?;
    let opts = ScaleOptions {
        filtered: args.system.is_some(),
        remove: args.remove,
        ..ScaleOptions::default()
    };

    let docker = app.docker(manifest.dir());
    let controller = ScaleController::new(
        &docker,
        &docker,
        &app.opener,
        &reporter,
        app.config.agent.balancer.port,
    );
    let report = controller.stop(&manifest, &systems, &opts).await?;
    Ok(finish(app, "stop", &report))
}

/// Run `devrig restart`, or `devrig reload` when `deprecated_reload` is set.
///
/// # Errors
///
/// Returns an error if the agent cannot be started, the manifest is invalid,
/// or the stop pass fails.
pub async fn restart(args: RestartArgs, app: &AppContext, deprecated_reload: bool) -> Result<i32> {
    let reporter = app.terminal_reporter();
    app.agent().start(&reporter).await?;

    let manifest = load_manifest(app, &app.cwd)?;
    let systems: Vec<System> = manifest.systems_named(args.system.as_deref())?;
    let opts = ScaleOptions {
        filtered: args.system.is_some(),
        open: open_request(args.open),
        reprovision: args.reprovision,
        ..ScaleOptions::default()
    };

    let docker = app.docker(manifest.dir());
    let controller = ScaleController::new(
        &docker,
        &docker,
        &app.opener,
        &reporter,
        app.config.agent.balancer.port,
    );
    let report = if deprecated_reload {
        controller.reload(&manifest, &systems, &opts).await?
    } else {
        controller.restart(&manifest, &systems, &opts).await?
    };
    Ok(finish(app, restart_label(deprecated_reload), &report))
}

/// Name of the command the user ran, for the summary line.
const fn restart_label(deprecated_reload: bool) -> &'static str {
    if deprecated_reload { "reload" } else { "restart" }
}

fn finish(app: &AppContext, action: &str, report: &ScaleReport) -> i32 {
    let code = report.exit_code();
    app.output.scale_summary(action, report);
    info!(action, code, failures = report.failures.len(), "scale finished");
    code
}
