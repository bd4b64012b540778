//! CLI argument parsing with clap derive

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};

use crate::app::{AppContext, OutputFlags};
use crate::commands;

/// Local development environments from a Devrigfile
#[derive(Parser)]
#[command(
    name = "devrig",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start systems (and their dependencies), fetching a repository first if given
    Start(commands::scale::StartArgs),

    /// Stop systems
    Stop(commands::scale::StopArgs),

    /// Stop and start systems, keeping their instance counts
    Restart(commands::scale::RestartArgs),

    /// Deprecated: restart systems, recreating their instances
    Reload(commands::scale::ReloadArgs),

    /// Manage the VM, shared filesystem and load balancer
    #[command(subcommand)]
    Agent(commands::agent::AgentCommand),

    /// Show version
    Version,
}

impl Cli {
    /// Execute the CLI command and return the process exit code.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails outside of a scale batch.
    pub async fn run(self) -> Result<i32> {
        let Cli {
            no_color,
            quiet,
            command,
            ..
        } = self;
        if matches!(command, Command::Version) {
            commands::version::run();
            return Ok(0);
        }

        let app = AppContext::new(&OutputFlags { no_color, quiet })?;
        match command {
            Command::Start(args) => commands::scale::start(args, &app).await,
            Command::Stop(args) => commands::scale::stop(args, &app).await,
            Command::Restart(args) => commands::scale::restart(args, &app, false).await,
            Command::Reload(args) => commands::scale::restart(args.into(), &app, true).await,
            Command::Agent(cmd) => commands::agent::run(cmd, &app).await.map(|()| 0),
            Command::Version => Ok(0),
        }
    }
}
