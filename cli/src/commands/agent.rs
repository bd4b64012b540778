//! `devrig agent`: manage the supporting infrastructure.

use anyhow::Result;
use clap::Subcommand;

use crate::app::AppContext;

/// Agent subcommands.
#[derive(Subcommand, Debug)]
pub enum AgentCommand {
    /// Start the VM, shared filesystem and balancer
    Start,
    /// Stop the balancer, VM and shared filesystem
    Stop,
}

/// Run `devrig agent <command>`.
///
/// # Errors
///
/// Returns an error if any lifecycle step fails.
pub async fn run(cmd: AgentCommand, app: &AppContext) -> Result<()> {
    let reporter = app.terminal_reporter();
    let agent = app.agent();
    match cmd {
        AgentCommand::Start => {
            agent.start(&reporter).await?;
            app.output.success("agent started");
        }
        AgentCommand::Stop => {
            agent.stop().await?;
            app.output.success("agent stopped");
        }
    }
    Ok(())
}
