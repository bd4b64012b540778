//! Git adapter: implements `GitClient` over the `git` CLI.

use std::process::Output;

use anyhow::{Context, Result};

use crate::application::ports::{CommandRunner, GitClient};
use crate::infra::command_runner::{GIT_CLONE_TIMEOUT, ensure_success};

/// Infrastructure adapter that routes git calls through a `CommandRunner`.
pub struct GitCli<R: CommandRunner> {
    runner: R,
}

impl<R: CommandRunner> GitCli<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }
}

impl<R: CommandRunner> GitClient for GitCli<R> {
    async fn version(&self) -> Result<String> {
        let output = self.runner.run("git", &["--version"]).await.context("git --version")?;
        let output = ensure_success("git", output)?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn ls_remote(&self, url: &str) -> Result<Output> {
        self.runner
            .run("git", &["ls-remote", url])
            .await
            .context("git ls-remote")
    }

    async fn clone_repo(&self, url: &str, branch: Option<&str>, dest: &str) -> Result<Output> {
        let mut args = vec!["clone", "--recursive"];
        if let Some(branch) = branch {
            args.extend(["--branch", branch, "--single-branch"]);
        }
        args.extend([url, dest]);
        self.runner
            .run_with_timeout("git", &args, GIT_CLONE_TIMEOUT)
            .await
            .context("git clone")
    }

    async fn checkout(&self, dest: &str, git_ref: &str) -> Result<Output> {
        self.runner
            .run_in(std::path::Path::new(dest), "git", &["checkout", "--quiet", git_ref])
            .await
            .context("git checkout")
    }
}
