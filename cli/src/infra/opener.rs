//! URL opener: implements `UrlOpener` with the platform launcher.

use anyhow::{Context, Result};

use crate::application::ports::{CommandRunner, UrlOpener};
use crate::infra::command_runner::ensure_success;

/// Opens URLs with `open` on macOS and `xdg-open` elsewhere.
pub struct SystemOpener<R: CommandRunner> {
    runner: R,
}

impl<R: CommandRunner> SystemOpener<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }
}

/// Program and arguments used to open `url`.
#[must_use]
pub fn open_command<'a>(url: &'a str, app: Option<&'a str>) -> (&'static str, Vec<&'a str>) {
    if cfg!(target_os = "macos") {
        match app {
            Some(app) => ("open", vec!["-a", app, url]),
            None => ("open", vec![url]),
        }
    } else {
        match app {
            Some(app) => ("/usr/bin/env", vec![app, url]),
            None => ("xdg-open", vec![url]),
        }
    }
}

impl<R: CommandRunner> UrlOpener for SystemOpener<R> {
    async fn open(&self, url: &str, app: Option<&str>) -> Result<()> {
        let (program, args) = open_command(url, app);
        let output = self
            .runner
            .run(program, &args)
            .await
            .with_context(|| format!("running {program}"))?;
        ensure_success(program, output)?;
        Ok(())
    }
}
