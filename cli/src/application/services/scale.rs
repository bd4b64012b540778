//! Application service: scaling controller for start, stop, restart and reload.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.
//! Systems are processed strictly in the order given; the manifest already
//! places dependencies first.

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};

use crate::application::ports::{ContainerRuntime, InstanceEnforcer, ProgressReporter, UrlOpener};
use crate::domain::error::{DEFAULT_FAILURE_CODE, carried_code};
use crate::domain::scale::{OpenRequest, ScaleAction, ScaleOptions, ScaleReport, SoftFailure, target_for};
use crate::domain::{Manifest, System};

/// Drives the instance counts of a batch of systems.
pub struct ScaleController<'a, E, C, O, P> {
    enforcer: &'a E,
    runtime: &'a C,
    opener: &'a O,
    reporter: &'a P,
    balancer_port: u16,
}

impl<'a, E, C, O, P> ScaleController<'a, E, C, O, P>
where
    E: InstanceEnforcer,
    C: ContainerRuntime,
    O: UrlOpener,
    P: ProgressReporter,
{
    pub fn new(enforcer: &'a E, runtime: &'a C, opener: &'a O, reporter: &'a P, balancer_port: u16) -> Self {
        Self {
            enforcer,
            runtime,
            opener,
            reporter,
            balancer_port,
        }
    }

    /// Bring `systems` up in order.
    ///
    /// A hard failure stops the batch, rolls every system back with
    /// [`Self::stop`] and is reported through [`ScaleReport::aborted`].
    ///
    /// # Errors
    ///
    /// Returns an error only if the rollback itself fails.
    pub async fn start(&self, manifest: &Manifest, systems: &[System], opts: &ScaleOptions) -> Result<ScaleReport> {
        match self.start_batch(manifest, systems, opts).await {
            Ok(report) => Ok(report),
            Err(err) => {
                error!(error = %format!("{err:#}"), "start failed, rolling back");
                self.reporter.fail(&format!("{err:#}"));
                let code = carried_code(&err).unwrap_or(DEFAULT_FAILURE_CODE);
                self.stop(manifest, systems, opts)
                    .await
                    .context("rolling back after failed start")?;
                Ok(ScaleReport {
                    failures: Vec::new(),
                    aborted: Some(code),
                })
            }
        }
    }

    async fn start_batch(&self, manifest: &Manifest, systems: &[System], opts: &ScaleOptions) -> Result<ScaleReport> {
        let mut report = ScaleReport::default();
        for system in systems {
            self.scale(system, ScaleAction::Start, opts, &mut report).await?;
        }
        if let Some(request) = &opts.open {
            self.open_default(manifest, request).await?;
        }
        Ok(report)
    }

    /// Tear `systems` down, dependents first.
    ///
    /// # Errors
    ///
    /// Returns the first hard failure; no compensating action is taken.
    pub async fn stop(&self, _manifest: &Manifest, systems: &[System], opts: &ScaleOptions) -> Result<ScaleReport> {
        let mut report = ScaleReport::default();
        for system in systems.iter().rev() {
            self.scale(system, ScaleAction::Stop, opts, &mut report).await?;
        }
        Ok(report)
    }

    /// Stop `systems` and start them again at their previous instance counts.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot or the stop pass fails; start is not
    /// attempted in that case.
    pub async fn restart(&self, manifest: &Manifest, systems: &[System], opts: &ScaleOptions) -> Result<ScaleReport> {
        let containers = self.runtime.list_containers().await.context("listing containers")?;
        let mut start_opts = opts.clone();
        for system in systems {
            let count = running_daemons(system, &containers);
            debug!(system = system.name(), count, "restart snapshot");
            start_opts.instances.insert(system.name().to_string(), count);
        }

        self.stop(manifest, systems, opts).await?;
        self.start(manifest, systems, &start_opts).await
    }

    /// Deprecated alias of [`Self::restart`].
    ///
    /// # Errors
    ///
    /// Same as [`Self::restart`].
    pub async fn reload(&self, manifest: &Manifest, systems: &[System], opts: &ScaleOptions) -> Result<ScaleReport> {
        warn!("reload is deprecated, running restart");
        self.reporter
            .warn("`reload` is deprecated and will be removed; use `restart` instead");
        self.restart(manifest, systems, opts).await
    }

    async fn scale(
        &self,
        system: &System,
        action: ScaleAction,
        opts: &ScaleOptions,
        report: &mut ScaleReport,
    ) -> Result<()> {
        let target = target_for(action, system, opts);
        let verb = match action {
            ScaleAction::Start => "starting",
            ScaleAction::Stop => "stopping",
        };
        self.reporter.step(&format!("{verb} {}...", system.name()));

        let changed = self
            .enforcer
            .enforce(system, target, opts)
            .await
            .with_context(|| format!("failed to {action} system '{}'", system.name()))?;
        info!(system = system.name(), %action, %target, changed, "scale applied");

        let expected_change = action == ScaleAction::Stop || target.resolve(system) > 0;
        if changed == 0 && expected_change {
            let tag = action.failure_tag();
            let message = match action {
                ScaleAction::Start => format!("{}: already running", system.name()),
                ScaleAction::Stop => format!("{}: not running", system.name()),
            };
            warn!(system = system.name(), tag, "no instances changed");
            self.reporter.warn(&message);
            report.failures.push(SoftFailure {
                system: system.name().to_string(),
                tag,
            });
        } else if changed > 0 {
            let past = match action {
                ScaleAction::Start => "started",
                ScaleAction::Stop => "stopped",
            };
            self.reporter
                .success(&format!("{}: {changed} instance(s) {past}", system.name()));
        }
        Ok(())
    }

    async fn open_default(&self, manifest: &Manifest, request: &OpenRequest) -> Result<()> {
        let Some(system) = manifest.system_default() else {
            self.reporter.warn("no default system to open");
            return Ok(());
        };
        let Some(url) = system.url(self.balancer_port) else {
            self.reporter.warn(&format!(
                "system '{}' is not balanceable, there is nothing to open",
                system.name()
            ));
            return Ok(());
        };

        let containers = self.runtime.list_containers().await.context("listing containers")?;
        if running_daemons(system, &containers) == 0 {
            self.reporter.warn(&format!(
                "system '{}' has no running instances, not opening {url}",
                system.name()
            ));
            return Ok(());
        }

        let app = match request {
            OpenRequest::Default => None,
            OpenRequest::With(app) => Some(app.as_str()),
        };
        if let Err(err) = self.opener.open(&url, app).await {
            warn!(%url, error = %err, "could not open url");
            self.reporter.warn(&format!("could not open {url}: {err}"));
        }
        Ok(())
    }
}

fn running_daemons(system: &System, containers: &[crate::domain::Container]) -> u32 {
    let count = system
        .filter(containers)
        .into_iter()
        .filter(|c| c.is_daemon() && c.running)
        .count();
    u32::try_from(count).unwrap_or(u32::MAX)
}
