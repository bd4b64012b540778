//! `TerminalReporter`: Presentation-layer implementation of `ProgressReporter`
//! and `LifecycleSink`.
//!
//! Wraps `&OutputContext` so application services can emit progress events
//! without depending on any presentation type directly.

use std::cell::RefCell;

use indicatif::ProgressBar;
use owo_colors::OwoColorize as _;

use crate::application::ports::{LifecycleSink, ProgressReporter};
use crate::domain::agent::{AgentEvent, VmStatus};
use crate::output::{OutputContext, progress};

/// Terminal progress reporter that wraps an `OutputContext`.
///
/// - `step()` prints `"  → {message}"` (suppressed when `ctx.quiet`)
/// - `success()` prints `"  ✓ {message}"` (suppressed when `ctx.quiet`)
/// - `warn()` prints `"  ! {message}"` (suppressed when `ctx.quiet`)
/// - `fail()` prints `"  ✗ {message}"` to stderr (never suppressed)
pub struct TerminalReporter<'a> {
    ctx: &'a OutputContext,
    /// Spinner shown between a `Wait` event and its `Initialized` event.
    spinner: RefCell<Option<(ProgressBar, &'static str)>>,
}

impl<'a> TerminalReporter<'a> {
    /// Create a new `TerminalReporter` wrapping the given output context.
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self {
            ctx,
            spinner: RefCell::new(None),
        }
    }
}

impl ProgressReporter for TerminalReporter<'_> {
    fn step(&self, message: &str) {
        if !self.ctx.quiet {
            println!("  {} {message}", "→".style(self.ctx.styles.step));
        }
    }

    fn success(&self, message: &str) {
        if !self.ctx.quiet {
            println!("  {} {message}", "✓".style(self.ctx.styles.success));
        }
    }

    fn warn(&self, message: &str) {
        if !self.ctx.quiet {
            println!("  {} {message}", "!".style(self.ctx.styles.warning));
        }
    }

    fn fail(&self, message: &str) {
        self.ctx.error(message);
    }
}

impl LifecycleSink for TerminalReporter<'_> {
    fn notify(&self, event: AgentEvent) {
        match event.status {
            VmStatus::Wait => {
                let message = format!("waiting for {} to boot...", event.context);
                if self.ctx.show_progress() {
                    *self.spinner.borrow_mut() = Some((progress::spinner(&message), event.context));
                } else {
                    self.step(&message);
                }
            }
            VmStatus::Initialized => {
                let message = format!("{} initialized", event.context);
                match self.spinner.borrow_mut().take() {
                    Some((pb, _)) => progress::finish_ok(&pb, &message),
                    None => self.success(&message),
                }
            }
        }
    }
}

impl Drop for TerminalReporter<'_> {
    fn drop(&mut self) {
        // A spinner still pending here means the component never came up.
        if let Some((pb, context)) = self.spinner.get_mut().take() {
            progress::finish_error(&pb, &format!("{context} did not become reachable"));
        }
    }
}
