//! Diagnostic logging setup.

use tracing_subscriber::EnvFilter;

/// Environment variable holding a log filter, e.g. `devrig_cli=debug`.
pub const LOG_ENV: &str = "DEVRIG_LOG";

/// Filter directive for a `-v` count when no environment filter is set.
#[must_use]
pub fn default_directive(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

/// Install the global stderr subscriber.
///
/// `DEVRIG_LOG` takes precedence over `RUST_LOG`; without either the level
/// follows the `-v` count.
pub fn init(verbose: u8) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
