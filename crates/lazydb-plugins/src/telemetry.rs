//! Logging for plugin executables.
//!
//! A plugin's standard output carries the handshake line, so its logs go to
//! standard error, which the host relays into its own debug log.

use std::io;

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

/// Environment variable holding the plugin log filter.
pub const PLUGIN_LOG_ENV: &str = "LAZYDB_PLUGIN_LOG";

const DEFAULT_FILTER: &str = "info";

static PLUGIN_TELEMETRY: OnceCell<()> = OnceCell::new();

/// Installs a compact stderr subscriber for a plugin process.
///
/// The filter comes from [`PLUGIN_LOG_ENV`], falling back to `info` when the
/// variable is unset or invalid. Repeated calls are no-ops.
///
/// # Errors
///
/// Returns an error when another global subscriber is already installed.
pub fn init_plugin_logging() -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    PLUGIN_TELEMETRY
        .get_or_try_init(|| {
            let filter = EnvFilter::try_from_env(PLUGIN_LOG_ENV)
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
            let subscriber = fmt::Subscriber::builder()
                .with_env_filter(filter)
                .with_target(true)
                .with_ansi(false)
                .with_writer(io::stderr)
                .compact()
                .finish();
            tracing::subscriber::set_global_default(subscriber)
        })
        .map(|_| ())
}
