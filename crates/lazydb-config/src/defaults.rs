use std::path::PathBuf;

use crate::logging::LogFormat;

/// Directory scanned for plugin executables when none is configured.
pub const DEFAULT_PLUGIN_DIR: &str = "plugins";

/// Milliseconds a plugin has to write its handshake line.
pub const DEFAULT_HANDSHAKE_TIMEOUT_MS: u64 = 5_000;

/// Milliseconds a plugin has to close and exit during shutdown.
pub const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 2_000;

/// Per-call timeout in milliseconds; zero disables it.
pub const DEFAULT_CALL_TIMEOUT_MS: u64 = 0;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default plugin directory.
#[must_use]
pub fn default_plugin_dir() -> PathBuf {
    PathBuf::from(DEFAULT_PLUGIN_DIR)
}

/// Default handshake timeout in milliseconds.
#[must_use]
pub const fn default_handshake_timeout_ms() -> u64 {
    DEFAULT_HANDSHAKE_TIMEOUT_MS
}

/// Default shutdown grace period in milliseconds.
#[must_use]
pub const fn default_shutdown_grace_ms() -> u64 {
    DEFAULT_SHUTDOWN_GRACE_MS
}

/// Default call timeout in milliseconds.
#[must_use]
pub const fn default_call_timeout_ms() -> u64 {
    DEFAULT_CALL_TIMEOUT_MS
}

/// Default log filter expression.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}
