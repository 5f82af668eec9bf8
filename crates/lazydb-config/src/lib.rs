//! Layered configuration for the lazydb host.
//!
//! Values are resolved with `ortho_config` from, in increasing precedence:
//! built-in defaults, a configuration file (`--config-path` or
//! `LAZYDB_CONFIG_PATH`), `LAZYDB_*` environment variables, and command-line
//! flags. Binaries read durations through the typed accessors rather than
//! the raw millisecond fields.

mod defaults;
mod logging;

use std::path::{Path, PathBuf};
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use self::defaults::{
    DEFAULT_CALL_TIMEOUT_MS, DEFAULT_HANDSHAKE_TIMEOUT_MS, DEFAULT_LOG_FILTER, DEFAULT_PLUGIN_DIR,
    DEFAULT_SHUTDOWN_GRACE_MS, default_log_filter, default_log_format, default_plugin_dir,
};
pub use self::logging::{LogFormat, LogFormatParseError};

/// Resolved host configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "LAZYDB")]
pub struct Config {
    /// Directory scanned for plugin executables.
    #[serde(default = "defaults::default_plugin_dir")]
    plugin_dir: PathBuf,
    /// Handshake wait per plugin, in milliseconds.
    #[serde(default = "defaults::default_handshake_timeout_ms")]
    handshake_timeout_ms: u64,
    /// Close-and-exit grace period per plugin at shutdown, in milliseconds.
    #[serde(default = "defaults::default_shutdown_grace_ms")]
    shutdown_grace_ms: u64,
    /// Per-call timeout in milliseconds; zero waits indefinitely.
    #[serde(default = "defaults::default_call_timeout_ms")]
    call_timeout_ms: u64,
    /// Tracing filter expression.
    #[serde(default = "defaults::default_log_filter_string")]
    log_filter: String,
    /// Log output format.
    #[serde(default = "defaults::default_log_format")]
    log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            plugin_dir: defaults::default_plugin_dir(),
            handshake_timeout_ms: defaults::default_handshake_timeout_ms(),
            shutdown_grace_ms: defaults::default_shutdown_grace_ms(),
            call_timeout_ms: defaults::default_call_timeout_ms(),
            log_filter: defaults::default_log_filter_string(),
            log_format: defaults::default_log_format(),
        }
    }
}

impl Config {
    /// Directory scanned for plugin executables.
    #[must_use]
    pub fn plugin_dir(&self) -> &Path {
        &self.plugin_dir
    }

    /// Time a plugin has to complete its handshake.
    #[must_use]
    pub const fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    /// Time a plugin has to close and exit during shutdown.
    #[must_use]
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Per-call timeout, or `None` when disabled.
    #[must_use]
    pub const fn call_timeout(&self) -> Option<Duration> {
        match self.call_timeout_ms {
            0 => None,
            millis => Some(Duration::from_millis(millis)),
        }
    }

    /// Tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }
}
