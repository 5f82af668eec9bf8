//! Echo backend for the lazydb plugin host.
//!
//! The plugin needs no database: `run` answers every query with a
//! single-column, single-row result whose cell is the query text. It is the
//! smallest complete [`DatabasePlugin`] and doubles as a fixture for process
//! level tests, which can slow its `close` down through
//! [`CLOSE_DELAY_ENV`].

#[cfg(test)]
mod tests;

use std::env;
use std::thread;
use std::time::Duration;

use lazydb_plugins::{DatabasePlugin, PluginError, QueryResult};
use tracing::{debug, info};

/// Backend identifier reported through `Name`.
pub const BACKEND_NAME: &str = "echo";

/// Column holding the reflected query.
pub const ECHO_COLUMN: &str = "echo";

/// Environment variable delaying `close` by the given number of milliseconds.
pub const CLOSE_DELAY_ENV: &str = "ECHO_PLUGIN_CLOSE_DELAY_MS";

const ECHO_TARGET: &str = "lazydb_plugin_echo";

/// Backend that reflects queries.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EchoPlugin {
    target: Option<String>,
    close_delay: Duration,
}

impl EchoPlugin {
    /// Creates a plugin with no connection and no close delay.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            target: None,
            close_delay: Duration::ZERO,
        }
    }

    /// Makes `close` block for `delay` before returning.
    #[must_use]
    pub const fn with_close_delay(mut self, delay: Duration) -> Self {
        self.close_delay = delay;
        self
    }

    /// Creates a plugin configured from [`CLOSE_DELAY_ENV`].
    ///
    /// Unset or unparsable values mean no delay.
    #[must_use]
    pub fn from_env() -> Self {
        let delay = env::var(CLOSE_DELAY_ENV)
            .ok()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .map_or(Duration::ZERO, Duration::from_millis);
        Self::new().with_close_delay(delay)
    }

    /// Target recorded by the last successful `connect`.
    #[must_use]
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }
}

impl DatabasePlugin for EchoPlugin {
    fn name(&self) -> String {
        BACKEND_NAME.to_owned()
    }

    fn connect(&mut self, target: &str) -> Result<(), PluginError> {
        if target.trim().is_empty() {
            return Err(PluginError::Connect {
                message: String::from("connection target is empty"),
            });
        }
        if let Some(previous) = self.target.replace(target.to_owned()) {
            debug!(target: ECHO_TARGET, %previous, "replacing connection target");
        }
        info!(target: ECHO_TARGET, connection = target, "connected");
        Ok(())
    }

    fn run(&mut self, query: &str) -> Result<QueryResult, PluginError> {
        Ok(QueryResult::single(ECHO_COLUMN, query))
    }

    fn close(&mut self) -> Result<(), PluginError> {
        if !self.close_delay.is_zero() {
            debug!(
                target: ECHO_TARGET,
                delay_ms = u64::try_from(self.close_delay.as_millis()).unwrap_or(u64::MAX),
                "delaying close"
            );
            thread::sleep(self.close_delay);
        }
        self.target = None;
        Ok(())
    }
}
