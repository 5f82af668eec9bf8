//! Out-of-process database plugins for lazydb.
//!
//! Each database backend runs as its own child process and implements the
//! [`DatabasePlugin`] capability. The host never links a driver: it launches
//! plugin executables found in a directory, checks a compiled-in handshake
//! on each one's standard output, and talks to it over a loopback connection
//! carrying Content-Length framed JSON-RPC.
//!
//! # Architecture
//!
//! - [`PluginManager`] discovers and launches plugins, owns every process,
//!   and terminates them on shutdown.
//! - [`PluginClient`] is the host-side proxy; it implements
//!   [`DatabasePlugin`] by forwarding calls to the plugin process.
//! - [`server::serve`] is the plugin-side loop a backend binary hands its
//!   implementation to.
//! - [`protocol`] defines the wire types, including the boundary-safe
//!   [`QueryResult`].
//!
//! A crash in one plugin only fails that plugin's record; its calls then fail
//! fast with a transport error while every other plugin keeps working.
//!
//! # Example
//!
//! ```rust,no_run
//! use lazydb_plugins::{DatabasePlugin, ManagerSettings, PluginManager};
//!
//! let manager = PluginManager::new(ManagerSettings::default());
//! let report = manager.load_plugins("plugins/")?;
//! for failure in &report.failures {
//!     eprintln!("{}: {}", failure.candidate, failure.error);
//! }
//!
//! let mut echo = manager.get_plugin("echo").expect("echo is installed");
//! let result = echo.run("ping")?;
//! assert_eq!(result.columns(), ["echo"]);
//! manager.shutdown();
//! # Ok::<(), lazydb_plugins::PluginError>(())
//! ```

use std::time::Duration;

pub mod capability;
pub mod client;
pub mod error;
pub mod handshake;
mod launcher;
pub mod lifecycle;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod state;
pub mod telemetry;
pub mod transport;

pub use self::capability::DatabasePlugin;
pub use self::client::PluginClient;
pub use self::error::{PluginError, TransportError};
pub use self::handshake::{HANDSHAKE, HandshakeDescriptor, HandshakeError};
pub use self::lifecycle::ShutdownReport;
pub use self::protocol::{CellValue, ExecutionErrorKind, QueryResult, Row};
pub use self::registry::{LoadFailure, LoadReport, ManagerSettings, PluginInfo, PluginManager};
pub use self::state::PluginState;

/// Converts a duration to whole milliseconds for errors and logs.
pub(crate) fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
