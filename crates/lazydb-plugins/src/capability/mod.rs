//! The capability contract every database backend satisfies.
//!
//! Exactly one implementation runs inside each plugin process, where the
//! plugin-side server dispatches RPC calls to it. The host never holds a
//! backend directly: it talks to [`PluginClient`], which implements the same
//! trait by forwarding calls across the process boundary.
//!
//! [`PluginClient`]: crate::PluginClient


use crate::error::PluginError;
use crate::protocol::QueryResult;

/// Uniform interface to a database backend.
///
/// # Example
///
/// ```
/// use lazydb_plugins::{DatabasePlugin, PluginError, QueryResult};
///
/// struct Constant;
///
/// impl DatabasePlugin for Constant {
///     fn name(&self) -> String {
///         String::from("constant")
///     }
///
///     fn connect(&mut self, _target: &str) -> Result<(), PluginError> {
///         Ok(())
///     }
///
///     fn run(&mut self, _query: &str) -> Result<QueryResult, PluginError> {
///         Ok(QueryResult::single("answer", 42_i64))
///     }
///
///     fn close(&mut self) -> Result<(), PluginError> {
///         Ok(())
///     }
/// }
///
/// let mut backend = Constant;
/// assert_eq!(backend.run("anything").unwrap().row_count(), 1);
/// ```
pub trait DatabasePlugin: Send {
    /// Returns a stable backend identifier. Must not fail.
    fn name(&self) -> String;

    /// Opens the backend connection described by `target`.
    ///
    /// Calling this twice may replace or leak the prior connection; hosts
    /// connect at most once per session.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Connect`] when the target is malformed or the
    /// backend is unreachable.
    fn connect(&mut self, target: &str) -> Result<(), PluginError>;

    /// Executes one opaque query on the open connection.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Execution`] when no connection exists or the
    /// backend rejects or fails the query.
    fn run(&mut self, query: &str) -> Result<QueryResult, PluginError>;

    /// Releases the backend connection. A no-op when never connected.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Close`] when the backend fails to release the
    /// connection.
    fn close(&mut self) -> Result<(), PluginError>;
}

impl<P: DatabasePlugin + ?Sized> DatabasePlugin for Box<P> {
    fn name(&self) -> String {
        (**self).name()
    }

    fn connect(&mut self, target: &str) -> Result<(), PluginError> {
        (**self).connect(target)
    }

    fn run(&mut self, query: &str) -> Result<QueryResult, PluginError> {
        (**self).run(query)
    }

    fn close(&mut self) -> Result<(), PluginError> {
        (**self).close()
    }
}
