//! Host-side proxy for a running plugin.
//!
//! [`PluginClient`] implements [`DatabasePlugin`] by forwarding each call
//! over the plugin's RPC connection. Clones share the connection, and calls
//! from several clones are serialised on it.

mod rpc;

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::capability::DatabasePlugin;
use crate::error::{PluginError, TransportError};
use crate::protocol::{Method, QueryResult};

pub(crate) use self::rpc::RpcClient;

/// Proxy bound to one plugin process.
#[derive(Clone)]
pub struct PluginClient {
    backend: String,
    rpc: Arc<RpcClient>,
}

impl PluginClient {
    /// Connects to a plugin and asks for its backend name.
    ///
    /// Both the connect and the name call are bounded by `launch_timeout`;
    /// a plugin that never answers fails with
    /// [`PluginError::HandshakeTimeout`].
    pub(crate) fn open(
        plugin: &str,
        address: SocketAddr,
        launch_timeout: Duration,
        call_timeout: Option<Duration>,
    ) -> Result<Self, PluginError> {
        let rpc = RpcClient::connect(plugin, address, launch_timeout, call_timeout)
            .map_err(|source| PluginError::transport(plugin, source))?;
        let named = rpc
            .call_within(Method::Name, Value::Null, launch_timeout)
            .map_err(|error| match error {
                PluginError::Transport {
                    source: TransportError::TimedOut { timeout_ms },
                    ..
                } => PluginError::HandshakeTimeout {
                    name: plugin.to_owned(),
                    timeout_ms,
                },
                other => other,
            })?;
        let backend = match named {
            Value::String(name) => name,
            other => {
                return Err(rpc.fail(TransportError::malformed(format!(
                    "expected a backend name, got {other}"
                ))));
            }
        };
        Ok(Self {
            backend,
            rpc: Arc::new(rpc),
        })
    }

    /// Returns the registry name, derived from the executable file name.
    #[must_use]
    pub fn plugin(&self) -> &str {
        self.rpc.plugin()
    }

    /// Returns the backend identifier reported at launch.
    #[must_use]
    pub fn backend(&self) -> &str {
        &self.backend
    }

    /// Returns `false` once the connection has failed or been severed.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.rpc.is_alive()
    }

    pub(crate) fn sever(&self) {
        self.rpc.sever();
    }

    fn call_unit(&self, method: Method, params: Value) -> Result<(), PluginError> {
        self.rpc.call(method, params).map(drop)
    }
}

impl DatabasePlugin for PluginClient {
    fn name(&self) -> String {
        self.backend.clone()
    }

    fn connect(&mut self, target: &str) -> Result<(), PluginError> {
        self.call_unit(Method::Connect, Value::String(target.to_owned()))
    }

    fn run(&mut self, query: &str) -> Result<QueryResult, PluginError> {
        let value = self.rpc.call(Method::Run, Value::String(query.to_owned()))?;
        let result: QueryResult = serde_json::from_value(value)
            .map_err(|error| self.rpc.fail(TransportError::from(error)))?;
        result
            .validate()
            .map_err(|error| self.rpc.fail(TransportError::malformed(error.to_string())))?;
        Ok(result)
    }

    fn close(&mut self) -> Result<(), PluginError> {
        self.call_unit(Method::Close, Value::Null)
    }
}

impl fmt::Debug for PluginClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginClient")
            .field("plugin", &self.plugin())
            .field("backend", &self.backend)
            .field("alive", &self.is_alive())
            .finish()
    }
}
