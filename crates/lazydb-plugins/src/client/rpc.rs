//! Synchronous JSON-RPC calls over one plugin connection.

use std::io;
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::duration_millis;
use crate::error::{PluginError, TransportError};
use crate::protocol::{Method, RpcRequest, RpcResponse};
use crate::transport::FramedTransport;

pub(crate) const TRANSPORT_TARGET: &str = "lazydb_plugins::transport";

#[derive(Debug)]
struct Connection {
    transport: FramedTransport<TcpStream, TcpStream>,
    next_id: u64,
}

/// One live RPC connection to a plugin process.
///
/// Calls hold the connection lock from request to response, so a record
/// never has two requests in flight. Any transport failure marks the
/// connection dead; later calls fail without touching the socket.
#[derive(Debug)]
pub(crate) struct RpcClient {
    plugin: String,
    connection: Mutex<Connection>,
    control: TcpStream,
    dead: AtomicBool,
    call_timeout: Option<Duration>,
}

impl RpcClient {
    /// Connects to a plugin listening on `address`.
    pub(crate) fn connect(
        plugin: &str,
        address: SocketAddr,
        connect_timeout: Duration,
        call_timeout: Option<Duration>,
    ) -> Result<Self, TransportError> {
        let stream = TcpStream::connect_timeout(&address, connect_timeout)?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(call_timeout)?;
        let control = stream.try_clone()?;
        debug!(
            target: TRANSPORT_TARGET,
            plugin,
            %address,
            "connected to plugin"
        );
        Ok(Self {
            plugin: plugin.to_owned(),
            connection: Mutex::new(Connection {
                transport: FramedTransport::tcp(stream)?,
                next_id: 1,
            }),
            control,
            dead: AtomicBool::new(false),
            call_timeout,
        })
    }

    /// Returns the registry name of the plugin.
    pub(crate) fn plugin(&self) -> &str {
        &self.plugin
    }

    /// Returns `false` once the connection has failed or been severed.
    pub(crate) fn is_alive(&self) -> bool {
        !self.dead.load(Ordering::Acquire)
    }

    /// Closes the socket from outside the call lock.
    ///
    /// A call blocked on the socket returns with a transport error.
    pub(crate) fn sever(&self) {
        if self.dead.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!(target: TRANSPORT_TARGET, plugin = %self.plugin, "severing plugin connection");
        if let Err(error) = self.control.shutdown(Shutdown::Both) {
            debug!(
                target: TRANSPORT_TARGET,
                plugin = %self.plugin,
                %error,
                "socket already closed"
            );
        }
    }

    /// Issues one call and waits for its response.
    ///
    /// Backend failures carried in the response come back as their original
    /// [`PluginError`] variants and leave the connection usable.
    pub(crate) fn call(&self, method: Method, params: Value) -> Result<Value, PluginError> {
        self.invoke(method, params, None)
    }

    /// Issues one call whose response must arrive within `limit`.
    ///
    /// The configured call timeout applies again once the call returns.
    pub(crate) fn call_within(
        &self,
        method: Method,
        params: Value,
        limit: Duration,
    ) -> Result<Value, PluginError> {
        self.invoke(method, params, Some(limit))
    }

    fn invoke(
        &self,
        method: Method,
        params: Value,
        limit: Option<Duration>,
    ) -> Result<Value, PluginError> {
        if !self.is_alive() {
            return Err(self.closed());
        }
        let mut connection = self.lock();
        if !self.is_alive() {
            return Err(self.closed());
        }
        let timeout = limit.or(self.call_timeout);

        let id = connection.next_id;
        connection.next_id = connection.next_id.wrapping_add(1);
        debug!(target: TRANSPORT_TARGET, plugin = %self.plugin, %method, id, "sending call");

        if limit.is_some() {
            self.control
                .set_read_timeout(limit)
                .map_err(|error| self.fail_within(error.into(), timeout))?;
        }
        let exchanged = exchange(&mut connection, &RpcRequest::new(id, method, params));
        if limit.is_some() {
            self.control
                .set_read_timeout(self.call_timeout)
                .map_err(|error| self.fail_within(error.into(), timeout))?;
        }
        let response = exchanged.map_err(|error| self.fail_within(error, timeout))?;
        drop(connection);

        let outcome = match response.into_outcome() {
            Ok(outcome) => outcome,
            Err(message) => return Err(self.fail(TransportError::malformed(message))),
        };
        outcome.map_err(|error| match error.fault() {
            Some(fault) => fault.into_error(),
            None => self.settle(TransportError::Rejected {
                code: error.code,
                message: error.message,
            }),
        })
    }

    /// Marks the connection dead and wraps `error` for the caller.
    pub(crate) fn fail(&self, error: TransportError) -> PluginError {
        self.fail_within(error, self.call_timeout)
    }

    /// Wraps `error`, severing the connection only when it is fatal.
    fn settle(&self, error: TransportError) -> PluginError {
        if error.is_fatal() {
            return self.fail(error);
        }
        debug!(
            target: TRANSPORT_TARGET,
            plugin = %self.plugin,
            %error,
            "plugin rejected call"
        );
        PluginError::transport(&self.plugin, error)
    }

    fn fail_within(&self, error: TransportError, timeout: Option<Duration>) -> PluginError {
        let classified = classify(error, timeout);
        warn!(
            target: TRANSPORT_TARGET,
            plugin = %self.plugin,
            error = %classified,
            "plugin connection failed"
        );
        self.sever();
        PluginError::transport(&self.plugin, classified)
    }

    fn closed(&self) -> PluginError {
        PluginError::transport(&self.plugin, TransportError::ConnectionClosed)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.connection
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}

fn exchange(
    connection: &mut Connection,
    request: &RpcRequest,
) -> Result<RpcResponse, TransportError> {
    connection.transport.send_json(request)?;
    let response: RpcResponse = connection.transport.receive_json()?;
    if response.id != request.id {
        return Err(TransportError::malformed(format!(
            "response id {} does not match request id {}",
            response.id, request.id
        )));
    }
    Ok(response)
}

/// Reports a read that outlived `timeout` as [`TransportError::TimedOut`].
fn classify(error: TransportError, timeout: Option<Duration>) -> TransportError {
    let expired = matches!(
        &error,
        TransportError::Io(source)
            if matches!(source.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
    );
    match timeout {
        Some(timeout) if expired => TransportError::TimedOut {
            timeout_ms: duration_millis(timeout),
        },
        _ => error,
    }
}
