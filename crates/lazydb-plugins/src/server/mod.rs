//! Plugin-side RPC server.
//!
//! A plugin binary hands its backend to [`serve`], which announces a
//! loopback listener through the handshake line, accepts the host's single
//! connection, and answers calls strictly in order until the host goes away.

use std::io::{self, Read, Write};
use std::net::{Ipv4Addr, TcpListener};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::capability::DatabasePlugin;
use crate::error::{PluginError, TransportError};
use crate::handshake::HANDSHAKE;
use crate::protocol::{
    ExecutionErrorKind, INVALID_PARAMS, METHOD_NOT_FOUND, Method, PARSE_ERROR, RemoteFault,
    RpcErrorObject, RpcRequest, RpcResponse,
};
use crate::transport::FramedTransport;

const SERVER_TARGET: &str = "lazydb_plugins::server";

/// Serves `plugin` to the host that launched this process.
///
/// Blocks until the host disconnects.
///
/// # Errors
///
/// Returns [`PluginError::NotLaunchedByHost`] when the handshake cookie is
/// absent from the environment, or a transport error when the listener or
/// the connection fails.
pub fn serve<P: DatabasePlugin>(plugin: P) -> Result<(), PluginError> {
    if !HANDSHAKE.launched_by_host() {
        return Err(PluginError::NotLaunchedByHost);
    }
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .map_err(|error| PluginError::transport(plugin.name(), error.into()))?;
    serve_with(plugin, &listener, io::stdout())
}

/// Serves `plugin` on `listener`, writing the handshake line to `announce`.
///
/// # Errors
///
/// Returns a transport error when announcing, accepting, or the connection
/// itself fails. A host disconnect is a normal return.
pub fn serve_with<P, W>(
    mut plugin: P,
    listener: &TcpListener,
    mut announce: W,
) -> Result<(), PluginError>
where
    P: DatabasePlugin,
    W: Write,
{
    let backend = plugin.name();
    let wrap = |error: io::Error| PluginError::transport(backend.clone(), error.into());

    let address = listener.local_addr().map_err(wrap)?;
    writeln!(announce, "{}", HANDSHAKE.encode(address)).map_err(wrap)?;
    announce.flush().map_err(wrap)?;

    let (stream, peer) = listener.accept().map_err(wrap)?;
    info!(target: SERVER_TARGET, backend = %backend, %peer, "host connected");
    let mut transport = FramedTransport::tcp(stream).map_err(wrap)?;

    let outcome = serve_connection(&mut plugin, &mut transport);
    if let Err(error) = plugin.close() {
        debug!(target: SERVER_TARGET, %error, "close after disconnect failed");
    }
    outcome.map_err(|error| PluginError::transport(backend.clone(), error))
}

/// Answers framed requests until the peer closes the stream.
///
/// Undecodable requests get a parse-error response; the loop only ends on a
/// transport failure.
///
/// # Errors
///
/// Returns any transport failure other than a clean disconnect.
pub fn serve_connection<P, R, W>(
    plugin: &mut P,
    transport: &mut FramedTransport<R, W>,
) -> Result<(), TransportError>
where
    P: DatabasePlugin + ?Sized,
    R: Read,
    W: Write,
{
    loop {
        let payload = match transport.receive() {
            Ok(payload) => payload,
            Err(TransportError::ConnectionClosed) => {
                info!(target: SERVER_TARGET, "host disconnected");
                return Ok(());
            }
            Err(error) => return Err(error),
        };
        let response = match serde_json::from_slice::<RpcRequest>(&payload) {
            Ok(request) => dispatch(plugin, request),
            Err(error) => {
                warn!(target: SERVER_TARGET, %error, "undecodable request");
                RpcResponse::failure(0, RpcErrorObject::new(PARSE_ERROR, error.to_string()))
            }
        };
        transport.send_json(&response)?;
    }
}

/// Routes one request to the backend through the fixed method table.
pub fn dispatch<P>(plugin: &mut P, request: RpcRequest) -> RpcResponse
where
    P: DatabasePlugin + ?Sized,
{
    let RpcRequest {
        id, method, params, ..
    } = request;
    let Some(resolved) = Method::parse(&method) else {
        warn!(target: SERVER_TARGET, id, method = %method, "unknown method");
        return RpcResponse::failure(
            id,
            RpcErrorObject::new(METHOD_NOT_FOUND, format!("unknown method '{method}'")),
        );
    };
    debug!(target: SERVER_TARGET, id, method = %resolved, "dispatching call");

    let outcome = match resolved {
        Method::Name => Ok(Value::String(plugin.name())),
        Method::Connect => {
            string_param(&params).and_then(|target| unit(plugin.connect(target)))
        }
        Method::Run => string_param(&params).and_then(|query| run(plugin, query)),
        Method::Close => unit(plugin.close()),
    };
    match outcome {
        Ok(value) => RpcResponse::success(id, value),
        Err(error) => RpcResponse::failure(id, error),
    }
}

fn string_param(params: &Value) -> Result<&str, RpcErrorObject> {
    params
        .as_str()
        .ok_or_else(|| RpcErrorObject::new(INVALID_PARAMS, "expected a single string parameter"))
}

fn unit(result: Result<(), PluginError>) -> Result<Value, RpcErrorObject> {
    result.map(|()| Value::Null).map_err(|error| fault(&error))
}

fn run<P>(plugin: &mut P, query: &str) -> Result<Value, RpcErrorObject>
where
    P: DatabasePlugin + ?Sized,
{
    let result = plugin.run(query).map_err(|error| fault(&error))?;
    result
        .validate()
        .map_err(|error| runtime_fault(error.to_string()))?;
    serde_json::to_value(&result).map_err(|error| runtime_fault(error.to_string()))
}

fn runtime_fault(message: String) -> RpcErrorObject {
    RpcErrorObject::from_fault(&RemoteFault::Execution {
        reason: ExecutionErrorKind::Runtime,
        message,
    })
}

fn fault(error: &PluginError) -> RpcErrorObject {
    RpcErrorObject::from_fault(&RemoteFault::from_error(error))
}
