//! Wire types shared by the host and plugin processes.
//!
//! Every call is one JSON-RPC 2.0 shaped request carrying a single `params`
//! value, answered by exactly one response carrying either a `result` or an
//! `error`. The method set is fixed by [`Method`]; there is no reflection or
//! dynamic lookup on either side of the boundary.
//!
//! Errors raised by a backend travel inside `error.data` as a [`RemoteFault`]
//! so the host can rebuild the original [`PluginError`] variant verbatim.

mod query;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::PluginError;

pub use self::query::{CellValue, QueryResult, Row, ShapeError};

/// Protocol marker carried in every request and response.
pub const JSONRPC_VERSION: &str = "2.0";

/// The payload could not be parsed as a request.
pub const PARSE_ERROR: i64 = -32700;
/// The request named a method outside [`Method`].
pub const METHOD_NOT_FOUND: i64 = -32601;
/// The request parameter had the wrong type for the method.
pub const INVALID_PARAMS: i64 = -32602;
/// The backend reported a failure; details are in `error.data`.
pub const PLUGIN_FAULT: i64 = -32000;

/// Remote methods mirroring the capability interface.
///
/// # Example
///
/// ```
/// use lazydb_plugins::protocol::Method;
///
/// assert_eq!(Method::Run.as_str(), "Plugin.Run");
/// assert_eq!(Method::parse("Plugin.Close"), Some(Method::Close));
/// assert_eq!(Method::parse("Plugin.Drop"), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// Returns the backend identifier.
    Name,
    /// Opens the backend connection.
    Connect,
    /// Executes one query.
    Run,
    /// Releases the backend connection.
    Close,
}

impl Method {
    /// Every method, in declaration order.
    pub const ALL: [Self; 4] = [Self::Name, Self::Connect, Self::Run, Self::Close];

    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Name => "Plugin.Name",
            Self::Connect => "Plugin.Connect",
            Self::Run => "Plugin.Run",
            Self::Close => "Plugin.Close",
        }
    }

    /// Resolves a wire name to a method.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|method| method.as_str() == name)
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A call from host to plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Protocol marker.
    pub jsonrpc: String,
    /// Call identifier, echoed by the response.
    pub id: u64,
    /// Wire method name.
    pub method: String,
    /// The single argument value.
    #[serde(default)]
    pub params: Value,
}

impl RpcRequest {
    /// Creates a request for `method`.
    #[must_use]
    pub fn new(id: u64, method: Method, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            id,
            method: method.as_str().to_owned(),
            params,
        }
    }
}

/// A reply from plugin to host.
///
/// `result` distinguishes an absent field from an explicit `null`, since
/// `Connect` and `Close` succeed with `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    /// Protocol marker.
    pub jsonrpc: String,
    /// Identifier of the request being answered.
    pub id: u64,
    /// Return value on success.
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub result: Option<Value>,
    /// Error payload on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorObject>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl RpcResponse {
    /// Creates a successful response.
    #[must_use]
    pub fn success(id: u64, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Creates a failed response.
    #[must_use]
    pub fn failure(id: u64, error: RpcErrorObject) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Splits the response into its value or error.
    ///
    /// # Errors
    ///
    /// Returns a description of the protocol violation when the response
    /// carries both a result and an error, or neither.
    pub fn into_outcome(self) -> Result<Result<Value, RpcErrorObject>, String> {
        match (self.result, self.error) {
            (Some(value), None) => Ok(Ok(value)),
            (None, Some(error)) => Ok(Err(error)),
            (Some(_), Some(_)) => Err(String::from(
                "response carries both a result and an error",
            )),
            (None, None) => Err(String::from(
                "response carries neither a result nor an error",
            )),
        }
    }
}

/// The `error` member of a failed response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorObject {
    /// Error code.
    pub code: i64,
    /// Human-readable error message.
    pub message: String,
    /// Structured detail; a [`RemoteFault`] for backend failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcErrorObject {
    /// Creates an error without structured detail.
    #[must_use]
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Wraps a backend failure for the wire.
    #[must_use]
    pub fn from_fault(fault: &RemoteFault) -> Self {
        Self {
            code: PLUGIN_FAULT,
            message: fault.message().to_owned(),
            data: serde_json::to_value(fault).ok(),
        }
    }

    /// Recovers the backend failure carried in `data`, if any.
    #[must_use]
    pub fn fault(&self) -> Option<RemoteFault> {
        self.data
            .clone()
            .and_then(|data| serde_json::from_value(data).ok())
    }
}

/// Category of a query execution failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionErrorKind {
    /// The query text was rejected by the backend parser.
    Syntax,
    /// The query failed while executing.
    Runtime,
    /// `Run` was called before a successful `Connect`.
    NotConnected,
}

impl ExecutionErrorKind {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Syntax => "syntax",
            Self::Runtime => "runtime",
            Self::NotConnected => "not_connected",
        }
    }
}

impl std::fmt::Display for ExecutionErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A backend failure as it crosses the process boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RemoteFault {
    /// `Connect` failed.
    Connect {
        /// Backend message.
        message: String,
    },
    /// `Run` failed.
    Execution {
        /// Failure category.
        reason: ExecutionErrorKind,
        /// Backend message.
        message: String,
    },
    /// `Close` failed.
    Close {
        /// Backend message.
        message: String,
    },
}

impl RemoteFault {
    /// Converts a plugin-side error into its wire form.
    ///
    /// Errors outside the backend taxonomy are reported as runtime
    /// execution failures carrying their display text.
    #[must_use]
    pub fn from_error(error: &PluginError) -> Self {
        match error {
            PluginError::Connect { message } => Self::Connect {
                message: message.clone(),
            },
            PluginError::Execution { kind, message } => Self::Execution {
                reason: *kind,
                message: message.clone(),
            },
            PluginError::Close { message } => Self::Close {
                message: message.clone(),
            },
            other => Self::Execution {
                reason: ExecutionErrorKind::Runtime,
                message: other.to_string(),
            },
        }
    }

    /// Rebuilds the host-side error.
    #[must_use]
    pub fn into_error(self) -> PluginError {
        match self {
            Self::Connect { message } => PluginError::Connect { message },
            Self::Execution { reason, message } => PluginError::Execution {
                kind: reason,
                message,
            },
            Self::Close { message } => PluginError::Close { message },
        }
    }

    /// Returns the backend message.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Connect { message }
            | Self::Execution { message, .. }
            | Self::Close { message } => message,
        }
    }
}
