//! Domain errors raised by plugin operations.
//!
//! All errors use `thiserror`-derived enums with structured context so callers
//! can inspect the failure programmatically. I/O errors are wrapped in `Arc`
//! so that [`PluginError`] stays `Clone`, which lets a [`LoadReport`] hand the
//! same failure to several callers.
//!
//! [`LoadReport`]: crate::registry::LoadReport

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::handshake::HandshakeError;
use crate::protocol::ExecutionErrorKind;

/// Errors arising from plugin discovery, launch, and calls.
#[derive(Debug, Clone, Error)]
pub enum PluginError {
    /// The plugin directory could not be listed. Fatal to the whole load.
    #[error("failed to read plugin directory '{}': {source}", path.display())]
    Discovery {
        /// Directory that was scanned.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// The plugin process could not be spawned.
    #[error("plugin '{name}' failed to start: {message}")]
    Spawn {
        /// Plugin name.
        name: String,
        /// Human-readable failure description.
        message: String,
        /// Optional underlying I/O error.
        #[source]
        source: Option<Arc<io::Error>>,
    },

    /// The plugin wrote a handshake line that does not match this host.
    #[error("plugin '{name}' failed the handshake: {source}")]
    Handshake {
        /// Plugin name.
        name: String,
        /// What was wrong with the handshake line.
        #[source]
        source: HandshakeError,
    },

    /// The plugin did not write a handshake line before the deadline.
    #[error("plugin '{name}' did not complete the handshake within {timeout_ms}ms")]
    HandshakeTimeout {
        /// Plugin name.
        name: String,
        /// Configured timeout in milliseconds.
        timeout_ms: u64,
    },

    /// A plugin with the same name is already registered.
    #[error("plugin '{name}' is already loaded")]
    AlreadyLoaded {
        /// Plugin name.
        name: String,
    },

    /// A plugin the caller depends on is not registered.
    #[error("plugin '{name}' is not loaded")]
    NotLoaded {
        /// Plugin name.
        name: String,
        /// The failure recorded for the candidate, when it was attempted.
        #[source]
        cause: Option<Box<PluginError>>,
    },

    /// The plugin binary was started outside of a host.
    #[error("this executable is a lazydb plugin and must be launched by the host")]
    NotLaunchedByHost,

    /// The backend could not establish its connection.
    #[error("connect failed: {message}")]
    Connect {
        /// Message reported by the backend.
        message: String,
    },

    /// The backend could not execute the query.
    #[error("query failed ({kind}): {message}")]
    Execution {
        /// Failure category.
        kind: ExecutionErrorKind,
        /// Message reported by the backend.
        message: String,
    },

    /// The backend could not release its connection.
    #[error("close failed: {message}")]
    Close {
        /// Message reported by the backend.
        message: String,
    },

    /// The RPC channel to the plugin failed.
    #[error("transport failure talking to plugin '{name}': {source}")]
    Transport {
        /// Plugin name.
        name: String,
        /// Underlying transport failure.
        #[source]
        source: TransportError,
    },
}

impl PluginError {
    /// Builds an execution error.
    #[must_use]
    pub fn execution(kind: ExecutionErrorKind, message: impl Into<String>) -> Self {
        Self::Execution {
            kind,
            message: message.into(),
        }
    }

    /// Builds a transport error for the named plugin.
    #[must_use]
    pub fn transport(name: impl Into<String>, source: TransportError) -> Self {
        Self::Transport {
            name: name.into(),
            source,
        }
    }

    /// Returns `true` for failures of the RPC channel itself.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Returns `true` for handshake rejections and handshake timeouts.
    #[must_use]
    pub const fn is_handshake(&self) -> bool {
        matches!(self, Self::Handshake { .. } | Self::HandshakeTimeout { .. })
    }

    /// Returns `true` for errors reported by the backend's own logic.
    #[must_use]
    pub const fn is_backend(&self) -> bool {
        matches!(
            self,
            Self::Connect { .. } | Self::Execution { .. } | Self::Close { .. }
        )
    }
}

/// Failures of the framed RPC channel.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// I/O error during read or write.
    #[error("I/O error: {0}")]
    Io(Arc<io::Error>),

    /// The peer closed the connection.
    #[error("connection closed")]
    ConnectionClosed,

    /// Missing Content-Length header.
    #[error("missing Content-Length header")]
    MissingContentLength,

    /// Invalid header format.
    #[error("invalid header format")]
    InvalidHeader,

    /// A frame announced a body larger than the transport accepts.
    #[error("frame of {size} bytes exceeds the {limit} byte limit")]
    FrameTooLarge {
        /// Announced body size.
        size: usize,
        /// Maximum accepted body size.
        limit: usize,
    },

    /// A frame arrived but its payload did not decode.
    #[error("malformed frame: {message}")]
    MalformedFrame {
        /// Description of the decoding failure.
        message: String,
    },

    /// The peer understood the frame but refused the call.
    #[error("call rejected by plugin: {message} (code: {code})")]
    Rejected {
        /// JSON-RPC error code.
        code: i64,
        /// Error message from the plugin.
        message: String,
    },

    /// No response arrived before the host call timeout.
    #[error("call timed out after {timeout_ms}ms")]
    TimedOut {
        /// Configured timeout in milliseconds.
        timeout_ms: u64,
    },
}

impl TransportError {
    /// Builds a malformed-frame error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedFrame {
            message: message.into(),
        }
    }

    /// Returns `true` when the connection can no longer carry calls.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::Rejected { .. })
    }
}

impl From<io::Error> for TransportError {
    fn from(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => Self::ConnectionClosed,
            _ => Self::Io(Arc::new(error)),
        }
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(error: serde_json::Error) -> Self {
        Self::malformed(error.to_string())
    }
}

#[cfg(test)]
mod tests;
