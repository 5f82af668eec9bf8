//! Startup handshake between host and plugin.
//!
//! A plugin announces itself by writing one line to standard output:
//!
//! ```text
//! <protocol-version> <cookie-key> <cookie-value> <loopback-ip:port>
//! ```
//!
//! The version and cookie must equal the compiled-in [`HANDSHAKE`]
//! descriptor, and the address is where the plugin listens for the single
//! RPC connection. The check only rejects incompatible builds; it is not an
//! authentication mechanism.

use std::env;
use std::io::{BufRead, BufReader, Read};
use std::net::SocketAddr;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::duration_millis;
use crate::error::PluginError;

pub(crate) const HANDSHAKE_TARGET: &str = "lazydb_plugins::handshake";

/// Compatibility marker shared by host and plugin builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeDescriptor {
    /// Protocol version; a mismatch rejects the plugin.
    pub protocol_version: u32,
    /// Name of the cookie, also used as the child environment variable.
    pub cookie_key: &'static str,
    /// Value of the cookie.
    pub cookie_value: &'static str,
}

/// The descriptor compiled into this build.
pub const HANDSHAKE: HandshakeDescriptor = HandshakeDescriptor {
    protocol_version: 1,
    cookie_key: "LAZYDB_PLUGIN",
    cookie_value: "d1f8a3c6e0b94f27",
};

impl HandshakeDescriptor {
    /// Formats the announcement line for `address`, without a newline.
    ///
    /// # Example
    ///
    /// ```
    /// use lazydb_plugins::handshake::HANDSHAKE;
    ///
    /// let address = "127.0.0.1:4100".parse().unwrap();
    /// let line = HANDSHAKE.encode(address);
    /// assert_eq!(HANDSHAKE.parse(&line), Ok(address));
    /// ```
    #[must_use]
    pub fn encode(&self, address: SocketAddr) -> String {
        format!(
            "{} {} {} {address}",
            self.protocol_version, self.cookie_key, self.cookie_value
        )
    }

    /// Validates an announcement line and returns the plugin's address.
    ///
    /// Surrounding whitespace, including the trailing newline, is ignored.
    ///
    /// # Errors
    ///
    /// Returns a [`HandshakeError`] naming the first field that does not
    /// match this descriptor.
    pub fn parse(&self, line: &str) -> Result<SocketAddr, HandshakeError> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let [version, key, value, address] = tokens.as_slice() else {
            return Err(HandshakeError::TokenCount {
                found: tokens.len(),
            });
        };

        let found_version: u32 = version
            .parse()
            .map_err(|_| HandshakeError::InvalidVersion {
                token: (*version).to_owned(),
            })?;
        if found_version != self.protocol_version {
            return Err(HandshakeError::VersionMismatch {
                expected: self.protocol_version,
                found: found_version,
            });
        }
        if *key != self.cookie_key {
            return Err(HandshakeError::CookieKeyMismatch {
                found: (*key).to_owned(),
            });
        }
        if *value != self.cookie_value {
            return Err(HandshakeError::CookieValueMismatch);
        }

        let parsed: SocketAddr = address
            .parse()
            .map_err(|_| HandshakeError::InvalidAddress {
                token: (*address).to_owned(),
            })?;
        if !parsed.ip().is_loopback() {
            return Err(HandshakeError::NonLoopbackAddress { address: parsed });
        }
        Ok(parsed)
    }

    /// Returns `true` when the current process was started by a host.
    ///
    /// The host exports the cookie into the child environment; a plugin
    /// binary run by hand lacks it.
    #[must_use]
    pub fn launched_by_host(&self) -> bool {
        env::var(self.cookie_key).is_ok_and(|value| value == self.cookie_value)
    }
}

/// Reasons a handshake line is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandshakeError {
    /// The line did not have exactly four fields.
    #[error("expected 4 fields, found {found}")]
    TokenCount {
        /// Number of whitespace-separated fields.
        found: usize,
    },
    /// The version field was not a number.
    #[error("protocol version '{token}' is not a number")]
    InvalidVersion {
        /// The offending field.
        token: String,
    },
    /// The plugin speaks another protocol version.
    #[error("protocol version {found} is incompatible with host version {expected}")]
    VersionMismatch {
        /// Host protocol version.
        expected: u32,
        /// Plugin protocol version.
        found: u32,
    },
    /// The cookie key differs from the host's.
    #[error("unexpected cookie key '{found}'")]
    CookieKeyMismatch {
        /// Key written by the plugin.
        found: String,
    },
    /// The cookie value differs from the host's.
    #[error("cookie value does not match")]
    CookieValueMismatch,
    /// The address field did not parse as `ip:port`.
    #[error("invalid transport address '{token}'")]
    InvalidAddress {
        /// The offending field.
        token: String,
    },
    /// The plugin listens on a non-loopback interface.
    #[error("transport address {address} is not a loopback address")]
    NonLoopbackAddress {
        /// Parsed address.
        address: SocketAddr,
    },
}

/// Waits for the handshake line on a plugin's standard output.
///
/// Reading happens on a dedicated thread so the wait can be bounded. Once the
/// line has been delivered the thread keeps draining the stream into debug
/// logs until the plugin closes it. End of stream before a line counts as a
/// timeout: the plugin never announced itself.
pub(crate) fn await_handshake<R>(
    plugin: &str,
    stdout: R,
    timeout: Duration,
) -> Result<SocketAddr, PluginError>
where
    R: Read + Send + 'static,
{
    let (sender, receiver) = mpsc::channel();
    let owner = plugin.to_owned();
    thread::Builder::new()
        .name(format!("{plugin}-stdout"))
        .spawn(move || {
            let mut reader = BufReader::new(stdout);
            let mut line = String::new();
            let announced = matches!(reader.read_line(&mut line), Ok(read) if read > 0);
            if sender.send(announced.then_some(line)).is_err() {
                debug!(
                    target: HANDSHAKE_TARGET,
                    plugin = %owner,
                    "handshake line arrived after the host stopped waiting"
                );
            }
            if announced {
                relay_lines(reader, &owner, "stdout");
            }
        })
        .map_err(|source| PluginError::Spawn {
            name: plugin.to_owned(),
            message: String::from("could not start the stdout reader"),
            source: Some(source.into()),
        })?;

    let timed_out = || PluginError::HandshakeTimeout {
        name: plugin.to_owned(),
        timeout_ms: duration_millis(timeout),
    };
    match receiver.recv_timeout(timeout) {
        Ok(Some(line)) => {
            debug!(
                target: HANDSHAKE_TARGET,
                plugin,
                line = line.trim_end(),
                "received handshake line"
            );
            HANDSHAKE
                .parse(&line)
                .map_err(|source| PluginError::Handshake {
                    name: plugin.to_owned(),
                    source,
                })
        }
        Ok(None) | Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => {
            Err(timed_out())
        }
    }
}

/// Forwards every line of a plugin output stream to debug logs.
pub(crate) fn relay_lines<R: BufRead>(reader: R, plugin: &str, stream: &'static str) {
    for line in reader.lines() {
        match line {
            Ok(text) => debug!(target: HANDSHAKE_TARGET, plugin, stream, "{text}"),
            Err(error) => {
                debug!(
                    target: HANDSHAKE_TARGET,
                    plugin,
                    stream,
                    %error,
                    "stopped relaying plugin output"
                );
                break;
            }
        }
    }
}
