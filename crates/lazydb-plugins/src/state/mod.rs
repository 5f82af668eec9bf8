//! Per-plugin lifecycle states.


use serde::Serialize;

/// Where a plugin record is in its lifecycle.
///
/// ```text
/// Discovered -> Launching -> HandshakeNegotiating -> Ready -> Terminated
///                   |                |                 |
///                   +----------------+-----------------+--> Failed
/// ```
///
/// `Terminated` and `Failed` are terminal.
///
/// # Example
///
/// ```
/// use lazydb_plugins::PluginState;
///
/// assert!(PluginState::Ready.can_transition_to(PluginState::Failed));
/// assert!(!PluginState::Failed.can_transition_to(PluginState::Ready));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginState {
    /// Found in the plugin directory.
    Discovered,
    /// Process spawned, output pipes being wired.
    Launching,
    /// Waiting for and validating the handshake line.
    HandshakeNegotiating,
    /// Connected and accepting calls.
    Ready,
    /// Shut down by the host.
    Terminated,
    /// Launch failed or the connection died.
    Failed,
}

impl PluginState {
    /// Returns `true` when `next` is a legal successor of this state.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Discovered, Self::Launching)
                | (Self::Launching, Self::HandshakeNegotiating)
                | (Self::HandshakeNegotiating, Self::Ready)
                | (Self::Ready, Self::Terminated)
                | (
                    Self::Launching | Self::HandshakeNegotiating | Self::Ready,
                    Self::Failed
                )
        )
    }

    /// Returns `true` for states no transition leaves.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Terminated | Self::Failed)
    }

    /// Returns the canonical snake-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Discovered => "discovered",
            Self::Launching => "launching",
            Self::HandshakeNegotiating => "handshake_negotiating",
            Self::Ready => "ready",
            Self::Terminated => "terminated",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for PluginState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
