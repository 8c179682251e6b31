//! Connection Session state machine.
//!
//! Provides a `ConnectionState` enum that models the lifecycle of a
//! single streaming session, with validated transitions that return
//! `Result` instead of panicking.

use std::time::Instant;

use crate::error::CamlinkError;

// ── ConnectionState ──────────────────────────────────────────────

/// The current state of a Connection Session.
///
/// ```text
///  Idle ──► Connecting ──► Connected ──► Disconnected
///    │           │             │
///    │           ▼             ▼
///    │        Failed ◄─────────┘ (write error, when configured)
///    └───────────────────────────► Disconnected (close before start)
/// ```
///
/// `Disconnected` and `Failed` are terminal: a new session must be
/// built to retry.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Constructed, `start()` not yet called.
    #[default]
    Idle,

    /// TCP connect in progress.
    Connecting,

    /// Handshake byte written; frames may be submitted.
    Connected {
        /// When the session entered the `Connected` state.
        since: Instant,
    },

    /// Closed by the caller.
    Disconnected,

    /// Connect (or, optionally, a write) failed.
    Failed(String),
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected { .. } => write!(f, "Connected"),
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Failed(reason) => write!(f, "Failed: {reason}"),
        }
    }
}

impl ConnectionState {
    /// Returns `true` when frames may be submitted.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    /// Returns `true` for `Disconnected` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Failed(_))
    }

    /// The failure reason, if the session failed.
    pub fn failure(&self) -> Option<&str> {
        match self {
            Self::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    /// How long the session has been `Connected`.
    ///
    /// Returns `None` for any other state.
    pub fn connected_duration(&self) -> Option<std::time::Duration> {
        match self {
            Self::Connected { since } => Some(since.elapsed()),
            _ => None,
        }
    }

    // ── Transitions ──────────────────────────────────────────────

    /// Transition to `Connecting`.
    ///
    /// Valid from: `Idle`.
    pub fn begin_connect(&mut self) -> Result<(), CamlinkError> {
        match self {
            Self::Idle => {
                *self = Self::Connecting;
                Ok(())
            }
            _ => Err(CamlinkError::InvalidState(
                "cannot start: session is not Idle",
            )),
        }
    }

    /// Transition to `Connected`.
    ///
    /// Valid from: `Connecting`.
    pub fn complete_connect(&mut self) -> Result<(), CamlinkError> {
        match self {
            Self::Connecting => {
                *self = Self::Connected {
                    since: Instant::now(),
                };
                Ok(())
            }
            _ => Err(CamlinkError::InvalidState(
                "cannot complete connect: not in Connecting state",
            )),
        }
    }

    /// Transition to `Failed(reason)`.
    ///
    /// Valid from: `Connecting`, `Connected`.
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), CamlinkError> {
        match self {
            Self::Connecting | Self::Connected { .. } => {
                *self = Self::Failed(reason.into());
                Ok(())
            }
            _ => Err(CamlinkError::InvalidState(
                "cannot fail: session is not connecting or connected",
            )),
        }
    }

    /// Close the session. Valid from any state and idempotent.
    ///
    /// A `Failed` session keeps its reason; everything else becomes
    /// `Disconnected`. Returns `true` if the state changed.
    pub fn close(&mut self) -> bool {
        match self {
            Self::Disconnected | Self::Failed(_) => false,
            _ => {
                *self = Self::Disconnected;
                true
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
