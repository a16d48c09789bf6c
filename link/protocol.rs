//! Typed envelopes, wire frames, and the session state machine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Control-path message types sent by the controller.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum EnvelopeKind {
    /// Opens a session; must be the first message after channel establishment.
    Connect,
    /// Terminates the session.
    Disconnect,
    /// Executes one command line; valid only while connected.
    Command,
}

/// Typed envelope from controller to console.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Envelope {
    /// Message type tag.
    pub kind: EnvelopeKind,
    /// Command text; present only for [`EnvelopeKind::Command`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl Envelope {
    /// Session-opening envelope.
    #[must_use]
    pub const fn connect() -> Self {
        Self {
            kind: EnvelopeKind::Connect,
            data: None,
        }
    }

    /// Session-closing envelope.
    #[must_use]
    pub const fn disconnect() -> Self {
        Self {
            kind: EnvelopeKind::Disconnect,
            data: None,
        }
    }

    /// Command envelope carrying one command line.
    #[must_use]
    pub fn command(text: impl Into<String>) -> Self {
        Self {
            kind: EnvelopeKind::Command,
            data: Some(text.into()),
        }
    }
}

/// Everything that travels on the wire, tagged so replies and alerts are
/// never confused on the shared inbound stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "frame", rename_all = "snake_case")]
pub enum Frame {
    /// Controller to console: control and command path.
    Envelope(Envelope),
    /// Console to controller: answers exactly one envelope.
    Reply {
        /// Buffered textual result of the command or dashboard.
        text: String,
    },
    /// Console to controller: unsolicited, outside the command cadence.
    Alert {
        /// Alert text, verbatim from the raising subsystem.
        text: String,
    },
}

/// Session lifecycle as seen by the console (authoritative) and the
/// controller (mirrored).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum SessionState {
    /// No controller engaged; only CONNECT is acceptable.
    #[default]
    AwaitingConnect,
    /// A controller session is live; COMMAND and DISCONNECT are acceptable.
    Connected,
}

impl SessionState {
    /// Validates an inbound envelope kind and returns the successor state.
    pub fn accept(self, kind: EnvelopeKind) -> Result<Self, LinkError> {
        match (self, kind) {
            (Self::AwaitingConnect, EnvelopeKind::Connect) => Ok(Self::Connected),
            (Self::Connected, EnvelopeKind::Command) => Ok(Self::Connected),
            (Self::Connected, EnvelopeKind::Disconnect) => Ok(Self::AwaitingConnect),
            (state, kind) => Err(LinkError::ProtocolViolation { state, kind }),
        }
    }

    /// Whether a session is currently live.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

/// Errors surfaced by the link layer.
#[derive(Debug, Error)]
pub enum LinkError {
    /// A message arrived in a session state that does not permit it.
    #[error("{kind:?} is not valid in session state {state:?}")]
    ProtocolViolation {
        /// State the session was in when the message arrived.
        state: SessionState,
        /// The offending message type.
        kind: EnvelopeKind,
    },
    /// Channel connect, send, or receive failed. Fatal to the session.
    #[error("transport failure: {0}")]
    Transport(#[from] std::io::Error),
    /// A frame could not be encoded or decoded.
    #[error("frame codec failure: {0}")]
    Codec(#[from] serde_json::Error),
    /// The peer closed the channel.
    #[error("channel closed by peer")]
    Closed,
    /// The expected reply did not arrive within the bounded wait.
    #[error("no reply within {0:?}")]
    Timeout(std::time::Duration),
}
