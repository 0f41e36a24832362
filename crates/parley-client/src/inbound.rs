//! Interpretation of payloads received from the relay.

use std::fmt;

use parley_core::{ConnectionId, Header, HeaderKind};

/// A received payload, classified for display.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Inbound {
    /// A peer joined after us.
    Joined(ConnectionId),
    /// A peer that was present when we joined.
    Present(ConnectionId),
    /// A peer left.
    Left(ConnectionId),
    /// Chat text from a peer.
    Message(String),
    /// Anything else, shown as received.
    Raw(String),
}

impl Inbound {
    /// Classify decoded payload text.
    ///
    /// Notices whose argument is not a valid identifier fall back to
    /// [`Inbound::Raw`].
    pub fn parse(content: &str) -> Self {
        let Some(header) = Header::parse(content) else {
            return Self::Raw(content.to_string());
        };
        let notice = |build: fn(ConnectionId) -> Self| {
            header
                .connection_id()
                .map_or_else(|| Self::Raw(content.to_string()), build)
        };
        match header.kind {
            HeaderKind::NewClient => notice(Self::Joined),
            HeaderKind::ClientsList => notice(Self::Present),
            HeaderKind::ClientDisconnect => notice(Self::Left),
            HeaderKind::ClientMessage => Self::Message(header.argument.to_string()),
        }
    }

    /// Whether the payload was not in a recognized format.
    pub fn is_raw(&self) -> bool {
        matches!(self, Self::Raw(_))
    }
}

impl fmt::Display for Inbound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Joined(id) => write!(f, "new client: {id}"),
            Self::Present(id) => write!(f, "existed client: {id}"),
            Self::Left(id) => write!(f, "client disconnected: {id}"),
            Self::Message(text) | Self::Raw(text) => f.write_str(text),
        }
    }
}
