//! Error taxonomy for the relay.
//!
//! - [`FrameError`]: wire-level failures raised by the frame codec
//! - [`RelayError`]: top-level error covering routing and server lifecycle
//!
//! Per-connection errors never cross connection boundaries: a session that
//! hits a [`FrameError`] terminates (or skips the frame) on its own, and the
//! router logs [`RelayError::UnroutableRecipient`] without informing the sender.

use std::io;

use thiserror::Error;

use crate::ids::ConnectionId;

// ─────────────────────────────────────────────────────────────────────────────
// FrameError
// ─────────────────────────────────────────────────────────────────────────────

/// Errors produced while encoding, decoding or reading a frame.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The payload exceeds the 65535-byte protocol limit.
    #[error("payload of {len} bytes exceeds the {max}-byte frame limit", max = crate::frame::MAX_PAYLOAD_LEN)]
    PayloadTooLarge {
        /// Byte length of the rejected payload.
        len: usize,
    },

    /// The length prefix is inconsistent with the bytes supplied, or the
    /// payload is not valid UTF-8.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// The stream ended before a complete frame was read.
    #[error("connection closed")]
    ConnectionClosed,

    /// Any other transport failure.
    #[error("transport error: {0}")]
    Io(#[source] io::Error),
}

impl FrameError {
    /// Whether this error means the peer (or the local side) hung up.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::ConnectionClosed)
    }
}

impl From<io::Error> for FrameError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => Self::ConnectionClosed,
            _ => Self::Io(err),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// RelayError
// ─────────────────────────────────────────────────────────────────────────────

/// Top-level error type for the relay server and client.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Wire-level failure.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// A direct message named a peer that is not registered.
    #[error("recipient {0} is not connected")]
    UnroutableRecipient(ConnectionId),

    /// The outbound queue is gone (router stopped).
    #[error("outbound queue closed")]
    QueueClosed,

    /// A write did not complete within the configured timeout.
    #[error("write to {0} timed out")]
    WriteTimeout(ConnectionId),

    /// The listening socket could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Connecting to a remote relay failed.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        /// Address that was requested.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Any other local I/O failure (stdin, stdout, socket setup).
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Result type for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn payload_too_large_display() {
        let err = FrameError::PayloadTooLarge { len: 70_000 };
        assert_eq!(
            err.to_string(),
            "payload of 70000 bytes exceeds the 65535-byte frame limit"
        );
    }

    #[test]
    fn unexpected_eof_maps_to_closed() {
        let err: FrameError = io::Error::new(io::ErrorKind::UnexpectedEof, "eof").into();
        assert!(err.is_closed());
    }

    #[test]
    fn reset_maps_to_closed() {
        let err: FrameError = io::Error::new(io::ErrorKind::ConnectionReset, "reset").into();
        assert_matches!(err, FrameError::ConnectionClosed);
    }

    #[test]
    fn other_io_kept_as_io() {
        let err: FrameError = io::Error::new(io::ErrorKind::PermissionDenied, "nope").into();
        assert_matches!(err, FrameError::Io(_));
        assert!(!err.is_closed());
    }

    #[test]
    fn frame_error_converts_to_relay_error() {
        let err: RelayError = FrameError::MalformedFrame("short".into()).into();
        assert_eq!(err.to_string(), "malformed frame: short");
    }

    #[test]
    fn unroutable_display_names_recipient() {
        let id = ConnectionId::new();
        let err = RelayError::UnroutableRecipient(id);
        assert!(err.to_string().contains(&id.to_string()));
    }

    #[test]
    fn bind_error_keeps_source() {
        let err = RelayError::Bind {
            addr: "127.0.0.1:1".into(),
            source: io::Error::new(io::ErrorKind::AddrInUse, "in use"),
        };
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("127.0.0.1:1"));
    }
}
